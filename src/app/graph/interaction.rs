use eframe::egui::{self, Pos2, Rect, Ui};

use crate::graph::NodeId;

use super::super::ViewModel;
use super::super::render_utils::screen_to_world;

/// A node as drawn this frame.
pub(super) struct ScreenNode {
    pub id: NodeId,
    pub pos: Pos2,
    pub radius: f32,
}

impl ViewModel {
    pub(super) fn handle_graph_zoom(&mut self, ui: &Ui, rect: Rect, response: &egui::Response) {
        if !response.hovered() {
            return;
        }

        let scroll = ui.input(|input| input.raw_scroll_delta.y);
        if scroll.abs() <= f32::EPSILON {
            return;
        }

        let pointer = ui
            .input(|input| input.pointer.hover_pos())
            .unwrap_or_else(|| rect.center());
        let world_before = screen_to_world(rect, self.pan, self.zoom, pointer);

        let zoom_factor = (1.0 + (scroll * 0.0018)).clamp(0.85, 1.15);
        self.zoom = (self.zoom * zoom_factor).clamp(0.1, 5.0);
        self.pan = pointer - rect.center() - (world_before * self.zoom);
    }

    /// Secondary or middle drag always pans; a primary drag pans only when it did not grab a node.
    pub(super) fn handle_graph_pan(&mut self, response: &egui::Response) {
        let grabbed_node = self.editor.layout().dragging().is_some();
        if response.dragged_by(egui::PointerButton::Secondary)
            || response.dragged_by(egui::PointerButton::Middle)
            || (response.dragged_by(egui::PointerButton::Primary) && !grabbed_node)
        {
            self.pan += response.drag_delta();
        }
    }

    /// Node drags go through the editor so the layout decides what gets pinned.
    pub(super) fn handle_node_drag(
        &mut self,
        rect: Rect,
        ui: &Ui,
        response: &egui::Response,
        nodes: &[ScreenNode],
    ) {
        if response.drag_started_by(egui::PointerButton::Primary)
            && let Some(origin) = ui.input(|input| input.pointer.press_origin())
            && let Some(node) = Self::node_at(nodes, origin)
        {
            self.selected = Some(node);
            self.editor.drag_start(node);
        }

        if let Some(node) = self.editor.layout().dragging() {
            if let Some(pointer) = response.interact_pointer_pos() {
                let world = screen_to_world(rect, self.pan, self.zoom, pointer);
                self.editor.drag_to(node, world.to_pos2());
            }
            if response.drag_stopped() || !response.dragged() {
                self.editor.drag_end(node);
            }
        }
    }

    pub(super) fn node_at(nodes: &[ScreenNode], point: Pos2) -> Option<NodeId> {
        nodes
            .iter()
            .filter_map(|node| {
                let distance = node.pos.distance(point);
                (distance <= node.radius + 2.0).then_some((node.id, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }
}
