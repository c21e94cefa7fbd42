use std::collections::HashMap;

use eframe::egui::{self, Align2, Color32, FontId, Pos2, Sense, Stroke, Ui, vec2};

use crate::editor::Command;
use crate::graph::NodeId;
use crate::layout::LayoutMode;

use super::super::ViewModel;
use super::super::render_utils::{
    blend_color, circle_visible, dim_color, draw_arrow, draw_background, edge_visible,
    world_to_screen,
};
use super::interaction::ScreenNode;

const NODE_RADIUS: f32 = 9.0;
const BASE_COLOR: Color32 = Color32::from_rgb(112, 140, 172);
const HOVER_COLOR: Color32 = Color32::from_rgb(255, 164, 101);
const FOCUS_COLOR: Color32 = Color32::from_rgb(245, 206, 93);
const MATCH_COLOR: Color32 = Color32::from_rgb(103, 196, 255);
const FLAGGED_COLOR: Color32 = Color32::from_rgb(120, 204, 128);
const SELECTED_COLOR: Color32 = Color32::from_rgb(250, 236, 200);

impl ViewModel {
    pub(in crate::app) fn draw_graph(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        draw_background(&painter, rect, self.pan, self.zoom);
        self.editor.set_canvas_width(rect.width());
        self.handle_graph_zoom(ui, rect, &response);

        let frame_delta_seconds = ui
            .ctx()
            .input(|input| input.stable_dt)
            .clamp(1.0 / 240.0, 1.0 / 20.0);
        if self.editor.is_settling() {
            self.editor.tick(frame_delta_seconds);
            ui.ctx().request_repaint();
        }

        let radius = (NODE_RADIUS * self.zoom.powf(0.4)).clamp(3.0, 24.0);
        let screen_nodes = self
            .editor
            .store()
            .nodes()
            .iter()
            .filter(|node| self.editor.visibility().shows_node(node.id))
            .map(|node| ScreenNode {
                id: node.id,
                pos: world_to_screen(rect, self.pan, self.zoom, node.body.pos),
                radius,
            })
            .collect::<Vec<_>>();

        self.handle_node_drag(rect, ui, &response, &screen_nodes);
        self.handle_graph_pan(&response);

        if self.editor.store().is_empty() {
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                "The graph is empty. Add an author from the controls panel.",
                FontId::proportional(15.0),
                Color32::from_gray(200),
            );
            return;
        }
        if screen_nodes.is_empty() {
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                "No authors match the current filters.",
                FontId::proportional(15.0),
                Color32::from_gray(200),
            );
        }

        let hovered = ui
            .input(|input| input.pointer.hover_pos())
            .filter(|pointer| rect.contains(*pointer))
            .and_then(|pointer| Self::node_at(&screen_nodes, pointer))
            .or(self.editor.layout().dragging());
        if hovered.is_some() {
            ui.output_mut(|output| output.cursor_icon = egui::CursorIcon::PointingHand);
        }

        if self.editor.layout().mode() == LayoutMode::Tiers {
            self.draw_tier_rows(&painter, rect);
        }

        let positions = screen_nodes
            .iter()
            .map(|node| (node.id, node.pos))
            .collect::<HashMap<NodeId, Pos2>>();
        self.draw_edges(&painter, rect, &positions, radius, hovered);

        let mut selection_animating = false;
        for screen_node in &screen_nodes {
            if !circle_visible(rect, screen_node.pos, screen_node.radius) {
                continue;
            }
            selection_animating |= self.draw_node(ui, &painter, screen_node, hovered);
        }
        if selection_animating {
            ui.ctx().request_repaint();
        }

        if let Some(node) = hovered.and_then(|id| self.editor.store().node(id)) {
            let degree = self.editor.store().incident_edges(node.id).count();
            painter.text(
                rect.left_top() + vec2(10.0, 10.0),
                Align2::LEFT_TOP,
                format!("{}  |  links {degree}  |  images {}", node.label(), node.images.len()),
                FontId::proportional(13.0),
                Color32::from_gray(240),
            );
        }

        if response.double_clicked_by(egui::PointerButton::Primary) {
            if let Some(node) = hovered {
                self.dispatch(Command::ToggleFocus(node));
            }
        } else if response.clicked_by(egui::PointerButton::Primary) {
            self.selected = hovered;
        }
    }

    fn draw_tier_rows(&self, painter: &egui::Painter, rect: egui::Rect) {
        let guide = Stroke::new(1.0, Color32::from_rgba_unmultiplied(120, 130, 150, 45));
        for row in self.editor.layout().rows() {
            let anchor = world_to_screen(rect, self.pan, self.zoom, vec2(row.left_edge(), row.y));
            let y = anchor.y;
            if y < rect.top() - 20.0 || y > rect.bottom() + 20.0 {
                continue;
            }
            painter.line_segment([Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)], guide);
            let x = (anchor.x - 90.0).clamp(rect.left() + 8.0, rect.right() - 80.0);
            painter.text(
                Pos2::new(x, y - 4.0),
                Align2::LEFT_BOTTOM,
                format!("{}  ({})", row.key.label(), row.members.len()),
                FontId::proportional(12.0),
                Color32::from_gray(170),
            );
        }
    }

    fn draw_edges(
        &self,
        painter: &egui::Painter,
        rect: egui::Rect,
        positions: &HashMap<NodeId, Pos2>,
        radius: f32,
        hovered: Option<NodeId>,
    ) {
        let zoom_sqrt = self.zoom.sqrt();
        let show_all_labels = self.zoom > 0.9;

        for edge in self.editor.store().edges() {
            if !self.editor.visibility().shows_edge(edge.id) {
                continue;
            }
            let (Some(&start), Some(&end)) = (positions.get(&edge.id1), positions.get(&edge.id2))
            else {
                continue;
            };
            if !edge_visible(rect, start, end, radius) {
                continue;
            }

            let highlighted = [self.selected, hovered]
                .into_iter()
                .flatten()
                .any(|node| edge.touches(node));
            let stroke = if highlighted {
                Stroke::new((1.8 * zoom_sqrt).clamp(1.0, 3.6), Color32::from_rgb(241, 146, 94))
            } else {
                Stroke::new(
                    (1.1 * zoom_sqrt).clamp(0.6, 2.8),
                    Color32::from_rgba_unmultiplied(150, 156, 168, 150),
                )
            };

            let Some(mid) = draw_arrow(painter, start, end, radius, stroke) else {
                continue;
            };
            if !edge.label.is_empty() && (highlighted || show_all_labels) {
                painter.text(
                    mid,
                    Align2::CENTER_CENTER,
                    &edge.label,
                    FontId::proportional(11.0),
                    Color32::from_gray(if highlighted { 235 } else { 185 }),
                );
            }
        }
    }

    /// Returns whether the selection halo is still animating.
    fn draw_node(
        &self,
        ui: &Ui,
        painter: &egui::Painter,
        screen_node: &ScreenNode,
        hovered: Option<NodeId>,
    ) -> bool {
        let Some(node) = self.editor.store().node(screen_node.id) else {
            return false;
        };
        let filter = self.editor.filter();
        let matches = self.editor.search_matches();

        let is_hovered = hovered == Some(node.id);
        let is_focus = self.editor.visibility().focus == Some(node.id);
        let is_match = matches.contains(&node.id);
        let is_flagged = filter.show_flagged_highlight && node.is_flagged();

        let color = if is_hovered {
            HOVER_COLOR
        } else if is_focus {
            blend_color(BASE_COLOR, FOCUS_COLOR, 0.8)
        } else if is_match {
            blend_color(BASE_COLOR, MATCH_COLOR, 0.75)
        } else if is_flagged {
            blend_color(BASE_COLOR, FLAGGED_COLOR, 0.7)
        } else if !matches.is_empty() {
            dim_color(BASE_COLOR, 0.45)
        } else {
            BASE_COLOR
        };

        let selection_mix = ui.ctx().animate_bool(
            ui.make_persistent_id(("node-selection", node.id)),
            self.selected == Some(node.id),
        );
        let color = blend_color(color, SELECTED_COLOR, selection_mix * 0.6);
        let (position, radius) = (screen_node.pos, screen_node.radius);

        painter.circle_filled(position, radius, color);
        if selection_mix > 0.0 {
            let halo_alpha = (60.0 + selection_mix * 140.0) as u8;
            painter.circle_stroke(
                position,
                radius + 4.0 + ((1.0 - selection_mix) * 6.0),
                Stroke::new(
                    1.2 + selection_mix,
                    Color32::from_rgba_unmultiplied(245, 206, 93, halo_alpha),
                ),
            );
        }
        let rim = if is_focus || node.body.is_pinned() { 2.2 } else { 1.0 };
        painter.circle_stroke(
            position,
            radius,
            Stroke::new(rim, Color32::from_rgba_unmultiplied(15, 15, 15, 190)),
        );
        if node.primary_image().is_some() {
            painter.circle_filled(
                position + vec2(radius * 0.7, -radius * 0.7),
                (radius * 0.28).max(2.0),
                Color32::from_gray(235),
            );
        }

        let emphasized = is_hovered || is_focus || is_match || selection_mix > 0.0;
        if emphasized || self.zoom > 0.55 {
            painter.text(
                position + vec2(radius + 5.0, 0.0),
                Align2::LEFT_CENTER,
                &node.name,
                FontId::proportional(12.0),
                Color32::from_gray(if emphasized { 250 } else { 215 }),
            );
        }

        selection_mix > 0.0 && selection_mix < 1.0
    }
}
