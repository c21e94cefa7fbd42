use std::ops::RangeInclusive;

use eframe::egui::{self, Key, Response, RichText, Ui};

use crate::editor::{Command, Outcome};
use crate::filter::{Focus, YearRange, rank_nodes};
use crate::graph::{EdgeReviewGroup, GraphStore, NodeId};
use crate::layout::{LayoutMode, SimulationRequest};

use super::super::ViewModel;

const SLIDER_KEY_BASE_RATE: f32 = 10.0;
const SLIDER_KEY_ACCEL_PER_SEC: f32 = 9.0;
const SLIDER_KEY_ACCEL_MAX: f32 = 40.0;
const PICKER_ROWS: usize = 6;
const MAX_DEPTH: usize = 8;

#[derive(Clone, Copy, Default)]
struct SliderKeyHoldState {
    held_secs: f32,
    direction: i8,
}

fn slider_key_accel_multiplier(hold_secs: f32) -> f32 {
    let ramp = hold_secs * SLIDER_KEY_ACCEL_PER_SEC;
    (1.0 + ramp + ramp * ramp * 0.15).min(SLIDER_KEY_ACCEL_MAX)
}

/// Turns held arrow keys on a focused slider into an accelerating delta, in units of `step`.
fn slider_arrow_delta(ui: &Ui, response: &Response, step: f32) -> f32 {
    let state_id = response.id.with("arrow_key_hold_state");
    if !response.has_focus() {
        ui.ctx()
            .data_mut(|data| data.remove::<SliderKeyHoldState>(state_id));
        return 0.0;
    }

    let mut hold_state = ui.ctx().data(|data| {
        data.get_temp::<SliderKeyHoldState>(state_id)
            .unwrap_or_default()
    });
    let (delta_time, increase_down, decrease_down) = ui.input(|input| {
        (
            input.stable_dt.min(0.1),
            input.key_down(Key::ArrowRight) || input.key_down(Key::ArrowUp),
            input.key_down(Key::ArrowLeft) || input.key_down(Key::ArrowDown),
        )
    });

    let direction = (increase_down as i8) - (decrease_down as i8);
    if direction != hold_state.direction {
        hold_state = SliderKeyHoldState {
            direction,
            ..SliderKeyHoldState::default()
        };
    }

    let delta = if direction == 0 {
        0.0
    } else {
        hold_state.held_secs += delta_time;
        ui.ctx().request_repaint();
        let speed = SLIDER_KEY_BASE_RATE * slider_key_accel_multiplier(hold_state.held_secs);
        direction as f32 * step * speed * delta_time
    };

    ui.ctx()
        .data_mut(|data| data.insert_temp(state_id, hold_state));
    delta
}

fn apply_slider_arrow_acceleration_f32(
    ui: &Ui,
    response: &Response,
    value: &mut f32,
    range: RangeInclusive<f32>,
) -> bool {
    let step = ((range.end() - range.start()) / 200.0).max(0.0005);
    let delta = slider_arrow_delta(ui, response, step);
    if delta == 0.0 {
        return false;
    }
    let old_value = *value;
    *value = (*value + delta).clamp(*range.start(), *range.end());
    (*value - old_value).abs() > f32::EPSILON
}

fn apply_slider_arrow_acceleration_usize(
    ui: &Ui,
    response: &Response,
    value: &mut usize,
    range: RangeInclusive<usize>,
) -> bool {
    let state_id = response.id.with("arrow_key_carry");
    let carry = ui
        .ctx()
        .data(|data| data.get_temp::<f32>(state_id).unwrap_or_default())
        + slider_arrow_delta(ui, response, 0.25);

    let whole = carry.trunc();
    ui.ctx()
        .data_mut(|data| data.insert_temp(state_id, carry - whole));
    if whole == 0.0 {
        return false;
    }

    let old_value = *value;
    *value = (*value as isize + whole as isize).clamp(*range.start() as isize, *range.end() as isize)
        as usize;
    *value != old_value
}

fn tuning_slider(
    ui: &mut Ui,
    value: &mut f32,
    range: RangeInclusive<f32>,
    text: &str,
    hover: &str,
) -> bool {
    let response = ui
        .add(
            egui::Slider::new(value, range.clone())
                .text(text)
                .clamping(egui::SliderClamping::Always),
        )
        .on_hover_text(hover);
    if response.hovered() {
        response.request_focus();
    }
    response.changed() | apply_slider_arrow_acceleration_f32(ui, &response, value, range)
}

/// Fuzzy-ranked node list under a text field. Returns the clicked node.
fn node_picker(ui: &mut Ui, store: &GraphStore, query: &mut String, hint: &str) -> Option<NodeId> {
    ui.add(egui::TextEdit::singleline(query).hint_text(hint));
    if query.trim().is_empty() {
        return None;
    }

    let mut picked = None;
    for id in rank_nodes(store, query, PICKER_ROWS) {
        if let Some(node) = store.node(id)
            && ui.selectable_label(false, node.label()).clicked()
        {
            picked = Some(id);
        }
    }
    if picked.is_some() {
        query.clear();
    }
    picked
}

fn node_name(store: &GraphStore, id: NodeId) -> String {
    store
        .node(id)
        .map(|node| node.label())
        .unwrap_or_else(|| format!("#{id} (missing)"))
}

impl ViewModel {
    pub(in crate::app) fn draw_controls(&mut self, ui: &mut Ui) {
        ui.heading("Graph Controls");
        ui.separator();
        ui.add_space(4.0);

        self.draw_filter_controls(ui);
        ui.separator();
        self.draw_focus_controls(ui);
        ui.separator();
        self.draw_layout_controls(ui);
        ui.separator();

        ui.collapsing("Duplicates", |ui| self.draw_duplicate_tools(ui));
        ui.collapsing("Add author", |ui| self.draw_add_node(ui));
        ui.collapsing("Add link", |ui| self.draw_add_edge(ui));
    }

    fn draw_filter_controls(&mut self, ui: &mut Ui) {
        ui.label("Search by name")
            .on_hover_text("Highlights matching authors without hiding the rest.");
        if ui.text_edit_singleline(&mut self.forms.search).changed() {
            self.dispatch(Command::SetSearch(self.forms.search.clone()));
        }
        let matches = self.editor.search_matches().len();
        if matches > 0 {
            ui.small(format!("{matches} matching"));
        }

        ui.add_space(6.0);
        if let Some((low, high)) = self.editor.store().year_extent() {
            let current = self
                .editor
                .filter()
                .year_range
                .unwrap_or(YearRange::new(low, high));
            let bounds = low.min(current.min)..=high.max(current.max);
            let (mut min, mut max) = (current.min, current.max);

            let min_changed = ui
                .add(egui::Slider::new(&mut min, bounds.clone()).text("From year"))
                .changed();
            let max_changed = ui
                .add(egui::Slider::new(&mut max, bounds).text("To year"))
                .changed();
            if min_changed {
                max = max.max(min);
            }
            if max_changed {
                min = min.min(max);
            }
            if min_changed || max_changed {
                self.dispatch(Command::SetYearRange(Some(YearRange::new(min, max))));
            }
            if ui
                .small_button("All years")
                .on_hover_text("Reset the range to the years present in the data.")
                .clicked()
            {
                self.dispatch(Command::SetYearRange(Some(YearRange::new(low, high))));
            }
        } else {
            ui.weak("No birth years to filter by.");
        }

        ui.add_space(6.0);
        let mut only_flagged = self.editor.filter().only_flagged;
        if ui
            .checkbox(&mut only_flagged, "Only flagged authors")
            .changed()
        {
            self.dispatch(Command::SetOnlyFlagged(only_flagged));
        }
        let mut show_flagged = self.editor.filter().show_flagged_highlight;
        if ui
            .checkbox(&mut show_flagged, "Highlight flagged authors")
            .changed()
        {
            self.dispatch(Command::SetShowFlaggedHighlight(show_flagged));
        }
    }

    fn draw_focus_controls(&mut self, ui: &mut Ui) {
        ui.label(RichText::new("Focus").strong());
        let focus = self.editor.filter().focus;

        match focus.node {
            Some(id) => {
                ui.horizontal(|ui| {
                    let active = self.editor.visibility().is_focus_active();
                    let name = node_name(self.editor.store(), id);
                    if active {
                        ui.label(name);
                    } else {
                        ui.weak(format!("{name} (inactive)"))
                            .on_hover_text("The focus author is filtered out or missing.");
                    }
                    if ui.small_button("Clear").clicked() {
                        self.dispatch(Command::SetFocus {
                            node: None,
                            depth: Focus::DEFAULT_DEPTH,
                        });
                    }
                });
            }
            None => {
                ui.weak("No focus. Double-click an author or pick one below.");
            }
        }

        if let Some(id) = node_picker(
            ui,
            self.editor.store(),
            &mut self.forms.focus_query,
            "Find an author to focus",
        ) {
            self.selected = Some(id);
            self.dispatch(Command::SetFocus {
                node: Some(id),
                depth: focus.depth,
            });
        }

        let mut depth = focus.depth;
        let depth_slider = ui
            .add(egui::Slider::new(&mut depth, 0..=MAX_DEPTH).text("Depth"))
            .on_hover_text("How many links away from the focus author stay visible.");
        if depth_slider.hovered() {
            depth_slider.request_focus();
        }
        let changed = depth_slider.changed()
            | apply_slider_arrow_acceleration_usize(ui, &depth_slider, &mut depth, 0..=MAX_DEPTH);
        if changed {
            self.dispatch(Command::SetDepth(depth));
        }
    }

    fn draw_layout_controls(&mut self, ui: &mut Ui) {
        ui.label(RichText::new("Layout").strong());
        let mut mode = self.editor.layout().mode();
        let mut changed = false;
        ui.horizontal(|ui| {
            for option in [LayoutMode::Force, LayoutMode::Tiers] {
                changed |= ui
                    .selectable_value(&mut mode, option, option.label())
                    .changed();
            }
        });
        if changed {
            self.dispatch(Command::SetLayout(mode));
        }

        ui.horizontal(|ui| {
            if ui
                .button("Perturb")
                .on_hover_text("Jitter the visible authors and let the layout settle again.")
                .clicked()
            {
                self.dispatch(Command::Perturb);
            }
            if ui
                .button("Dampen")
                .on_hover_text("Halve every author's velocity.")
                .clicked()
            {
                self.dispatch(Command::Dampen);
            }
            ui.small(format!("energy {:.3}", self.editor.simulation().alpha()));
        });

        ui.collapsing("Physics tuning", |ui| {
            let nudge = self.editor.layout().config().nudge_alpha;
            let simulation = self.editor.simulation_mut();
            let forces = simulation.forces_mut();
            let mut changed = false;

            changed |= tuning_slider(
                ui,
                &mut forces.repulsion,
                5_000.0..=200_000.0,
                "Repulsion",
                "How strongly authors push away from each other.",
            );
            changed |= tuning_slider(
                ui,
                &mut forces.link_distance,
                40.0..=400.0,
                "Link distance",
                "Rest length of every link spring.",
            );
            changed |= tuning_slider(
                ui,
                &mut forces.link_strength,
                0.002..=0.08,
                "Link strength",
                "How hard links pull toward their rest length.",
            );
            changed |= tuning_slider(
                ui,
                &mut forces.collision_radius,
                10.0..=90.0,
                "Collision radius",
                "Minimum spacing kept between authors.",
            );
            changed |= tuning_slider(
                ui,
                &mut forces.center_pull,
                0.0..=0.01,
                "Center pull",
                "Gentle pull of every author toward the origin.",
            );
            changed |= tuning_slider(
                ui,
                &mut forces.velocity_damping,
                0.7..=0.98,
                "Velocity damping",
                "How much velocity survives each tick.",
            );

            if changed {
                simulation.apply(SimulationRequest::Nudge(nudge));
            }
        });
    }

    fn draw_duplicate_tools(&mut self, ui: &mut Ui) {
        let store = self.editor.store();
        let duplicate_edges = store
            .find_duplicate_edges()
            .iter()
            .map(|group| group.edges.len().saturating_sub(1))
            .sum::<usize>();
        let duplicate_nodes = store
            .find_duplicate_nodes()
            .iter()
            .map(|group| group.nodes.len().saturating_sub(1))
            .sum::<usize>();

        ui.label(format!("{duplicate_edges} redundant links"));
        if ui
            .add_enabled(duplicate_edges > 0, egui::Button::new("Remove duplicate links"))
            .on_hover_text("Links between the same pair with the same label, in either direction.")
            .clicked()
            && let Some(Outcome::EdgesRemoved(removed)) =
                self.dispatch(Command::RemoveDuplicateEdges)
        {
            self.notice = Some(format!("Removed {removed} duplicate links"));
        }

        ui.label(format!("{duplicate_nodes} duplicate authors"));
        if ui
            .add_enabled(duplicate_nodes > 0, egui::Button::new("Merge duplicate authors"))
            .on_hover_text("Authors whose names differ only by case or spacing.")
            .clicked()
            && let Some(Outcome::Merged(report)) = self.dispatch(Command::MergeDuplicateNodes)
        {
            self.notice = Some(format!(
                "Merged {} authors, removed {} links",
                report.nodes_merged, report.edges_removed
            ));
        }

        ui.add_space(6.0);
        if self.review.is_none() {
            if ui
                .button("Review parallel links")
                .on_hover_text("Pick which link to keep where one author links another several times.")
                .clicked()
            {
                let groups = self.editor.store().review_duplicate_edges();
                if groups.is_empty() {
                    self.notice = Some("No parallel links to review".to_owned());
                } else {
                    self.review = Some(groups);
                }
            }
            return;
        }

        let mut apply = false;
        let mut cancel = false;
        if let Some(groups) = self.review.as_mut() {
            let store = self.editor.store();
            for (index, group) in groups.iter_mut().enumerate() {
                let links = group.edge_count();
                let EdgeReviewGroup {
                    source,
                    target,
                    variants,
                    keep,
                } = group;
                ui.push_id(("review_group", index), |ui| {
                    ui.label(format!(
                        "{} -> {}  ({links} links)",
                        node_name(store, *source),
                        node_name(store, *target)
                    ));
                    for variant in variants.iter() {
                        if let Some(&first) = variant.edges.first() {
                            ui.radio_value(
                                keep,
                                first,
                                format!("\"{}\" x{}", variant.label, variant.edges.len()),
                            );
                        }
                    }
                });
                ui.add_space(4.0);
            }

            ui.horizontal(|ui| {
                apply = ui.button("Apply review").clicked();
                cancel = ui.button("Cancel").clicked();
            });
        }

        if cancel {
            self.review = None;
        } else if apply
            && let Some(groups) = self.review.take()
            && let Some(Outcome::EdgesRemoved(removed)) =
                self.dispatch(Command::ApplyEdgeReview(groups))
        {
            self.notice = Some(format!("Removed {removed} parallel links"));
        }
    }

    fn draw_add_node(&mut self, ui: &mut Ui) {
        ui.add(egui::TextEdit::singleline(&mut self.forms.node_name).hint_text("Name"));
        ui.add(egui::TextEdit::singleline(&mut self.forms.node_year).hint_text("Birth year"));

        let can_add = !self.forms.node_name.trim().is_empty();
        if ui
            .add_enabled(can_add, egui::Button::new("Add author"))
            .clicked()
        {
            let year = self.forms.node_year.trim();
            let command = Command::AddNode {
                name: self.forms.node_name.trim().to_owned(),
                birth_year: (!year.is_empty()).then(|| year.to_owned()),
            };
            if let Some(Outcome::NodeAdded(id)) = self.dispatch(command) {
                self.selected = Some(id);
                self.forms.node_name.clear();
                self.forms.node_year.clear();
            }
        }
    }

    fn draw_add_edge(&mut self, ui: &mut Ui) {
        for (title, is_from) in [("From", true), ("To", false)] {
            let chosen = if is_from {
                self.forms.edge_from
            } else {
                self.forms.edge_to
            };

            let mut picked = None;
            ui.horizontal(|ui| {
                ui.label(format!("{title}:"));
                match chosen {
                    Some(id) => {
                        ui.label(node_name(self.editor.store(), id));
                    }
                    None => {
                        ui.weak("none");
                    }
                }
                if let Some(selected) = self.selected
                    && ui.small_button("Use selected").clicked()
                {
                    picked = Some(selected);
                }
            });

            let query = if is_from {
                &mut self.forms.edge_from_query
            } else {
                &mut self.forms.edge_to_query
            };
            ui.push_id(title, |ui| {
                if let Some(id) = node_picker(ui, self.editor.store(), query, "Search authors") {
                    picked = Some(id);
                }
            });

            if let Some(id) = picked {
                if is_from {
                    self.forms.edge_from = Some(id);
                } else {
                    self.forms.edge_to = Some(id);
                }
            }
        }

        ui.add(egui::TextEdit::singleline(&mut self.forms.edge_label).hint_text("Label"));

        let endpoints = self.forms.edge_from.zip(self.forms.edge_to);
        if ui
            .add_enabled(endpoints.is_some(), egui::Button::new("Add link"))
            .clicked()
            && let Some((from, to)) = endpoints
        {
            let command = Command::AddEdge {
                from,
                to,
                label: self.forms.edge_label.trim().to_owned(),
            };
            if let Some(Outcome::EdgeAdded(_)) = self.dispatch(command) {
                self.forms.edge_label.clear();
                self.forms.edge_to = None;
            }
        }
    }
}
