use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use eframe::egui::{self, RichText, Ui};
use tracing::warn;

use crate::editor::Command;
use crate::graph::{Edge, NodeId};
use crate::images::Upload;

use super::super::ViewModel;

enum EdgeAction {
    Select(NodeId),
    Relabel(String),
    Reverse,
    Remove,
}

impl ViewModel {
    pub(in crate::app) fn draw_details(&mut self, ui: &mut Ui) {
        ui.heading("Author Details");
        ui.add_space(6.0);

        let Some(id) = self.selected else {
            ui.label("Select an author on the canvas.");
            return;
        };
        let Some(node) = self.editor.store().node(id) else {
            ui.label("The selected author no longer exists.");
            return;
        };

        if self.forms.editing != Some(id) {
            self.forms.editing = Some(id);
            self.forms.edit_name = node.name.clone();
            self.forms.edit_year = node.birth_year.clone().unwrap_or_default();
            self.forms.edit_tags = node.tags.as_deref().unwrap_or_default().join(", ");
            self.forms.image_path.clear();
            self.forms.edge_labels.clear();
        }

        ui.label(RichText::new(node.label()).strong());
        ui.small(format!("id {id}"));
        if !self.editor.visibility().shows_node(id) {
            ui.weak("Hidden by the current filters.");
        }
        ui.add_space(6.0);

        ui.horizontal(|ui| {
            let is_focus = self.editor.filter().focus.node == Some(id);
            let focus_label = if is_focus { "Unfocus" } else { "Focus" };
            if ui.button(focus_label).clicked() {
                self.dispatch(Command::ToggleFocus(id));
            }
            if ui
                .button("Remove author")
                .on_hover_text("Deletes the author and every link touching it.")
                .clicked()
            {
                self.dispatch(Command::RemoveNode(id));
            }
        });
        if self.selected.is_none() {
            return;
        }

        ui.separator();
        self.draw_node_form(ui, id);
        ui.separator();
        self.draw_images(ui, id);
        ui.separator();
        self.draw_incident_edges(ui, id);
    }

    fn draw_node_form(&mut self, ui: &mut Ui, id: NodeId) {
        egui::Grid::new("node_form")
            .num_columns(2)
            .spacing([8.0, 4.0])
            .show(ui, |ui| {
                ui.label("Name");
                ui.text_edit_singleline(&mut self.forms.edit_name);
                ui.end_row();
                ui.label("Birth year");
                ui.text_edit_singleline(&mut self.forms.edit_year);
                ui.end_row();
                ui.label("Tags");
                ui.text_edit_singleline(&mut self.forms.edit_tags)
                    .on_hover_text("Comma separated.");
                ui.end_row();
            });

        if ui.button("Save author").clicked() {
            let tags = self
                .forms
                .edit_tags
                .split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(str::to_owned)
                .collect::<Vec<_>>();
            let unchanged_tags = self
                .editor
                .store()
                .node(id)
                .is_some_and(|node| node.tags.as_deref().unwrap_or_default() == tags.as_slice());

            let updated = self
                .dispatch(Command::UpdateNode {
                    id,
                    name: self.forms.edit_name.clone(),
                    birth_year: self.forms.edit_year.clone(),
                })
                .is_some();
            if updated && !unchanged_tags {
                self.dispatch(Command::SetTags { id, tags });
            }
            // Re-read the stored values on the next frame.
            self.forms.editing = None;
        }

        let mut flagged = self
            .editor
            .store()
            .node(id)
            .is_some_and(|node| node.is_flagged());
        if ui.checkbox(&mut flagged, "Flagged").changed() {
            self.dispatch(Command::SetFlagged { id, flagged });
        }
    }

    fn draw_images(&mut self, ui: &mut Ui, id: NodeId) {
        ui.label(RichText::new("Images").strong());
        let images = self
            .editor
            .store()
            .node(id)
            .map(|node| node.images.clone())
            .unwrap_or_default();

        if images.is_empty() {
            ui.weak("No images attached.");
        }
        let count = images.len();
        for (index, uri) in images.iter().enumerate() {
            ui.horizontal(|ui| {
                let name = Path::new(uri)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| uri.clone());
                if index == 0 {
                    ui.label(RichText::new(name).strong())
                        .on_hover_text(format!("Primary image\n{uri}"));
                } else {
                    ui.label(name).on_hover_text(uri.as_str());
                }

                if ui.add_enabled(index > 0, egui::Button::new("^").small()).clicked() {
                    self.dispatch(Command::MoveImage {
                        node: id,
                        index,
                        delta: -1,
                    });
                }
                if ui
                    .add_enabled(index + 1 < count, egui::Button::new("v").small())
                    .clicked()
                {
                    self.dispatch(Command::MoveImage {
                        node: id,
                        index,
                        delta: 1,
                    });
                }
                if ui.small_button("Remove").clicked() {
                    self.dispatch(Command::DetachImage { node: id, index });
                }
            });
        }

        ui.horizontal(|ui| {
            ui.add(
                egui::TextEdit::singleline(&mut self.forms.image_path)
                    .hint_text("Path to an image file"),
            );
            let can_attach = !self.forms.image_path.trim().is_empty();
            if ui
                .add_enabled(can_attach, egui::Button::new("Attach"))
                .clicked()
            {
                self.attach_image_file(id);
            }
        });
    }

    fn attach_image_file(&mut self, id: NodeId) {
        let path = Path::new(self.forms.image_path.trim()).to_path_buf();
        let upload = || -> Result<Upload> {
            let bytes =
                fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            self.images.store(id, &file_name, &bytes)
        };

        match upload() {
            Ok(Upload::Stored(uri)) => {
                self.dispatch(Command::AttachImage { node: id, uri });
                self.forms.image_path.clear();
            }
            Ok(Upload::Duplicate) => {
                self.notice = Some("That image is already stored for this author".to_owned());
                self.forms.image_path.clear();
            }
            Err(error) => {
                warn!(node = id, "image upload failed: {error:#}");
                self.notice = Some(format!("{error:#}"));
            }
        }
    }

    fn draw_incident_edges(&mut self, ui: &mut Ui, id: NodeId) {
        let edges = self
            .editor
            .store()
            .incident_edges(id)
            .cloned()
            .collect::<Vec<Edge>>();
        ui.label(RichText::new(format!("Links ({})", edges.len())).strong());
        if edges.is_empty() {
            ui.weak("No links.");
            return;
        }

        for edge in edges {
            let Some(other) = edge.other(id) else {
                continue;
            };
            let other_name = self
                .editor
                .store()
                .node(other)
                .map(|node| node.name.clone())
                .unwrap_or_else(|| format!("#{other}"));
            let arrow = if edge.id1 == id { "->" } else { "<-" };
            let hidden = !self.editor.visibility().shows_edge(edge.id);

            let mut action = None;
            ui.push_id(edge.id.raw(), |ui| {
                ui.horizontal(|ui| {
                    ui.label(arrow);
                    if ui.link(other_name).clicked() {
                        action = Some(EdgeAction::Select(other));
                    }
                    if hidden {
                        ui.weak("(hidden)");
                    }
                });

                let label = self
                    .forms
                    .edge_labels
                    .entry(edge.id)
                    .or_insert_with(|| edge.label.clone());
                ui.horizontal(|ui| {
                    ui.add(egui::TextEdit::singleline(label).desired_width(140.0));
                    if ui
                        .add_enabled(*label != edge.label, egui::Button::new("Relabel").small())
                        .clicked()
                    {
                        action = Some(EdgeAction::Relabel(label.trim().to_owned()));
                    }
                    if ui
                        .small_button("Reverse")
                        .on_hover_text("Swap the link's direction.")
                        .clicked()
                    {
                        action = Some(EdgeAction::Reverse);
                    }
                    if ui.small_button("Remove").clicked() {
                        action = Some(EdgeAction::Remove);
                    }
                });
            });

            match action {
                Some(EdgeAction::Select(node)) => self.selected = Some(node),
                Some(EdgeAction::Relabel(label)) => {
                    self.dispatch(Command::RelabelEdge { id: edge.id, label });
                    self.forms.edge_labels.remove(&edge.id);
                }
                Some(EdgeAction::Reverse) => {
                    self.dispatch(Command::ReverseEdge(edge.id));
                }
                Some(EdgeAction::Remove) => {
                    self.dispatch(Command::RemoveEdge(edge.id));
                    self.forms.edge_labels.remove(&edge.id);
                }
                None => {}
            }
            ui.add_space(2.0);
        }
    }
}
