use std::sync::Arc;
use std::thread;
use std::time::Duration;

use eframe::egui::{self, Align, Color32, Context, Layout, RichText, Vec2};
use tracing::warn;

use crate::editor::{Command, Editor, Outcome};
use crate::filter::{FilterState, ViewState};
use crate::graph::GraphStore;
use crate::images::DirImageStore;
use crate::layout::LayoutMode;
use crate::persist::{FileSink, SaveStatus};

use super::super::{Forms, Launch, ViewModel};

impl ViewModel {
    pub(in crate::app) fn new(store: GraphStore, launch: &Launch) -> Self {
        let mut notice = None;
        let defaults = ViewState {
            filter: FilterState::for_store(&store),
            layout: LayoutMode::default(),
        };

        let mut view = launch
            .view
            .as_deref()
            .and_then(|query| match ViewState::from_query(query, &defaults) {
                Ok(view) => Some(view),
                Err(error) => {
                    warn!(%error, "ignoring initial view");
                    notice = Some(format!("Ignored initial view: {error}"));
                    None
                }
            });
        if let Some(layout) = launch.layout {
            view.get_or_insert_with(|| defaults.clone()).layout = layout;
        }

        let editor = Editor::new(store, &launch.config, view);
        let forms = Forms {
            search: editor.filter().search.clone(),
            ..Forms::default()
        };

        Self {
            editor,
            sink: FileSink::spawn(launch.data.clone()),
            images: Arc::new(DirImageStore::new(launch.images.clone())),
            selected: None,
            pan: Vec2::ZERO,
            zoom: 1.0,
            notice,
            review: None,
            forms,
        }
    }

    pub(in crate::app) fn show(&mut self, ctx: &Context, reload_requested: &mut bool) {
        let saving = *self.sink.poll() == SaveStatus::Saving;
        if saving {
            ctx.request_repaint_after(Duration::from_millis(100));
        }

        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("author-graph");
                    ui.separator();
                    ui.label(self.sink.path().display().to_string());
                    let store = self.editor.store();
                    let visibility = self.editor.visibility();
                    ui.label(format!(
                        "authors: {} ({} shown)",
                        store.node_count(),
                        visibility.nodes.len()
                    ));
                    ui.label(format!(
                        "links: {} ({} shown)",
                        store.edge_count(),
                        visibility.edges.len()
                    ));

                    let status = self.sink.status();
                    let status_text = RichText::new(status.label());
                    ui.label(match status {
                        SaveStatus::Failed(_) => status_text.color(Color32::from_rgb(236, 110, 98)),
                        _ => status_text,
                    });

                    let reload_button = ui
                        .add_enabled(!saving, egui::Button::new("Reload"))
                        .on_hover_text("Discard the session and load the document again.");
                    if reload_button.clicked() {
                        *reload_requested = true;
                    }

                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        if let Some(notice) = &self.notice {
                            let dismiss = ui.small_button("x").clicked();
                            ui.label(RichText::new(notice.as_str()).color(Color32::from_rgb(246, 206, 104)));
                            if dismiss {
                                self.notice = None;
                            }
                        }
                    });
                });

                ui.horizontal(|ui| {
                    let query = self.editor.view_query();
                    ui.label("view:");
                    if query.is_empty() {
                        ui.weak("default");
                    } else {
                        ui.monospace(query.as_str());
                    }
                    if ui
                        .small_button("Copy")
                        .on_hover_text("Copy the shareable view string.")
                        .clicked()
                    {
                        ui.ctx().copy_text(query);
                    }
                    if ui
                        .small_button("Reset view")
                        .on_hover_text("Restore the default filters and layout.")
                        .clicked()
                    {
                        let defaults = self.editor.default_view().clone();
                        self.forms.search = defaults.filter.search.clone();
                        self.dispatch(Command::RestoreView(defaults));
                    }
                });
            });

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(340.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical()
                    .id_salt("controls_scroll")
                    .show(ui, |ui| self.draw_controls(ui));
            });

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(360.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical()
                    .id_salt("details_scroll")
                    .show(ui, |ui| self.draw_details(ui));
            });

        egui::CentralPanel::default().show(ctx, |ui| self.draw_graph(ui));
    }

    /// Runs a command, saves on structural change, and surfaces rejections as a notice.
    pub(in crate::app) fn dispatch(&mut self, command: Command) -> Option<Outcome> {
        match self.editor.apply(command) {
            Ok(outcome) => {
                if self.editor.take_dirty() {
                    self.sink.submit(self.editor.document());
                }
                if self
                    .selected
                    .is_some_and(|id| !self.editor.store().contains(id))
                {
                    self.selected = None;
                }
                if let Outcome::ImageDetached(uri) = &outcome {
                    self.delete_image(uri.clone());
                }
                Some(outcome)
            }
            Err(error) => {
                warn!(%error, "command rejected");
                self.notice = Some(error.to_string());
                None
            }
        }
    }

    fn delete_image(&self, uri: String) {
        let images = Arc::clone(&self.images);
        thread::spawn(move || {
            if let Err(error) = images.delete(&uri) {
                warn!(uri = %uri, "failed to delete image: {error:#}");
            }
        });
    }
}
