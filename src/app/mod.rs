use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread;

use eframe::egui::{self, Context, Vec2};

use crate::config::EditorConfig;
use crate::editor::Editor;
use crate::graph::{EdgeId, EdgeReviewGroup, GraphStore, NodeId};
use crate::images::ImageStore;
use crate::layout::LayoutMode;
use crate::persist::{FileSink, load_graph};

mod graph;
mod render_utils;
mod ui;

/// Everything the shell needs to (re)load a session.
#[derive(Clone, Debug)]
pub struct Launch {
    pub data: PathBuf,
    pub images: PathBuf,
    pub view: Option<String>,
    pub layout: Option<LayoutMode>,
    pub config: EditorConfig,
}

pub struct AuthorGraphApp {
    launch: Launch,
    state: AppState,
}

enum AppState {
    Loading {
        rx: Receiver<Result<GraphStore, String>>,
    },
    Ready(Box<ViewModel>),
    Error(String),
}

struct ViewModel {
    editor: Editor,
    sink: FileSink,
    images: Arc<dyn ImageStore>,
    selected: Option<NodeId>,
    pan: Vec2,
    zoom: f32,
    notice: Option<String>,
    review: Option<Vec<EdgeReviewGroup>>,
    forms: Forms,
}

/// Text buffers behind the editing widgets.
#[derive(Default)]
struct Forms {
    search: String,
    focus_query: String,
    node_name: String,
    node_year: String,
    edge_from_query: String,
    edge_to_query: String,
    edge_from: Option<NodeId>,
    edge_to: Option<NodeId>,
    edge_label: String,
    editing: Option<NodeId>,
    edit_name: String,
    edit_year: String,
    edit_tags: String,
    image_path: String,
    edge_labels: HashMap<EdgeId, String>,
}

impl AuthorGraphApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, launch: Launch) -> Self {
        let state = Self::start_load(&launch);
        Self { launch, state }
    }

    fn start_load(launch: &Launch) -> AppState {
        let (tx, rx) = mpsc::channel();
        let path = launch.data.clone();

        thread::spawn(move || {
            let result = load_graph(&path).map_err(|error| format!("{error:#}"));
            let _ = tx.send(result);
        });

        AppState::Loading { rx }
    }
}

impl eframe::App for AuthorGraphApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;

        match &mut self.state {
            AppState::Loading { rx } => {
                if let Ok(result) = rx.try_recv() {
                    transition = Some(match result {
                        Ok(store) => AppState::Ready(Box::new(ViewModel::new(store, &self.launch))),
                        Err(error) => AppState::Error(error),
                    });
                }

                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Loading author graph...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
                ctx.request_repaint();
            }
            AppState::Error(error) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to load the author graph");
                    ui.add_space(6.0);
                    ui.label(error.as_str());
                    ui.add_space(10.0);
                    if ui.button("Retry").clicked() {
                        transition = Some(Self::start_load(&self.launch));
                    }
                });
            }
            AppState::Ready(model) => {
                let mut reload_requested = false;
                model.show(ctx, &mut reload_requested);
                if reload_requested {
                    transition = Some(Self::start_load(&self.launch));
                }
            }
        }

        if let Some(next_state) = transition {
            self.state = next_state;
        }
    }
}
