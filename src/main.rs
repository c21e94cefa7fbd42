mod app;
mod config;
mod editor;
mod filter;
mod graph;
mod images;
mod layout;
mod persist;
mod physics;
mod util;

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::EditorConfig;
use crate::layout::LayoutMode;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Graph document to edit. Saved back in place.
    #[arg(long, default_value = "data/data.json")]
    data: PathBuf,

    /// Directory attached images are stored in.
    #[arg(long, default_value = "images")]
    images: PathBuf,

    /// Initial layout mode. Overrides the layout in `--view`.
    #[arg(long, value_enum)]
    layout: Option<LayoutMode>,

    /// Initial view as a `key=value&...` string, e.g. `focus=12&depth=2&layout=tiers`.
    #[arg(long)]
    view: Option<String>,

    /// JSON file with force, stabilizer and layout tuning.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "author_graph=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => EditorConfig::load(path)?,
        None => EditorConfig::default(),
    };
    let launch = app::Launch {
        data: args.data,
        images: args.images,
        view: args.view,
        layout: args.layout,
        config,
    };

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    eframe::run_native(
        "author-graph",
        options,
        Box::new(move |cc| Ok(Box::new(app::AuthorGraphApp::new(cc, launch)))),
    )
    .map_err(|error| anyhow!("failed to run the viewer: {error}"))
}
