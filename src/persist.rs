//! Loading the graph document and saving it from a background worker.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::graph::{GraphDocument, GraphStore};

/// Reads and parses the document. A missing or malformed file is an error, never an empty
/// graph.
pub fn load_document(path: &Path) -> Result<GraphDocument> {
    if !path.exists() {
        bail!("graph document {} does not exist", path.display());
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read graph document {}", path.display()))?;
    GraphDocument::from_json(&raw)
        .with_context(|| format!("failed to parse graph document {}", path.display()))
}

pub fn load_graph(path: &Path) -> Result<GraphStore> {
    let document = load_document(path)?;
    let store = GraphStore::from_document(document);
    info!(
        nodes = store.node_count(),
        edges = store.edge_count(),
        path = %path.display(),
        "loaded graph"
    );
    Ok(store)
}

/// Writes next to the target and renames over it so readers never see a partial file.
pub fn write_document(path: &Path, document: &GraphDocument) -> Result<()> {
    let json = document.to_json()?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);
    fs::write(&temp, json).with_context(|| format!("failed to write {}", temp.display()))?;
    fs::rename(&temp, path)
        .with_context(|| format!("failed to move {} into place", temp.display()))?;
    Ok(())
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    Failed(String),
}

impl SaveStatus {
    pub fn label(&self) -> String {
        match self {
            Self::Idle => "No changes".to_owned(),
            Self::Saving => "Saving...".to_owned(),
            Self::Saved => "Saved".to_owned(),
            Self::Failed(reason) => format!("Save failed: {reason}"),
        }
    }
}

/// Fire-and-forget document sink. Submissions queue on a worker thread; each write reports
/// back once, failures are not retried.
pub struct FileSink {
    path: PathBuf,
    jobs: Sender<GraphDocument>,
    updates: Receiver<SaveStatus>,
    status: SaveStatus,
    pending: usize,
}

impl FileSink {
    pub fn spawn(path: PathBuf) -> Self {
        let (jobs, job_rx) = mpsc::channel::<GraphDocument>();
        let (update_tx, updates) = mpsc::channel();
        let target = path.clone();

        thread::spawn(move || {
            for document in job_rx {
                let status = match write_document(&target, &document) {
                    Ok(()) => {
                        info!(path = %target.display(), nodes = document.nodes.len(), "saved graph");
                        SaveStatus::Saved
                    }
                    Err(error) => {
                        warn!(path = %target.display(), "save failed: {error:#}");
                        SaveStatus::Failed(format!("{error:#}"))
                    }
                };
                if update_tx.send(status).is_err() {
                    break;
                }
            }
        });

        Self {
            path,
            jobs,
            updates,
            status: SaveStatus::Idle,
            pending: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn submit(&mut self, document: GraphDocument) {
        self.status = match self.jobs.send(document) {
            Ok(()) => {
                self.pending += 1;
                SaveStatus::Saving
            }
            Err(_) => SaveStatus::Failed("save worker stopped".to_owned()),
        };
    }

    /// Drains worker updates. Stays `Saving` while later submissions are still queued.
    pub fn poll(&mut self) -> &SaveStatus {
        loop {
            match self.updates.try_recv() {
                Ok(status) => {
                    self.pending = self.pending.saturating_sub(1);
                    self.status = if self.pending > 0 && status == SaveStatus::Saved {
                        SaveStatus::Saving
                    } else {
                        status
                    };
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.status == SaveStatus::Saving {
                        self.status = SaveStatus::Failed("save worker stopped".to_owned());
                    }
                    break;
                }
            }
        }
        &self.status
    }

    pub fn status(&self) -> &SaveStatus {
        &self.status
    }
}
