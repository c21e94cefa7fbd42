mod document;
mod duplicates;
mod neighborhood;
mod store;

use eframe::egui::Vec2;
use serde_json::{Map, Value};

use crate::util::parse_year;

pub use document::GraphDocument;
pub use duplicates::{EdgeReviewGroup, MergeReport};
pub use neighborhood::expand;
pub use store::{GraphError, GraphStore};

pub type NodeId = u64;

/// Synthetic edge identity, assigned when the edge enters the store and never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(u64);

impl EdgeId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Simulation-side state of a node. `fx`/`fy` override free integration per axis.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Body {
    pub pos: Vec2,
    pub velocity: Vec2,
    pub fx: Option<f32>,
    pub fy: Option<f32>,
}

impl Body {
    pub fn pin_here(&mut self) {
        self.fx = Some(self.pos.x);
        self.fy = Some(self.pos.y);
    }

    pub fn unpin(&mut self) {
        self.fx = None;
        self.fy = None;
    }

    pub fn is_pinned(&self) -> bool {
        self.fx.is_some() || self.fy.is_some()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub birth_year: Option<String>,
    /// Ordered image URIs; the first one is the node's primary image.
    pub images: Vec<String>,
    pub flagged: Option<bool>,
    pub tags: Option<Vec<String>>,
    /// Document fields the editor does not model, kept for round-trip export.
    pub extra: Map<String, Value>,
    pub body: Body,
}

impl Node {
    pub fn new(id: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            birth_year: None,
            images: Vec::new(),
            flagged: None,
            tags: None,
            extra: Map::new(),
            body: Body::default(),
        }
    }

    pub fn with_year(mut self, year: impl Into<String>) -> Self {
        self.birth_year = Some(year.into());
        self
    }

    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    /// Parsed birth year; `None` means unknown.
    pub fn year(&self) -> Option<i32> {
        self.birth_year.as_deref().and_then(parse_year)
    }

    pub fn is_flagged(&self) -> bool {
        self.flagged == Some(true)
    }

    pub fn label(&self) -> String {
        match self.birth_year.as_deref() {
            Some(year) if !year.is_empty() => format!("{} ({year})", self.name),
            _ => self.name.clone(),
        }
    }
}

/// A directed, labeled relationship. Reachability treats it as undirected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edge {
    pub id: EdgeId,
    pub id1: NodeId,
    pub id2: NodeId,
    pub label: String,
}

impl Edge {
    pub fn touches(&self, node: NodeId) -> bool {
        self.id1 == node || self.id2 == node
    }

    pub fn other(&self, node: NodeId) -> Option<NodeId> {
        if self.id1 == node {
            Some(self.id2)
        } else if self.id2 == node {
            Some(self.id1)
        } else {
            None
        }
    }

    pub fn unordered_pair(&self) -> (NodeId, NodeId) {
        (self.id1.min(self.id2), self.id1.max(self.id2))
    }
}
