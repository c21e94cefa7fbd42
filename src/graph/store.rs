use std::collections::HashMap;

use eframe::egui::vec2;
use thiserror::Error;
use tracing::debug;

use crate::util::stable_pair;

use super::{Edge, EdgeId, Node, NodeId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("node {0} does not exist")]
    UnknownNode(NodeId),

    #[error("edge #{} does not exist", .0.raw())]
    UnknownEdge(EdgeId),

    #[error("cannot connect node {0} to itself")]
    SelfLoop(NodeId),

    #[error("node name cannot be empty")]
    EmptyName,

    #[error("node {node} has no image at index {index}")]
    ImageIndex { node: NodeId, index: usize },

    #[error("no node ids left to assign")]
    IdsExhausted,
}

/// Owns every node and edge of the session plus the id index.
///
/// Nodes keep insertion order, edges keep insertion order and carry a stable [`EdgeId`].
/// Derived views (visibility, tiers, pins) are recomputed against the store and never cached
/// across structural edits.
#[derive(Clone, Debug)]
pub struct GraphStore {
    pub(super) nodes: Vec<Node>,
    pub(super) edges: Vec<Edge>,
    pub(super) index_by_id: HashMap<NodeId, usize>,
    pub(super) next_node_id: NodeId,
    pub(super) next_edge_id: u64,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            index_by_id: HashMap::new(),
            next_node_id: 1,
            next_edge_id: 0,
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index_by_id.contains_key(&id)
    }

    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.index_by_id.get(&id).copied()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.index_of(id).map(|index| &self.nodes[index])
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let index = self.index_of(id)?;
        self.nodes.get_mut(index)
    }

    #[cfg(test)]
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.iter().find(|edge| edge.id == id)
    }

    pub fn incident_edges(&self, node: NodeId) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().filter(move |edge| edge.touches(node))
    }

    #[cfg(test)]
    pub fn next_node_id(&self) -> NodeId {
        self.next_node_id
    }

    /// Inserts a fully formed node, keeping the id counter ahead of it.
    /// Returns `false` (and drops the node) when the id is already taken.
    pub fn insert_node(&mut self, mut node: Node) -> bool {
        if self.contains(node.id) {
            return false;
        }

        if node.body.pos == eframe::egui::Vec2::ZERO {
            node.body.pos = Self::seed_position(node.id, self.nodes.len() + 1);
        }
        self.next_node_id = self.next_node_id.max(node.id.saturating_add(1));
        self.index_by_id.insert(node.id, self.nodes.len());
        self.nodes.push(node);
        true
    }

    pub fn add_node(&mut self, name: &str, birth_year: Option<&str>) -> Result<NodeId, GraphError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GraphError::EmptyName);
        }

        let id = self.next_node_id;
        if self.contains(id) {
            return Err(GraphError::IdsExhausted);
        }
        let mut node = Node::new(id, name);
        if let Some(year) = birth_year.map(str::trim).filter(|year| !year.is_empty()) {
            node = node.with_year(year);
        }
        self.insert_node(node);
        debug!(id, name, "added node");
        Ok(id)
    }

    /// Blank `name` keeps the current name, blank `birth_year` clears it.
    pub fn update_node(
        &mut self,
        id: NodeId,
        name: &str,
        birth_year: Option<&str>,
    ) -> Result<(), GraphError> {
        let node = self.node_mut(id).ok_or(GraphError::UnknownNode(id))?;
        let name = name.trim();
        if !name.is_empty() {
            node.name = name.to_owned();
        }
        node.birth_year = birth_year
            .map(str::trim)
            .filter(|year| !year.is_empty())
            .map(str::to_owned);
        Ok(())
    }

    pub fn set_flagged(&mut self, id: NodeId, flagged: bool) -> Result<(), GraphError> {
        let node = self.node_mut(id).ok_or(GraphError::UnknownNode(id))?;
        node.flagged = Some(flagged);
        Ok(())
    }

    pub fn set_tags(&mut self, id: NodeId, tags: Vec<String>) -> Result<(), GraphError> {
        let node = self.node_mut(id).ok_or(GraphError::UnknownNode(id))?;
        node.tags = Some(tags);
        Ok(())
    }

    /// Removes the node together with every edge touching it.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node, GraphError> {
        let index = self.index_of(id).ok_or(GraphError::UnknownNode(id))?;
        let node = self.nodes.remove(index);
        self.edges.retain(|edge| !edge.touches(id));
        self.reindex();
        debug!(id, "removed node and incident edges");
        Ok(node)
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId, label: &str) -> Result<EdgeId, GraphError> {
        if from == to {
            return Err(GraphError::SelfLoop(from));
        }
        for endpoint in [from, to] {
            if !self.contains(endpoint) {
                return Err(GraphError::UnknownNode(endpoint));
            }
        }

        Ok(self.push_edge(from, to, label.to_owned()))
    }

    pub fn remove_edge(&mut self, id: EdgeId) -> Result<Edge, GraphError> {
        let position = self
            .edges
            .iter()
            .position(|edge| edge.id == id)
            .ok_or(GraphError::UnknownEdge(id))?;
        Ok(self.edges.remove(position))
    }

    pub fn relabel_edge(&mut self, id: EdgeId, label: &str) -> Result<(), GraphError> {
        let edge = self.edge_mut(id)?;
        edge.label = label.to_owned();
        Ok(())
    }

    pub fn reverse_edge(&mut self, id: EdgeId) -> Result<(), GraphError> {
        let edge = self.edge_mut(id)?;
        std::mem::swap(&mut edge.id1, &mut edge.id2);
        Ok(())
    }

    /// Appends an image URI unless the node already lists it.
    pub fn attach_image(&mut self, id: NodeId, uri: &str) -> Result<bool, GraphError> {
        let node = self.node_mut(id).ok_or(GraphError::UnknownNode(id))?;
        if node.images.iter().any(|existing| existing == uri) {
            return Ok(false);
        }
        node.images.push(uri.to_owned());
        Ok(true)
    }

    pub fn detach_image(&mut self, id: NodeId, index: usize) -> Result<String, GraphError> {
        let node = self.node_mut(id).ok_or(GraphError::UnknownNode(id))?;
        if index >= node.images.len() {
            return Err(GraphError::ImageIndex { node: id, index });
        }
        Ok(node.images.remove(index))
    }

    /// Swaps the image at `index` with its neighbor `delta` steps away.
    /// Moving past either end is a no-op and returns `false`.
    pub fn move_image(&mut self, id: NodeId, index: usize, delta: isize) -> Result<bool, GraphError> {
        let node = self.node_mut(id).ok_or(GraphError::UnknownNode(id))?;
        if index >= node.images.len() {
            return Err(GraphError::ImageIndex { node: id, index });
        }

        let Some(target) = index.checked_add_signed(delta) else {
            return Ok(false);
        };
        if target >= node.images.len() || target == index {
            return Ok(false);
        }

        node.images.swap(index, target);
        Ok(true)
    }

    /// Smallest and largest parseable birth year.
    pub fn year_extent(&self) -> Option<(i32, i32)> {
        self.nodes
            .iter()
            .filter_map(Node::year)
            .fold(None, |extent, year| match extent {
                None => Some((year, year)),
                Some((min, max)) => Some((min.min(year), max.max(year))),
            })
    }

    pub(super) fn push_edge(&mut self, id1: NodeId, id2: NodeId, label: String) -> EdgeId {
        let id = EdgeId(self.next_edge_id);
        self.next_edge_id += 1;
        self.edges.push(Edge {
            id,
            id1,
            id2,
            label,
        });
        id
    }

    pub(super) fn reindex(&mut self) {
        self.index_by_id.clear();
        for (index, node) in self.nodes.iter().enumerate() {
            self.index_by_id.insert(node.id, index);
        }
    }

    fn edge_mut(&mut self, id: EdgeId) -> Result<&mut Edge, GraphError> {
        self.edges
            .iter_mut()
            .find(|edge| edge.id == id)
            .ok_or(GraphError::UnknownEdge(id))
    }

    fn seed_position(id: NodeId, count: usize) -> eframe::egui::Vec2 {
        let (jx, jy) = stable_pair(id);
        let radius = (count as f32).sqrt() * 60.0;
        let angle = ((id as f32) * 0.618_034 + 0.11) * std::f32::consts::TAU;
        vec2(angle.cos(), angle.sin()) * radius + vec2(jx, jy) * 40.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GraphStore {
        let mut store = GraphStore::new();
        store.insert_node(Node::new(1, "Poe").with_year("1809"));
        store.insert_node(Node::new(2, "Baudelaire").with_year("1821"));
        store.insert_node(Node::new(3, "Mallarmé"));
        store
    }

    #[test]
    fn add_node_assigns_monotonic_ids() {
        let mut store = sample();
        let id = store.add_node("  Verne ", Some("1828")).unwrap();
        assert_eq!(id, 4);
        assert_eq!(store.node(id).unwrap().name, "Verne");
        assert_eq!(store.node(id).unwrap().year(), Some(1828));

        store.remove_node(id).unwrap();
        let next = store.add_node("Wells", None).unwrap();
        assert_eq!(next, 5);
    }

    #[test]
    fn add_node_after_the_largest_id_is_an_error() {
        let mut store = sample();
        assert!(store.insert_node(Node::new(NodeId::MAX, "Last")));
        assert_eq!(store.next_node_id(), NodeId::MAX);

        assert_eq!(store.add_node("Overflow", None), Err(GraphError::IdsExhausted));
        assert_eq!(store.node_count(), 4);
    }

    #[test]
    fn add_node_rejects_blank_names() {
        let mut store = sample();
        assert_eq!(store.add_node("   ", None), Err(GraphError::EmptyName));
    }

    #[test]
    fn update_node_keeps_name_when_blank_and_clears_year() {
        let mut store = sample();
        store.update_node(1, " ", Some("")).unwrap();
        let node = store.node(1).unwrap();
        assert_eq!(node.name, "Poe");
        assert_eq!(node.birth_year, None);
    }

    #[test]
    fn remove_node_drops_incident_edges_and_reindexes() {
        let mut store = sample();
        store.add_edge(1, 2, "influenced").unwrap();
        store.add_edge(2, 3, "mentored").unwrap();
        store.add_edge(3, 1, "read").unwrap();

        store.remove_node(2).unwrap();

        assert_eq!(store.edge_count(), 1);
        assert_eq!(store.index_of(3), Some(1));
        assert!(!store.contains(2));
        assert_eq!(store.remove_node(2), Err(GraphError::UnknownNode(2)));
    }

    #[test]
    fn add_edge_validates_endpoints() {
        let mut store = sample();
        assert_eq!(store.add_edge(1, 1, "x"), Err(GraphError::SelfLoop(1)));
        assert_eq!(store.add_edge(1, 9, "x"), Err(GraphError::UnknownNode(9)));
    }

    #[test]
    fn edge_ids_survive_removal_of_earlier_edges() {
        let mut store = sample();
        let first = store.add_edge(1, 2, "a").unwrap();
        let second = store.add_edge(2, 3, "b").unwrap();
        store.remove_edge(first).unwrap();

        let edge = store.edge(second).unwrap();
        assert_eq!((edge.id1, edge.id2), (2, 3));

        let third = store.add_edge(1, 3, "c").unwrap();
        assert_ne!(third, first);
    }

    #[test]
    fn reverse_and_relabel_edge() {
        let mut store = sample();
        let id = store.add_edge(1, 2, "a").unwrap();
        store.reverse_edge(id).unwrap();
        store.relabel_edge(id, "admired").unwrap();
        let edge = store.edge(id).unwrap();
        assert_eq!((edge.id1, edge.id2, edge.label.as_str()), (2, 1, "admired"));
    }

    #[test]
    fn images_keep_primary_in_front() {
        let mut store = sample();
        store.attach_image(1, "images/a.png").unwrap();
        store.attach_image(1, "images/b.png").unwrap();
        assert!(!store.attach_image(1, "images/a.png").unwrap());
        assert_eq!(store.node(1).unwrap().primary_image(), Some("images/a.png"));

        assert!(store.move_image(1, 1, -1).unwrap());
        assert_eq!(store.node(1).unwrap().primary_image(), Some("images/b.png"));
        assert!(!store.move_image(1, 0, -1).unwrap());

        let removed = store.detach_image(1, 0).unwrap();
        assert_eq!(removed, "images/b.png");
        assert_eq!(store.node(1).unwrap().primary_image(), Some("images/a.png"));
        assert_eq!(
            store.detach_image(1, 5),
            Err(GraphError::ImageIndex { node: 1, index: 5 })
        );
    }

    #[test]
    fn year_extent_ignores_unknown_years() {
        let store = sample();
        assert_eq!(store.year_extent(), Some((1809, 1821)));
        assert_eq!(GraphStore::new().year_extent(), None);
    }
}
