//! Command dispatch over the graph, filters, layout and simulation.
//!
//! Every command mutates state, then visibility is recomputed from scratch and the layout
//! re-derives its pins. Structural edits mark the editor dirty so the shell can save.

use std::collections::HashSet;

use eframe::egui::Pos2;
use tracing::{debug, info};

use crate::config::EditorConfig;
use crate::filter::{
    FilterState, Focus, ViewState, Visibility, YearRange, compute_visibility, search_matches,
};
use crate::graph::{
    EdgeId, EdgeReviewGroup, GraphDocument, GraphError, GraphStore, MergeReport, NodeId,
};
use crate::layout::{LayoutMode, LayoutState, SimulationRequest};
use crate::physics::{Simulation, StepReport};

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    SetSearch(String),
    SetYearRange(Option<YearRange>),
    SetOnlyFlagged(bool),
    SetShowFlaggedHighlight(bool),
    /// `None` clears the focus and resets the depth.
    SetFocus {
        node: Option<NodeId>,
        depth: usize,
    },
    SetDepth(usize),
    /// Focuses the node, or clears the focus if it already is the focus.
    ToggleFocus(NodeId),
    SetLayout(LayoutMode),
    RestoreView(ViewState),
    AddNode {
        name: String,
        birth_year: Option<String>,
    },
    UpdateNode {
        id: NodeId,
        name: String,
        birth_year: String,
    },
    SetFlagged {
        id: NodeId,
        flagged: bool,
    },
    SetTags {
        id: NodeId,
        tags: Vec<String>,
    },
    RemoveNode(NodeId),
    AddEdge {
        from: NodeId,
        to: NodeId,
        label: String,
    },
    RemoveEdge(EdgeId),
    RelabelEdge {
        id: EdgeId,
        label: String,
    },
    ReverseEdge(EdgeId),
    AttachImage {
        node: NodeId,
        uri: String,
    },
    DetachImage {
        node: NodeId,
        index: usize,
    },
    MoveImage {
        node: NodeId,
        index: usize,
        delta: isize,
    },
    RemoveDuplicateEdges,
    MergeDuplicateNodes,
    ApplyEdgeReview(Vec<EdgeReviewGroup>),
    Perturb,
    Dampen,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Unchanged,
    Updated,
    NodeAdded(NodeId),
    EdgeAdded(EdgeId),
    /// URI of the detached image, for the image store to delete.
    ImageDetached(String),
    EdgesRemoved(usize),
    Merged(MergeReport),
}

/// What a command touched, deciding how much gets recomputed.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Effect {
    Nothing,
    Highlight,
    Visibility,
    Structure,
}

pub struct Editor {
    store: GraphStore,
    filter: FilterState,
    defaults: ViewState,
    layout: LayoutState,
    simulation: Simulation,
    visibility: Visibility,
    matches: HashSet<NodeId>,
    dirty: bool,
}

impl Editor {
    pub fn new(store: GraphStore, config: &EditorConfig, view: Option<ViewState>) -> Self {
        let filter = FilterState::for_store(&store);
        let defaults = ViewState {
            filter: filter.clone(),
            layout: LayoutMode::default(),
        };
        let view = view.unwrap_or_else(|| defaults.clone());

        let mut editor = Self {
            store,
            filter: view.filter,
            defaults,
            layout: LayoutState::new(view.layout, config.layout),
            simulation: Simulation::new(config.forces, config.stabilizer),
            visibility: Visibility::default(),
            matches: HashSet::new(),
            dirty: false,
        };
        editor.refresh(true);
        editor
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn visibility(&self) -> &Visibility {
        &self.visibility
    }

    pub fn layout(&self) -> &LayoutState {
        &self.layout
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    pub fn simulation_mut(&mut self) -> &mut Simulation {
        &mut self.simulation
    }

    /// Nodes highlighted by the current search term.
    pub fn search_matches(&self) -> &HashSet<NodeId> {
        &self.matches
    }

    pub fn view_state(&self) -> ViewState {
        ViewState {
            filter: self.filter.clone(),
            layout: self.layout.mode(),
        }
    }

    pub fn default_view(&self) -> &ViewState {
        &self.defaults
    }

    /// Shareable `key=value` form of the current view, defaults omitted.
    pub fn view_query(&self) -> String {
        self.view_state().to_query(&self.defaults)
    }

    pub fn document(&self) -> GraphDocument {
        self.store.to_document()
    }

    /// Returns whether the graph changed since the last call.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn apply(&mut self, command: Command) -> Result<Outcome, GraphError> {
        debug!(?command, "applying command");
        let (effect, outcome) = self.execute(command)?;

        match effect {
            Effect::Nothing => {}
            Effect::Highlight => self.matches = search_matches(&self.store, &self.filter.search),
            Effect::Visibility => self.refresh(true),
            Effect::Structure => {
                self.dirty = true;
                if self
                    .filter
                    .focus
                    .node
                    .is_some_and(|node| !self.store.contains(node))
                {
                    self.filter.focus = Focus::default();
                }
                self.refresh(false);
            }
        }

        Ok(outcome)
    }

    fn execute(&mut self, command: Command) -> Result<(Effect, Outcome), GraphError> {
        let store = &mut self.store;
        let filter = &mut self.filter;

        Ok(match command {
            Command::SetSearch(term) => {
                filter.search = term;
                (Effect::Highlight, Outcome::Updated)
            }
            Command::SetYearRange(range) => {
                filter.year_range = range;
                (Effect::Visibility, Outcome::Updated)
            }
            Command::SetOnlyFlagged(only) => {
                filter.only_flagged = only;
                (Effect::Visibility, Outcome::Updated)
            }
            Command::SetShowFlaggedHighlight(show) => {
                filter.show_flagged_highlight = show;
                (Effect::Nothing, Outcome::Updated)
            }
            Command::SetFocus { node, depth } => {
                filter.focus = match node {
                    Some(node) => Focus {
                        node: Some(node),
                        depth,
                    },
                    None => Focus::default(),
                };
                (Effect::Visibility, Outcome::Updated)
            }
            Command::SetDepth(depth) => {
                filter.focus.depth = depth;
                (Effect::Visibility, Outcome::Updated)
            }
            Command::ToggleFocus(node) => {
                filter.focus = if filter.focus.node == Some(node) {
                    Focus::default()
                } else {
                    Focus {
                        node: Some(node),
                        depth: filter.focus.depth,
                    }
                };
                (Effect::Visibility, Outcome::Updated)
            }
            Command::SetLayout(mode) => {
                let request = self
                    .layout
                    .switch_mode(mode, &mut self.store, &self.visibility);
                self.simulation.apply(request);
                (Effect::Nothing, Outcome::Updated)
            }
            Command::RestoreView(view) => {
                *filter = view.filter;
                self.visibility = compute_visibility(store, filter);
                let request = self
                    .layout
                    .switch_mode(view.layout, &mut self.store, &self.visibility);
                self.simulation.apply(request);
                (Effect::Visibility, Outcome::Updated)
            }
            Command::AddNode { name, birth_year } => {
                let id = store.add_node(&name, birth_year.as_deref())?;
                (Effect::Structure, Outcome::NodeAdded(id))
            }
            Command::UpdateNode {
                id,
                name,
                birth_year,
            } => {
                store.update_node(id, &name, Some(birth_year.as_str()))?;
                (Effect::Structure, Outcome::Updated)
            }
            Command::SetFlagged { id, flagged } => {
                store.set_flagged(id, flagged)?;
                (Effect::Structure, Outcome::Updated)
            }
            Command::SetTags { id, tags } => {
                store.set_tags(id, tags)?;
                (Effect::Structure, Outcome::Updated)
            }
            Command::RemoveNode(id) => {
                let removed = store.remove_node(id)?;
                info!(id, name = %removed.name, "removed node");
                (Effect::Structure, Outcome::Updated)
            }
            Command::AddEdge { from, to, label } => {
                let id = store.add_edge(from, to, &label)?;
                (Effect::Structure, Outcome::EdgeAdded(id))
            }
            Command::RemoveEdge(id) => {
                store.remove_edge(id)?;
                (Effect::Structure, Outcome::Updated)
            }
            Command::RelabelEdge { id, label } => {
                store.relabel_edge(id, &label)?;
                (Effect::Structure, Outcome::Updated)
            }
            Command::ReverseEdge(id) => {
                store.reverse_edge(id)?;
                (Effect::Structure, Outcome::Updated)
            }
            Command::AttachImage { node, uri } => {
                if store.attach_image(node, &uri)? {
                    (Effect::Structure, Outcome::Updated)
                } else {
                    (Effect::Nothing, Outcome::Unchanged)
                }
            }
            Command::DetachImage { node, index } => {
                let uri = store.detach_image(node, index)?;
                (Effect::Structure, Outcome::ImageDetached(uri))
            }
            Command::MoveImage { node, index, delta } => {
                if store.move_image(node, index, delta)? {
                    (Effect::Structure, Outcome::Updated)
                } else {
                    (Effect::Nothing, Outcome::Unchanged)
                }
            }
            Command::RemoveDuplicateEdges => match store.remove_duplicate_edges() {
                0 => (Effect::Nothing, Outcome::EdgesRemoved(0)),
                removed => (Effect::Structure, Outcome::EdgesRemoved(removed)),
            },
            Command::MergeDuplicateNodes => {
                let report = store.merge_duplicate_nodes();
                let effect = if report == MergeReport::default() {
                    Effect::Nothing
                } else {
                    Effect::Structure
                };
                (effect, Outcome::Merged(report))
            }
            Command::ApplyEdgeReview(groups) => match store.apply_edge_review(&groups) {
                0 => (Effect::Nothing, Outcome::EdgesRemoved(0)),
                removed => (Effect::Structure, Outcome::EdgesRemoved(removed)),
            },
            Command::Perturb => {
                self.simulation.perturb(store, &self.visibility);
                let request = match self.layout.mode() {
                    LayoutMode::Force => {
                        SimulationRequest::Reheat(self.simulation.forces().perturb_alpha)
                    }
                    LayoutMode::Tiers => SimulationRequest::Nudge(self.layout.config().tier_alpha),
                };
                self.simulation.apply(request);
                (Effect::Nothing, Outcome::Updated)
            }
            Command::Dampen => {
                self.simulation.dampen(store);
                (Effect::Nothing, Outcome::Updated)
            }
        })
    }

    /// Recomputes visibility and pins. Without `restart`, the layout restarts only when the
    /// visible node set changed; edits that leave the visible graph as it was (tags, labels,
    /// images) keep the simulation's energy and any dragged positions. A changed tier
    /// assignment still reheats.
    fn refresh(&mut self, restart: bool) {
        let next = compute_visibility(&self.store, &self.filter);
        let nodes_changed = next.nodes != self.visibility.nodes;
        let edges_changed = next.edges != self.visibility.edges;
        self.visibility = next;
        self.matches = search_matches(&self.store, &self.filter.search);

        let restart = restart || nodes_changed;
        let request = self
            .layout
            .refresh(&mut self.store, &self.visibility, restart);
        if restart || edges_changed || matches!(request, SimulationRequest::Reheat(_)) {
            self.simulation.apply(request);
        }
    }

    /// Advances the simulation by one frame when it still has energy.
    pub fn tick(&mut self, delta_seconds: f32) -> StepReport {
        self.simulation
            .set_stabilizing(self.layout.mode() == LayoutMode::Force);
        self.simulation
            .step(&mut self.store, &self.visibility, delta_seconds)
    }

    pub fn is_settling(&self) -> bool {
        self.simulation.is_active()
    }

    pub fn set_canvas_width(&mut self, width: f32) {
        self.layout.set_width(width);
    }

    pub fn drag_start(&mut self, node: NodeId) {
        let request = self.layout.drag_start(&mut self.store, node);
        self.simulation.apply(request);
    }

    pub fn drag_to(&mut self, node: NodeId, pos: Pos2) {
        self.layout.drag_to(&mut self.store, node, pos);
    }

    pub fn drag_end(&mut self, node: NodeId) {
        let request = self.layout.drag_end(&mut self.store, &self.visibility, node);
        self.simulation.apply(request);
    }
}

#[cfg(test)]
mod tests {
    use eframe::egui::pos2;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::graph::Node;

    fn library() -> GraphStore {
        let mut store = GraphStore::new();
        store.insert_node(Node::new(1, "Edgar Allan Poe").with_year("1809"));
        store.insert_node(Node::new(2, "Charles Baudelaire").with_year("1821"));
        store.insert_node(Node::new(3, "Stéphane Mallarmé").with_year("1842"));
        store.insert_node(Node::new(4, "Jules Verne").with_year("1828"));
        store.add_edge(2, 1, "translated").unwrap();
        store.add_edge(3, 2, "admired").unwrap();
        store.add_edge(4, 1, "continued").unwrap();
        store
    }

    fn editor() -> Editor {
        Editor::new(library(), &EditorConfig::default(), None)
    }

    fn visible(editor: &Editor) -> Vec<NodeId> {
        let mut ids = editor.visibility().nodes.iter().copied().collect::<Vec<_>>();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn starts_with_everything_visible() {
        let editor = editor();
        assert_eq!(visible(&editor), vec![1, 2, 3, 4]);
        assert_eq!(editor.filter().year_range, Some(YearRange::new(1809, 1842)));
        assert_eq!(editor.view_query(), "");
        assert!(editor.is_settling());
    }

    #[test]
    fn focus_and_depth_narrow_visibility() {
        let mut editor = editor();
        editor
            .apply(Command::SetFocus {
                node: Some(3),
                depth: 1,
            })
            .unwrap();
        assert_eq!(visible(&editor), vec![2, 3]);

        editor.apply(Command::SetDepth(2)).unwrap();
        assert_eq!(visible(&editor), vec![1, 2, 3]);
        assert_eq!(editor.view_query(), "focus=3&depth=2");

        editor.apply(Command::ToggleFocus(3)).unwrap();
        assert_eq!(visible(&editor), vec![1, 2, 3, 4]);
        assert_eq!(editor.filter().focus, Focus::default());
    }

    #[test]
    fn focus_node_is_the_only_pin_in_force_mode() {
        let mut editor = editor();
        editor.apply(Command::ToggleFocus(2)).unwrap();
        let pinned = editor
            .store()
            .nodes()
            .iter()
            .filter(|node| node.body.is_pinned())
            .map(|node| node.id)
            .collect::<Vec<_>>();
        assert_eq!(pinned, vec![2]);
        assert_eq!(editor.simulation().alpha(), 1.0);
    }

    #[test]
    fn search_highlights_without_hiding() {
        let mut editor = editor();
        editor.apply(Command::SetSearch(" verne".to_owned())).unwrap();
        assert_eq!(editor.search_matches(), &HashSet::from([4]));
        assert_eq!(visible(&editor).len(), 4);
        assert!(!editor.take_dirty());
    }

    #[test]
    fn structural_edits_mark_dirty_once() {
        let mut editor = editor();
        let outcome = editor
            .apply(Command::AddNode {
                name: "Arthur Rimbaud".to_owned(),
                birth_year: Some("1854".to_owned()),
            })
            .unwrap();
        assert_eq!(outcome, Outcome::NodeAdded(5));
        assert!(editor.take_dirty());
        assert!(!editor.take_dirty());

        let Outcome::EdgeAdded(edge) = editor
            .apply(Command::AddEdge {
                from: 5,
                to: 3,
                label: "visited".to_owned(),
            })
            .unwrap()
        else {
            panic!("expected a new edge");
        };
        assert_eq!(editor.store().edge(edge).unwrap().label, "visited");
        assert!(editor.take_dirty());
    }

    #[test]
    fn failed_edits_leave_state_alone() {
        let mut editor = editor();
        assert_eq!(
            editor.apply(Command::AddEdge {
                from: 1,
                to: 1,
                label: "self".to_owned()
            }),
            Err(GraphError::SelfLoop(1))
        );
        assert_eq!(
            editor.apply(Command::RemoveNode(42)),
            Err(GraphError::UnknownNode(42))
        );
        assert!(!editor.take_dirty());
        assert_eq!(editor.store().edge_count(), 3);
    }

    #[test]
    fn removing_the_focus_node_clears_focus() {
        let mut editor = editor();
        editor
            .apply(Command::SetFocus {
                node: Some(1),
                depth: 3,
            })
            .unwrap();
        editor.apply(Command::RemoveNode(1)).unwrap();

        assert_eq!(editor.filter().focus, Focus::default());
        assert_eq!(visible(&editor), vec![2, 3, 4]);
        assert_eq!(editor.store().edge_count(), 1);
    }

    #[test]
    fn merge_goes_through_the_editor() {
        let mut store = library();
        store.insert_node(Node::new(9, "edgar allan poe "));
        store.add_edge(4, 9, "continued").unwrap();
        let mut editor = Editor::new(store, &EditorConfig::default(), None);
        editor.apply(Command::ToggleFocus(9)).unwrap();

        let outcome = editor.apply(Command::MergeDuplicateNodes).unwrap();

        assert_eq!(
            outcome,
            Outcome::Merged(MergeReport {
                nodes_merged: 1,
                edges_removed: 1
            })
        );
        assert!(editor.take_dirty());
        assert_eq!(editor.filter().focus.node, None);
        assert_eq!(
            editor.apply(Command::MergeDuplicateNodes).unwrap(),
            Outcome::Merged(MergeReport::default())
        );
        assert!(!editor.take_dirty());
    }

    #[test]
    fn image_commands_report_their_effect() {
        let mut editor = editor();
        let attach = |uri: &str| Command::AttachImage {
            node: 1,
            uri: uri.to_owned(),
        };
        assert_eq!(editor.apply(attach("images/1_a.png")).unwrap(), Outcome::Updated);
        assert_eq!(editor.apply(attach("images/1_a.png")).unwrap(), Outcome::Unchanged);
        editor.apply(attach("images/1_b.png")).unwrap();
        editor.take_dirty();

        editor
            .apply(Command::MoveImage {
                node: 1,
                index: 1,
                delta: -1,
            })
            .unwrap();
        assert_eq!(
            editor.store().node(1).unwrap().primary_image(),
            Some("images/1_b.png")
        );

        assert_eq!(
            editor
                .apply(Command::DetachImage { node: 1, index: 0 })
                .unwrap(),
            Outcome::ImageDetached("images/1_b.png".to_owned())
        );
        assert!(editor.take_dirty());
    }

    #[test]
    fn layout_switch_and_view_restore() {
        let mut editor = editor();
        editor.apply(Command::SetLayout(LayoutMode::Tiers)).unwrap();
        assert_eq!(editor.layout().rows().len(), 4);
        assert_eq!(editor.view_query(), "layout=tiers");

        let view = ViewState::from_query("focus=1&onlyFlagged=false", editor.default_view())
            .unwrap();
        editor.apply(Command::RestoreView(view)).unwrap();
        assert_eq!(editor.layout().mode(), LayoutMode::Force);
        assert_eq!(visible(&editor), vec![1, 2, 4]);
    }

    #[test]
    fn restore_view_from_startup() {
        let store = library();
        let defaults = ViewState {
            filter: FilterState::for_store(&store),
            layout: LayoutMode::Force,
        };
        let view = ViewState::from_query("layout=tiers&yearMax=1825", &defaults).unwrap();
        let editor = Editor::new(store, &EditorConfig::default(), Some(view));

        assert_eq!(editor.layout().mode(), LayoutMode::Tiers);
        assert_eq!(visible(&editor), vec![1, 2]);
        assert_eq!(editor.view_query(), "yearMax=1825&layout=tiers");
    }

    #[test]
    fn dragging_in_force_mode_pins_until_release() {
        let mut editor = editor();
        editor.drag_start(4);
        editor.drag_to(4, pos2(10.0, 20.0));
        editor.tick(1.0 / 60.0);
        assert_eq!(
            editor.store().node(4).unwrap().body.pos,
            pos2(10.0, 20.0).to_vec2()
        );
        assert_eq!(editor.simulation().alpha_target(), 0.3);

        editor.drag_end(4);
        assert!(!editor.store().node(4).unwrap().body.is_pinned());
        assert_eq!(editor.simulation().alpha_target(), 0.0);
    }

    #[test]
    fn ticks_settle_the_layout() {
        let mut editor = editor();
        let mut ticks = 0;
        while editor.is_settling() && ticks < 5_000 {
            editor.tick(1.0 / 60.0);
            ticks += 1;
        }
        assert!(!editor.is_settling());
        for node in editor.store().nodes() {
            assert!(node.body.pos.x.is_finite() && node.body.pos.y.is_finite());
        }
    }

    #[test]
    fn perturb_and_dampen_adjust_energy() {
        let mut editor = editor();
        editor.simulation_mut().reheat(0.0);
        editor.apply(Command::Perturb).unwrap();
        assert_eq!(editor.simulation().alpha(), 0.8);

        editor.apply(Command::SetLayout(LayoutMode::Tiers)).unwrap();
        editor.simulation_mut().reheat(0.0);
        editor.apply(Command::Perturb).unwrap();
        assert_eq!(editor.simulation().alpha(), 0.3);
        editor.apply(Command::Dampen).unwrap();
    }

    #[test]
    fn edits_that_keep_the_visible_graph_do_not_restart_force() {
        let mut editor = editor();
        editor.simulation_mut().reheat(0.0);
        let edge = editor.store().edges()[0].id;

        editor
            .apply(Command::RelabelEdge {
                id: edge,
                label: "read".to_owned(),
            })
            .unwrap();
        editor
            .apply(Command::SetTags {
                id: 1,
                tags: vec!["gothic".to_owned()],
            })
            .unwrap();
        assert!(editor.take_dirty());
        assert_eq!(editor.simulation().alpha(), 0.0);

        editor
            .apply(Command::AddNode {
                name: "Jorge Luis Borges".to_owned(),
                birth_year: None,
            })
            .unwrap();
        assert_eq!(editor.simulation().alpha(), 1.0);
    }

    #[test]
    fn tier_edits_keep_dragged_positions() {
        let mut editor = editor();
        editor.apply(Command::SetLayout(LayoutMode::Tiers)).unwrap();
        editor.drag_start(4);
        editor.drag_to(4, pos2(321.0, 0.0));
        editor.drag_end(4);
        let row_y = editor.store().node(4).unwrap().body.fy;

        editor
            .apply(Command::SetTags {
                id: 1,
                tags: vec!["gothic".to_owned()],
            })
            .unwrap();

        let node = editor.store().node(4).unwrap();
        assert_eq!(node.body.pos.x, 321.0);
        assert_eq!(node.body.fy, row_y);
    }
}
