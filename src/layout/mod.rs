//! Force/tier layout modes and the pin bookkeeping that goes with them.

mod tiers;

use eframe::egui::{Pos2, Vec2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::filter::Visibility;
use crate::graph::{GraphStore, NodeId};

pub use tiers::{TierRow, assign_tiers};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    #[default]
    Force,
    Tiers,
}

impl LayoutMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Force => "force",
            Self::Tiers => "tiers",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "force" => Some(Self::Force),
            "tiers" | "tier" | "year" => Some(Self::Tiers),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Force => "Force",
            Self::Tiers => "Year tiers",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub row_height: f32,
    pub row_offset: f32,
    /// Lower bound for in-row spacing as a fraction of the canvas width.
    pub min_spacing_ratio: f32,
    pub min_node_spacing: f32,
    pub tier_alpha: f32,
    pub force_alpha: f32,
    pub drag_alpha_target: f32,
    pub nudge_alpha: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            row_height: 100.0,
            row_offset: 40.0,
            min_spacing_ratio: 0.06,
            min_node_spacing: 40.0,
            tier_alpha: 0.3,
            force_alpha: 1.0,
            drag_alpha_target: 0.3,
            nudge_alpha: 0.1,
        }
    }
}

/// What the layout wants the simulation to do after a transition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SimulationRequest {
    Keep,
    /// Set energy to this value and restart.
    Reheat(f32),
    /// Raise energy to at least this value.
    Nudge(f32),
    /// Hold energy around this value until the next target change.
    Target(f32),
}

#[derive(Clone, Debug)]
pub struct LayoutState {
    mode: LayoutMode,
    config: LayoutConfig,
    width: f32,
    rows: Vec<TierRow>,
    dragging: Option<NodeId>,
}

impl LayoutState {
    pub fn new(mode: LayoutMode, config: LayoutConfig) -> Self {
        Self {
            mode,
            config,
            width: 1200.0,
            rows: Vec::new(),
            dragging: None,
        }
    }

    pub fn mode(&self) -> LayoutMode {
        self.mode
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn rows(&self) -> &[TierRow] {
        &self.rows
    }

    pub fn dragging(&self) -> Option<NodeId> {
        self.dragging
    }

    /// Width used for in-row spacing. Takes effect on the next tier recompute.
    pub fn set_width(&mut self, width: f32) {
        if width.is_finite() && width > 0.0 {
            self.width = width;
        }
    }

    /// Switches mode and rebuilds every pin from scratch.
    pub fn switch_mode(
        &mut self,
        mode: LayoutMode,
        store: &mut GraphStore,
        visibility: &Visibility,
    ) -> SimulationRequest {
        if mode == self.mode {
            return SimulationRequest::Keep;
        }

        info!(from = self.mode.as_str(), to = mode.as_str(), "switching layout");
        self.mode = mode;
        self.dragging = None;
        self.rows.clear();
        self.refresh(store, visibility, true)
    }

    /// Re-derives pins after a visibility recompute.
    ///
    /// Force: every node is released except the visible focus node, which is pinned where it
    /// stands. Tiers: all pins are cleared, rows are recomputed, and members are snapped to
    /// their rows. Members are re-spread horizontally only when `restart` is set or the row
    /// assignment changed.
    pub fn refresh(
        &mut self,
        store: &mut GraphStore,
        visibility: &Visibility,
        restart: bool,
    ) -> SimulationRequest {
        match self.mode {
            LayoutMode::Force => {
                self.rows.clear();
                for node in store.nodes_mut() {
                    if Some(node.id) == visibility.focus || Some(node.id) == self.dragging {
                        node.body.pin_here();
                    } else {
                        node.body.unpin();
                    }
                }

                if restart {
                    SimulationRequest::Reheat(self.config.force_alpha)
                } else {
                    SimulationRequest::Nudge(self.config.nudge_alpha)
                }
            }
            LayoutMode::Tiers => {
                let rows = assign_tiers(store, &visibility.nodes, &self.config, self.width);
                let respread = restart || !same_members(&self.rows, &rows);
                self.rows = rows;

                for node in store.nodes_mut() {
                    node.body.unpin();
                }

                for row in &self.rows {
                    for (&id, &home_x) in row.members.iter().zip(&row.home_x) {
                        let Some(node) = store.node_mut(id) else {
                            continue;
                        };
                        node.body.fy = Some(row.y);
                        node.body.pos.y = row.y;
                        node.body.velocity.y = 0.0;
                        if respread {
                            node.body.pos.x = home_x;
                            node.body.velocity.x = 0.0;
                        }
                        if visibility.focus == Some(id) {
                            node.body.pos.x = home_x;
                            node.body.fx = Some(home_x);
                        }
                    }
                }

                debug!(rows = self.rows.len(), respread, "tier layout recomputed");
                if respread {
                    SimulationRequest::Reheat(self.config.tier_alpha)
                } else {
                    SimulationRequest::Keep
                }
            }
        }
    }

    pub fn drag_start(&mut self, store: &mut GraphStore, node: NodeId) -> SimulationRequest {
        let Some(target) = store.node_mut(node) else {
            return SimulationRequest::Keep;
        };
        self.dragging = Some(node);
        target.body.velocity = Vec2::ZERO;

        match self.mode {
            LayoutMode::Force => {
                target.body.pin_here();
                SimulationRequest::Target(self.config.drag_alpha_target)
            }
            LayoutMode::Tiers => SimulationRequest::Keep,
        }
    }

    pub fn drag_to(&mut self, store: &mut GraphStore, node: NodeId, pos: Pos2) {
        let Some(target) = store.node_mut(node) else {
            return;
        };

        match self.mode {
            LayoutMode::Force => {
                target.body.pos = pos.to_vec2();
                target.body.pin_here();
            }
            LayoutMode::Tiers => {
                target.body.pos.x = pos.x;
                target.body.velocity.x = 0.0;
                if target.body.fx.is_some() {
                    target.body.fx = Some(pos.x);
                }
            }
        }
    }

    /// Ends a drag. The focus node keeps its Force pin at the drop point and snaps back to
    /// its home slot in Tiers.
    pub fn drag_end(
        &mut self,
        store: &mut GraphStore,
        visibility: &Visibility,
        node: NodeId,
    ) -> SimulationRequest {
        if self.dragging == Some(node) {
            self.dragging = None;
        }
        let is_focus = visibility.focus == Some(node);

        match self.mode {
            LayoutMode::Force => {
                if !is_focus && let Some(target) = store.node_mut(node) {
                    target.body.unpin();
                }
                SimulationRequest::Target(0.0)
            }
            LayoutMode::Tiers => {
                if is_focus {
                    let home = self.rows.iter().find_map(|row| row.home_of(node));
                    if let (Some(home_x), Some(target)) = (home, store.node_mut(node)) {
                        target.body.pos.x = home_x;
                        target.body.fx = Some(home_x);
                        target.body.velocity.x = 0.0;
                    }
                }
                SimulationRequest::Keep
            }
        }
    }
}

fn same_members(previous: &[TierRow], next: &[TierRow]) -> bool {
    previous.len() == next.len()
        && previous
            .iter()
            .zip(next)
            .all(|(a, b)| a.key == b.key && a.members == b.members)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use eframe::egui::{pos2, vec2};
    use pretty_assertions::assert_eq;

    use super::tiers::TierKey;
    use super::*;
    use crate::filter::{FilterState, Focus, compute_visibility};
    use crate::graph::Node;

    fn store() -> GraphStore {
        let mut store = GraphStore::new();
        store.insert_node(Node::new(1, "Poe").with_year("1809"));
        store.insert_node(Node::new(2, "Tennyson").with_year("1809"));
        store.insert_node(Node::new(3, "Anonymous"));
        store.insert_node(Node::new(4, "Stevenson").with_year("1850"));
        store.add_edge(1, 2, "read").unwrap();
        store.add_edge(2, 4, "read").unwrap();
        store.add_edge(3, 1, "read").unwrap();
        for (index, node) in store.nodes_mut().iter_mut().enumerate() {
            node.body.pos = vec2(index as f32 * 10.0, -(index as f32) * 5.0);
        }
        store
    }

    fn focused(store: &GraphStore, node: NodeId) -> Visibility {
        let filter = FilterState {
            focus: Focus {
                node: Some(node),
                depth: 2,
            },
            ..FilterState::default()
        };
        compute_visibility(store, &filter)
    }

    fn pinned(store: &GraphStore) -> Vec<NodeId> {
        store
            .nodes()
            .iter()
            .filter(|node| node.body.is_pinned())
            .map(|node| node.id)
            .collect()
    }

    #[test]
    fn force_pins_only_the_focus_node() {
        let mut store = store();
        let mut layout = LayoutState::new(LayoutMode::Force, LayoutConfig::default());
        store.node_mut(4).unwrap().body.pin_here();

        let visibility = focused(&store, 2);
        let request = layout.refresh(&mut store, &visibility, true);

        assert_eq!(request, SimulationRequest::Reheat(1.0));
        assert_eq!(pinned(&store), vec![2]);
        let body = store.node(2).unwrap().body;
        assert_eq!((body.fx, body.fy), (Some(10.0), Some(-5.0)));
    }

    #[test]
    fn force_without_focus_releases_everything() {
        let mut store = store();
        let mut layout = LayoutState::new(LayoutMode::Force, LayoutConfig::default());
        let visibility = focused(&store, 2);
        layout.refresh(&mut store, &visibility, true);

        let cleared = compute_visibility(&store, &FilterState::default());
        assert_eq!(
            layout.refresh(&mut store, &cleared, false),
            SimulationRequest::Nudge(0.1)
        );
        assert!(pinned(&store).is_empty());
    }

    #[test]
    fn entering_tiers_pins_rows_and_leaves_x_free() {
        let mut store = store();
        let mut layout = LayoutState::new(LayoutMode::Force, LayoutConfig::default());
        store.node_mut(3).unwrap().body.pin_here();
        let visibility = compute_visibility(&store, &FilterState::default());

        let request = layout.switch_mode(LayoutMode::Tiers, &mut store, &visibility);

        assert_eq!(request, SimulationRequest::Reheat(0.3));
        let keys = layout.rows().iter().map(|row| row.key).collect::<Vec<_>>();
        assert_eq!(
            keys,
            vec![TierKey::Year(1809), TierKey::Year(1850), TierKey::Unknown]
        );
        for node in store.nodes() {
            assert_eq!(node.body.fx, None, "node {}", node.id);
        }
        let config = LayoutConfig::default();
        assert_eq!(store.node(3).unwrap().body.fy, Some(2.0 * config.row_height + config.row_offset));
        assert_eq!(store.node(1).unwrap().body.fy, Some(config.row_offset));
    }

    #[test]
    fn back_to_force_keeps_only_the_focus_anchor() {
        let mut store = store();
        let mut layout = LayoutState::new(LayoutMode::Tiers, LayoutConfig::default());
        let visibility = focused(&store, 4);
        layout.refresh(&mut store, &visibility, true);
        assert!(store.node(4).unwrap().body.fx.is_some());

        layout.switch_mode(LayoutMode::Force, &mut store, &visibility);

        assert_eq!(pinned(&store), vec![4]);
        assert!(layout.rows().is_empty());
    }

    #[test]
    fn tier_rows_follow_focus_changes() {
        let mut store = store();
        let mut layout = LayoutState::new(LayoutMode::Tiers, LayoutConfig::default());
        let everything = compute_visibility(&store, &FilterState::default());
        layout.refresh(&mut store, &everything, true);
        assert_eq!(layout.rows().len(), 3);

        let filter = FilterState {
            focus: Focus {
                node: Some(4),
                depth: 1,
            },
            ..FilterState::default()
        };
        let neighborhood = compute_visibility(&store, &filter);
        let request = layout.refresh(&mut store, &neighborhood, false);
        assert_eq!(request, SimulationRequest::Reheat(0.3));
        let members = layout
            .rows()
            .iter()
            .flat_map(|row| row.members.iter().copied())
            .collect::<HashSet<_>>();
        assert_eq!(members, HashSet::from([2, 4]));
    }

    #[test]
    fn unchanged_rows_do_not_respread() {
        let mut store = store();
        let mut layout = LayoutState::new(LayoutMode::Tiers, LayoutConfig::default());
        let visibility = compute_visibility(&store, &FilterState::default());
        layout.refresh(&mut store, &visibility, true);
        store.node_mut(1).unwrap().body.pos.x = 777.0;

        assert_eq!(
            layout.refresh(&mut store, &visibility, false),
            SimulationRequest::Keep
        );
        assert_eq!(store.node(1).unwrap().body.pos.x, 777.0);
    }

    #[test]
    fn force_drag_pins_then_releases() {
        let mut store = store();
        let mut layout = LayoutState::new(LayoutMode::Force, LayoutConfig::default());
        let visibility = compute_visibility(&store, &FilterState::default());

        assert_eq!(
            layout.drag_start(&mut store, 3),
            SimulationRequest::Target(0.3)
        );
        layout.drag_to(&mut store, 3, pos2(50.0, 60.0));
        let body = store.node(3).unwrap().body;
        assert_eq!((body.fx, body.fy), (Some(50.0), Some(60.0)));

        assert_eq!(
            layout.drag_end(&mut store, &visibility, 3),
            SimulationRequest::Target(0.0)
        );
        assert!(!store.node(3).unwrap().body.is_pinned());
        assert_eq!(layout.dragging(), None);
    }

    #[test]
    fn force_drag_of_focus_stays_pinned_at_drop() {
        let mut store = store();
        let mut layout = LayoutState::new(LayoutMode::Force, LayoutConfig::default());
        let visibility = focused(&store, 2);
        layout.refresh(&mut store, &visibility, true);

        layout.drag_start(&mut store, 2);
        layout.drag_to(&mut store, 2, pos2(-30.0, 12.0));
        layout.drag_end(&mut store, &visibility, 2);

        let body = store.node(2).unwrap().body;
        assert_eq!((body.fx, body.fy), (Some(-30.0), Some(12.0)));
    }

    #[test]
    fn pins_survive_refresh_while_dragging() {
        let mut store = store();
        let mut layout = LayoutState::new(LayoutMode::Force, LayoutConfig::default());
        let visibility = compute_visibility(&store, &FilterState::default());
        layout.drag_start(&mut store, 1);
        layout.drag_to(&mut store, 1, pos2(5.0, 5.0));

        layout.refresh(&mut store, &visibility, false);
        assert_eq!(pinned(&store), vec![1]);
    }

    #[test]
    fn tier_drag_moves_x_only_and_focus_snaps_back() {
        let mut store = store();
        let mut layout = LayoutState::new(LayoutMode::Tiers, LayoutConfig::default());
        let visibility = focused(&store, 1);
        layout.refresh(&mut store, &visibility, true);
        let home = layout.rows()[0].home_of(1).unwrap();
        let row_y = layout.rows()[0].y;

        assert_eq!(layout.drag_start(&mut store, 1), SimulationRequest::Keep);
        layout.drag_to(&mut store, 1, pos2(home + 300.0, 999.0));
        let body = store.node(1).unwrap().body;
        assert_eq!(body.pos, vec2(home + 300.0, row_y));

        layout.drag_end(&mut store, &visibility, 1);
        let body = store.node(1).unwrap().body;
        assert_eq!((body.pos.x, body.fx), (home, Some(home)));

        layout.drag_start(&mut store, 2);
        layout.drag_to(&mut store, 2, pos2(321.0, 0.0));
        layout.drag_end(&mut store, &visibility, 2);
        assert_eq!(store.node(2).unwrap().body.pos.x, 321.0);
    }

    #[test]
    fn layout_mode_parses_loosely() {
        assert_eq!(LayoutMode::parse(" Tiers "), Some(LayoutMode::Tiers));
        assert_eq!(LayoutMode::parse("force"), Some(LayoutMode::Force));
        assert_eq!(LayoutMode::parse("radial"), None);
    }
}
