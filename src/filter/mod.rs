//! Visibility pipeline: year range, flagged-only and focus neighborhood, combined by
//! intersection. Search is a highlight layered on top and never hides nodes.

mod params;
mod search;

use std::collections::HashSet;

use crate::graph::{EdgeId, GraphStore, NodeId, expand};

pub use params::ViewState;
pub use search::{rank_nodes, search_matches};

/// Inclusive birth-year bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct YearRange {
    pub min: i32,
    pub max: i32,
}

impl YearRange {
    pub fn new(a: i32, b: i32) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn contains(self, year: i32) -> bool {
        self.min <= year && year <= self.max
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Focus {
    pub node: Option<NodeId>,
    pub depth: usize,
}

impl Focus {
    pub const DEFAULT_DEPTH: usize = 1;
}

impl Default for Focus {
    fn default() -> Self {
        Self {
            node: None,
            depth: Self::DEFAULT_DEPTH,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterState {
    pub year_range: Option<YearRange>,
    pub focus: Focus,
    /// Raw search text; matching uses its trimmed, lowercased form.
    pub search: String,
    pub only_flagged: bool,
    pub show_flagged_highlight: bool,
}

impl FilterState {
    /// Initial state for a freshly loaded graph: the year range spans the data.
    pub fn for_store(store: &GraphStore) -> Self {
        Self {
            year_range: store
                .year_extent()
                .map(|(min, max)| YearRange::new(min, max)),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Visibility {
    pub nodes: HashSet<NodeId>,
    pub edges: HashSet<EdgeId>,
    /// Set only when focus narrowing actually applied.
    pub focus: Option<NodeId>,
}

impl Visibility {
    pub fn is_focus_active(&self) -> bool {
        self.focus.is_some()
    }

    pub fn shows_node(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    pub fn shows_edge(&self, id: EdgeId) -> bool {
        self.edges.contains(&id)
    }
}

/// Recomputes the visible node and edge sets from scratch.
///
/// Stages narrow by intersection in order: year range (unknown years always pass),
/// flagged-only, then the focus neighborhood. Focus narrowing applies only when the focus
/// node exists and survived the earlier stages.
pub fn compute_visibility(store: &GraphStore, filter: &FilterState) -> Visibility {
    let mut visible = store
        .nodes()
        .iter()
        .filter(|node| {
            let Some(range) = filter.year_range else {
                return true;
            };
            node.year().is_none_or(|year| range.contains(year))
        })
        .filter(|node| !filter.only_flagged || node.is_flagged())
        .map(|node| node.id)
        .collect::<HashSet<_>>();

    let focus = filter
        .focus
        .node
        .filter(|id| store.contains(*id) && visible.contains(id));

    if let Some(focus_id) = focus {
        let neighborhood = expand(store, focus_id, filter.focus.depth);
        visible.retain(|id| neighborhood.contains(id));
    }

    let edges = store
        .edges()
        .iter()
        .filter(|edge| visible.contains(&edge.id1) && visible.contains(&edge.id2))
        .map(|edge| edge.id)
        .collect();

    Visibility {
        nodes: visible,
        edges,
        focus,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::graph::Node;

    fn library() -> GraphStore {
        let mut store = GraphStore::new();
        store.insert_node(Node::new(1, "Poe").with_year("1809"));
        store.insert_node(Node::new(2, "Baudelaire").with_year("1821"));
        store.insert_node(Node::new(3, "Mallarmé").with_year("1842"));
        store.insert_node(Node::new(4, "Valéry").with_year("1871"));
        store.insert_node(Node::new(5, "Anonymous"));
        store.insert_node(Node::new(6, "Verne").with_year("1828"));
        store.add_edge(1, 2, "translated by").unwrap();
        store.add_edge(2, 3, "influenced").unwrap();
        store.add_edge(3, 4, "mentored").unwrap();
        store.add_edge(5, 1, "imitated").unwrap();
        store.set_flagged(1, true).unwrap();
        store.set_flagged(2, true).unwrap();
        store.set_flagged(5, true).unwrap();
        store
    }

    fn ids(visibility: &Visibility) -> Vec<NodeId> {
        let mut ids = visibility.nodes.iter().copied().collect::<Vec<_>>();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn no_filters_show_everything() {
        let store = library();
        let visibility = compute_visibility(&store, &FilterState::default());
        assert_eq!(ids(&visibility), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(visibility.edges.len(), 4);
        assert!(!visibility.is_focus_active());
    }

    #[test]
    fn year_range_keeps_unknown_years() {
        let store = library();
        let filter = FilterState {
            year_range: Some(YearRange::new(1800, 1830)),
            ..FilterState::default()
        };
        let visibility = compute_visibility(&store, &filter);
        assert_eq!(ids(&visibility), vec![1, 2, 5, 6]);
        let visible_pairs = store
            .edges()
            .iter()
            .filter(|edge| visibility.shows_edge(edge.id))
            .map(|edge| (edge.id1, edge.id2))
            .collect::<Vec<_>>();
        assert_eq!(visible_pairs, vec![(1, 2), (5, 1)]);
    }

    #[test]
    fn only_flagged_intersects() {
        let store = library();
        let filter = FilterState {
            only_flagged: true,
            ..FilterState::default()
        };
        assert_eq!(ids(&compute_visibility(&store, &filter)), vec![1, 2, 5]);
    }

    #[test]
    fn focus_narrows_to_the_filtered_neighborhood() {
        let store = library();
        let filter = FilterState {
            year_range: Some(YearRange::new(1800, 1850)),
            focus: Focus {
                node: Some(2),
                depth: 2,
            },
            ..FilterState::default()
        };
        let visibility = compute_visibility(&store, &filter);
        assert_eq!(visibility.focus, Some(2));
        // 4 is two hops away but outside the year range.
        assert_eq!(ids(&visibility), vec![1, 2, 3, 5]);
    }

    #[test]
    fn focus_reaches_through_hidden_nodes() {
        let store = library();
        let filter = FilterState {
            only_flagged: true,
            focus: Focus {
                node: Some(2),
                depth: 2,
            },
            ..FilterState::default()
        };
        // 5 is reached through 1, 4 through the unflagged 3 but is itself unflagged.
        assert_eq!(ids(&compute_visibility(&store, &filter)), vec![1, 2, 5]);
    }

    #[test]
    fn focus_on_filtered_out_node_deactivates_focus_only() {
        let store = library();
        let filter = FilterState {
            year_range: Some(YearRange::new(1800, 1830)),
            focus: Focus {
                node: Some(4),
                depth: 1,
            },
            ..FilterState::default()
        };
        let visibility = compute_visibility(&store, &filter);
        assert!(!visibility.is_focus_active());
        assert_eq!(ids(&visibility), vec![1, 2, 5, 6]);
    }

    #[test]
    fn unknown_focus_is_no_focus() {
        let store = library();
        let filter = FilterState {
            focus: Focus {
                node: Some(99),
                depth: 0,
            },
            ..FilterState::default()
        };
        let visibility = compute_visibility(&store, &filter);
        assert!(!visibility.is_focus_active());
        assert_eq!(visibility.nodes.len(), 6);
    }

    #[test]
    fn focus_depth_zero_shows_only_the_focus() {
        let store = library();
        let filter = FilterState {
            focus: Focus {
                node: Some(3),
                depth: 0,
            },
            ..FilterState::default()
        };
        let visibility = compute_visibility(&store, &filter);
        assert_eq!(ids(&visibility), vec![3]);
        assert!(visibility.edges.is_empty());
    }

    #[test]
    fn recomputation_is_idempotent() {
        let store = library();
        let filter = FilterState {
            year_range: Some(YearRange::new(1810, 1900)),
            focus: Focus {
                node: Some(3),
                depth: 1,
            },
            only_flagged: false,
            search: "poe".to_owned(),
            show_flagged_highlight: true,
        };
        assert_eq!(
            compute_visibility(&store, &filter),
            compute_visibility(&store, &filter)
        );
    }

    #[test]
    fn enabling_a_filter_never_grows_the_visible_set() {
        let store = library();
        let base = FilterState::default();
        let narrowed = [
            FilterState {
                year_range: Some(YearRange::new(1820, 1845)),
                ..base.clone()
            },
            FilterState {
                only_flagged: true,
                ..base.clone()
            },
            FilterState {
                focus: Focus {
                    node: Some(1),
                    depth: 1,
                },
                ..base.clone()
            },
        ];

        let all = compute_visibility(&store, &base).nodes;
        for filter in &narrowed {
            let subset = compute_visibility(&store, filter).nodes;
            assert!(subset.is_subset(&all), "{filter:?}");

            let stacked = FilterState {
                only_flagged: true,
                ..filter.clone()
            };
            assert!(compute_visibility(&store, &stacked).nodes.is_subset(&subset));
        }
    }

    #[test]
    fn search_does_not_hide_nodes() {
        let store = library();
        let filter = FilterState {
            search: "zzz".to_owned(),
            ..FilterState::default()
        };
        assert_eq!(compute_visibility(&store, &filter).nodes.len(), 6);
    }

    #[test]
    fn initial_year_range_spans_the_data() {
        let filter = FilterState::for_store(&library());
        assert_eq!(filter.year_range, Some(YearRange::new(1809, 1871)));
        assert_eq!(filter.focus, Focus::default());
    }
}
