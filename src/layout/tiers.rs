use std::collections::{BTreeMap, HashSet};

use crate::graph::{GraphStore, Node, NodeId};

use super::LayoutConfig;

/// Chronological bucket of a node. Unknown years sort after every real year.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TierKey {
    Year(i32),
    Unknown,
}

impl TierKey {
    pub fn of(node: &Node) -> Self {
        node.year().map_or(Self::Unknown, Self::Year)
    }

    pub fn label(self) -> String {
        match self {
            Self::Year(year) => year.to_string(),
            Self::Unknown => "Unknown".to_owned(),
        }
    }
}

/// One row of the tier layout: members in store order with their home x coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct TierRow {
    pub key: TierKey,
    pub y: f32,
    pub members: Vec<NodeId>,
    pub home_x: Vec<f32>,
}

impl TierRow {
    pub fn home_of(&self, node: NodeId) -> Option<f32> {
        self.members
            .iter()
            .position(|&member| member == node)
            .map(|index| self.home_x[index])
    }

    pub fn left_edge(&self) -> f32 {
        self.home_x.first().copied().unwrap_or(0.0)
    }
}

/// Buckets visible nodes by year and lays each bucket out on its own row.
///
/// Rows are sorted ascending by year with the unknown bucket last. Row `i` sits at
/// `i * row_height + row_offset`; members are centered on x = 0 with a spacing that never
/// drops below `width * min_spacing_ratio`.
pub fn assign_tiers(
    store: &GraphStore,
    visible: &HashSet<NodeId>,
    config: &LayoutConfig,
    width: f32,
) -> Vec<TierRow> {
    let mut buckets: BTreeMap<TierKey, Vec<NodeId>> = BTreeMap::new();
    for node in store.nodes() {
        if visible.contains(&node.id) {
            buckets.entry(TierKey::of(node)).or_default().push(node.id);
        }
    }

    let width = width.max(1.0);
    let min_spacing = (width * config.min_spacing_ratio).max(config.min_node_spacing);

    buckets
        .into_iter()
        .enumerate()
        .map(|(row_index, (key, members))| {
            let count = members.len();
            let spacing = (width / count as f32).max(min_spacing);
            let span = spacing * (count.saturating_sub(1)) as f32;
            let home_x = (0..count)
                .map(|index| index as f32 * spacing - span * 0.5)
                .collect();

            TierRow {
                key,
                y: row_index as f32 * config.row_height + config.row_offset,
                members,
                home_x,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn unknown_years_sort_last() {
        let mut store = GraphStore::new();
        store.insert_node(Node::new(1, "a").with_year("1809"));
        store.insert_node(Node::new(2, "b").with_year("1809"));
        store.insert_node(Node::new(3, "c").with_year("unknown"));
        store.insert_node(Node::new(4, "d").with_year("1849"));
        let visible = HashSet::from([1, 2, 3, 4]);

        let rows = assign_tiers(&store, &visible, &LayoutConfig::default(), 1000.0);

        let summary = rows
            .iter()
            .map(|row| (row.key, row.members.clone()))
            .collect::<Vec<_>>();
        assert_eq!(
            summary,
            vec![
                (TierKey::Year(1809), vec![1, 2]),
                (TierKey::Year(1849), vec![4]),
                (TierKey::Unknown, vec![3]),
            ]
        );
        assert_eq!(rows[2].key.label(), "Unknown");
    }

    #[test]
    fn unknown_sorts_after_far_future_years() {
        assert!(TierKey::Year(i32::MAX) < TierKey::Unknown);
    }

    #[test]
    fn rows_are_stacked_by_index() {
        let mut store = GraphStore::new();
        store.insert_node(Node::new(1, "a").with_year("1700"));
        store.insert_node(Node::new(2, "b").with_year("1900"));
        let config = LayoutConfig::default();
        let rows = assign_tiers(&store, &HashSet::from([1, 2]), &config, 800.0);

        assert_eq!(rows[0].y, config.row_offset);
        assert_eq!(rows[1].y, config.row_height + config.row_offset);
    }

    #[test]
    fn members_respect_minimum_spacing() {
        let mut store = GraphStore::new();
        for id in 1..=40 {
            store.insert_node(Node::new(id, format!("n{id}")).with_year("1900"));
        }
        let visible = (1..=40).collect::<HashSet<_>>();
        let config = LayoutConfig::default();
        let rows = assign_tiers(&store, &visible, &config, 800.0);

        let home = &rows[0].home_x;
        let min_gap = home
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .fold(f32::INFINITY, f32::min);
        assert!(min_gap >= (800.0 * config.min_spacing_ratio) - 0.001);
        assert!((home[0] + home[home.len() - 1]).abs() < 0.01);
    }

    #[test]
    fn hidden_nodes_get_no_row() {
        let mut store = GraphStore::new();
        store.insert_node(Node::new(1, "a").with_year("1800"));
        store.insert_node(Node::new(2, "b").with_year("1850"));
        let rows = assign_tiers(&store, &HashSet::from([2]), &LayoutConfig::default(), 500.0);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, TierKey::Year(1850));
        assert_eq!(rows[0].home_of(2), Some(0.0));
    }
}
