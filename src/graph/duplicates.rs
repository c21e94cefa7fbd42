use std::collections::{HashMap, HashSet};

use tracing::info;

use crate::util::normalize_key;

use super::{EdgeId, GraphStore, NodeId};

/// Edges sharing an unordered endpoint pair and a normalized label, in insertion order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdgeGroup {
    pub pair: (NodeId, NodeId),
    pub label_key: String,
    pub edges: Vec<EdgeId>,
}

/// Nodes sharing a normalized name, in insertion order. The first one is the keeper.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeGroup {
    pub name_key: String,
    pub nodes: Vec<NodeId>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub nodes_merged: usize,
    pub edges_removed: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelVariant {
    pub label: String,
    pub edges: Vec<EdgeId>,
}

/// Edges sharing a directed endpoint pair, split by exact label. `keep` is the single edge
/// that survives [`GraphStore::apply_edge_review`]; it defaults to the first edge of the
/// first label variant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdgeReviewGroup {
    pub source: NodeId,
    pub target: NodeId,
    pub variants: Vec<LabelVariant>,
    pub keep: EdgeId,
}

impl EdgeReviewGroup {
    pub fn edge_count(&self) -> usize {
        self.variants.iter().map(|variant| variant.edges.len()).sum()
    }
}

/// Groups items by key while keeping first-seen order of both groups and members.
fn group_in_order<K, T>(items: impl IntoIterator<Item = (K, T)>) -> Vec<(K, Vec<T>)>
where
    K: Clone + Eq + std::hash::Hash,
{
    let mut slot_by_key: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Vec<T>)> = Vec::new();

    for (key, item) in items {
        match slot_by_key.get(&key) {
            Some(&slot) => groups[slot].1.push(item),
            None => {
                slot_by_key.insert(key.clone(), groups.len());
                groups.push((key, vec![item]));
            }
        }
    }

    groups
}

impl GraphStore {
    pub fn find_duplicate_edges(&self) -> Vec<EdgeGroup> {
        group_in_order(self.edges.iter().map(|edge| {
            let (low, high) = edge.unordered_pair();
            ((low, high, normalize_key(&edge.label)), edge.id)
        }))
        .into_iter()
        .filter(|(_, edges)| edges.len() > 1)
        .map(|((low, high, label_key), edges)| EdgeGroup {
            pair: (low, high),
            label_key,
            edges,
        })
        .collect()
    }

    /// Keeps the first edge of every duplicate group and deletes the rest.
    pub fn remove_duplicate_edges(&mut self) -> usize {
        let doomed = self
            .find_duplicate_edges()
            .into_iter()
            .flat_map(|group| group.edges.into_iter().skip(1))
            .collect::<HashSet<_>>();

        if doomed.is_empty() {
            return 0;
        }

        let before = self.edges.len();
        self.edges.retain(|edge| !doomed.contains(&edge.id));
        let removed = before - self.edges.len();
        info!(removed, "removed duplicate edges");
        removed
    }

    pub fn find_duplicate_nodes(&self) -> Vec<NodeGroup> {
        group_in_order(
            self.nodes
                .iter()
                .map(|node| (normalize_key(&node.name), node.id)),
        )
        .into_iter()
        .filter(|(_, nodes)| nodes.len() > 1)
        .map(|(name_key, nodes)| NodeGroup { name_key, nodes })
        .collect()
    }

    /// Folds every duplicate node into the first node of its group, then removes the
    /// duplicate edges the re-pointing produced.
    pub fn merge_duplicate_nodes(&mut self) -> MergeReport {
        let mut nodes_merged = 0;

        for group in self.find_duplicate_nodes() {
            let Some((&keeper, others)) = group.nodes.split_first() else {
                continue;
            };

            for &removed in others {
                if self.merge_into(keeper, removed) {
                    nodes_merged += 1;
                }
            }
        }

        if nodes_merged > 0 {
            self.reindex();
        }

        let edges_removed = self.remove_duplicate_edges();
        if nodes_merged > 0 {
            info!(nodes_merged, edges_removed, "merged duplicate nodes");
        }

        MergeReport {
            nodes_merged,
            edges_removed,
        }
    }

    fn merge_into(&mut self, keeper: NodeId, removed: NodeId) -> bool {
        let Some(position) = self.nodes.iter().position(|node| node.id == removed) else {
            return false;
        };
        let absorbed = self.nodes.remove(position);

        for edge in &mut self.edges {
            if edge.id1 == removed {
                edge.id1 = keeper;
            }
            if edge.id2 == removed {
                edge.id2 = keeper;
            }
        }

        if let Some(target) = self.nodes.iter_mut().find(|node| node.id == keeper) {
            for image in absorbed.images {
                if !target.images.contains(&image) {
                    target.images.push(image);
                }
            }

            if target.birth_year.is_none() {
                target.birth_year = absorbed.birth_year;
            }
            if absorbed.flagged == Some(true) {
                target.flagged = Some(true);
            }
            if let Some(tags) = absorbed.tags {
                let merged = target.tags.get_or_insert_with(Vec::new);
                for tag in tags {
                    if !merged.contains(&tag) {
                        merged.push(tag);
                    }
                }
            }
        }

        true
    }

    pub fn review_duplicate_edges(&self) -> Vec<EdgeReviewGroup> {
        group_in_order(
            self.edges
                .iter()
                .map(|edge| ((edge.id1, edge.id2), (edge.label.clone(), edge.id))),
        )
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .filter_map(|((source, target), members)| {
            let variants = group_in_order(members)
                .into_iter()
                .map(|(label, edges)| LabelVariant { label, edges })
                .collect::<Vec<_>>();
            let keep = *variants.first()?.edges.first()?;
            Some(EdgeReviewGroup {
                source,
                target,
                variants,
                keep,
            })
        })
        .collect()
    }

    /// Deletes every reviewed edge except each group's `keep` choice.
    pub fn apply_edge_review(&mut self, groups: &[EdgeReviewGroup]) -> usize {
        let doomed = groups
            .iter()
            .flat_map(|group| {
                group
                    .variants
                    .iter()
                    .flat_map(|variant| variant.edges.iter().copied())
                    .filter(move |&edge| edge != group.keep)
            })
            .collect::<HashSet<_>>();

        let before = self.edges.len();
        self.edges.retain(|edge| !doomed.contains(&edge.id));
        let removed = before - self.edges.len();
        info!(removed, "applied duplicate edge review");
        removed
    }
}
