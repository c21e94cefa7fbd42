use std::collections::{HashMap, HashSet, VecDeque};

use super::{GraphStore, NodeId};

/// Every node within `depth` undirected hops of `focus`, the focus itself included.
///
/// Runs over the full edge list, independent of any visibility filter. Edges whose other
/// endpoint is not in the store are skipped. An unknown `focus` yields an empty set.
pub fn expand(store: &GraphStore, focus: NodeId, depth: usize) -> HashSet<NodeId> {
    if !store.contains(focus) {
        return HashSet::new();
    }

    let mut adjacency: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for edge in store.edges() {
        if edge.id1 == edge.id2 || !store.contains(edge.id1) || !store.contains(edge.id2) {
            continue;
        }
        adjacency.entry(edge.id1).or_default().push(edge.id2);
        adjacency.entry(edge.id2).or_default().push(edge.id1);
    }

    let mut visited = HashSet::from([focus]);
    let mut queue = VecDeque::from([(focus, 0usize)]);

    while let Some((node, hops)) = queue.pop_front() {
        if hops >= depth {
            continue;
        }

        let Some(neighbors) = adjacency.get(&node) else {
            continue;
        };

        for &next in neighbors {
            if visited.insert(next) {
                queue.push_back((next, hops + 1));
            }
        }
    }

    visited
}
