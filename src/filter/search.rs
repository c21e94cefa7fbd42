use std::collections::HashSet;

use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use crate::graph::{GraphStore, NodeId};

/// Nodes whose name contains the trimmed search term, ignoring case.
/// An empty term matches nothing.
pub fn search_matches(store: &GraphStore, term: &str) -> HashSet<NodeId> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return HashSet::new();
    }

    store
        .nodes()
        .iter()
        .filter(|node| node.name.to_lowercase().contains(&term))
        .map(|node| node.id)
        .collect()
}

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_lowercase(), &query.to_lowercase()))
}

/// Candidates for a node picker, best match first. A blank query lists nodes by name.
pub fn rank_nodes(store: &GraphStore, query: &str, limit: usize) -> Vec<NodeId> {
    let query = query.trim();
    let mut ranked = if query.is_empty() {
        store
            .nodes()
            .iter()
            .map(|node| (0, node.name.to_lowercase(), node.id))
            .collect::<Vec<_>>()
    } else {
        let matcher = SkimMatcherV2::default();
        store
            .nodes()
            .iter()
            .filter_map(|node| {
                fuzzy_match_score(&matcher, &node.label(), query)
                    .map(|score| (score, node.name.to_lowercase(), node.id))
            })
            .collect::<Vec<_>>()
    };

    ranked.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    ranked.truncate(limit);
    ranked.into_iter().map(|(_, _, id)| id).collect()
}
