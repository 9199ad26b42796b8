//! "Did you mean" suggestions for unknown node ids.

use coderef_core::graph::{DependencyGraph, short_name_of};

/// Minimum similarity for an id to be offered as a suggestion.
const MIN_SIMILARITY: f64 = 0.6;

/// Node ids that look like `wanted`, best match first.
///
/// Both the full id and its short name are compared, so `parse` can suggest
/// `src/parser.ts:parse`.
pub fn similar_ids(graph: &DependencyGraph, wanted: &str, limit: usize) -> Vec<String> {
    let wanted_short = short_name_of(wanted);
    let mut scored: Vec<(f64, &str)> = graph
        .node_ids()
        .filter_map(|id| {
            let full = strsim::normalized_levenshtein(wanted, id);
            let short = strsim::normalized_levenshtein(wanted_short, short_name_of(id));
            let score = full.max(short);
            (score >= MIN_SIMILARITY).then_some((score, id))
        })
        .collect();

    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    scored
        .into_iter()
        .take(limit)
        .map(|(_, id)| id.to_string())
        .collect()
}
