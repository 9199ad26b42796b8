//! Bounded multi-hop traversal with result classification.
//!
//! The walk is level-synchronous: every node at depth `d` is expanded before
//! any node at depth `d + 1`, so each reachable node is reported at its
//! shortest depth. A node first reached through one predecessor and later
//! through a different one at the same or a deeper level is upgraded from
//! `transitive` to `secondary`; depth-1 results always stay `direct`.
//! A predecessor whose own path runs through the node does not count.

use coderef_core::analyzer::{GraphSnapshot, SharedAnalyzer, current_snapshot};
use coderef_core::graph::{EdgeKind, GraphEdge, GraphNode};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::num::NonZeroUsize;
use std::time::Instant;

/// Relationship followed by a traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TraversalQuery {
    /// Everything that references the node, over any edge kind.
    UsedBy,
    Calls,
    /// Outgoing edges of every kind except `contains`.
    DependsOn,
    CalledBy,
    Imports,
    ImportedBy,
    /// Incoming edges of every kind except `contains`.
    Dependents,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Reverse,
}

impl TraversalQuery {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UsedBy => "used-by",
            Self::Calls => "calls",
            Self::DependsOn => "depends-on",
            Self::CalledBy => "called-by",
            Self::Imports => "imports",
            Self::ImportedBy => "imported-by",
            Self::Dependents => "dependents",
        }
    }

    fn direction(self) -> Direction {
        match self {
            Self::Calls | Self::Imports | Self::DependsOn => Direction::Forward,
            Self::UsedBy | Self::CalledBy | Self::ImportedBy | Self::Dependents => {
                Direction::Reverse
            }
        }
    }

    /// Edge kind the index can pre-filter on, if the query follows exactly one.
    fn kind_filter(self) -> Option<EdgeKind> {
        match self {
            Self::Calls | Self::CalledBy => Some(EdgeKind::Calls),
            Self::Imports | Self::ImportedBy => Some(EdgeKind::Imports),
            _ => None,
        }
    }

    fn accepts(self, kind: &EdgeKind) -> bool {
        match self {
            Self::UsedBy => true,
            Self::DependsOn | Self::Dependents => kind.is_dependency(),
            _ => self.kind_filter().as_ref() == Some(kind),
        }
    }

    /// Edges leaving `id` in this query's direction, paired with the node on
    /// the other end.
    pub(crate) fn neighbors<'s>(
        self,
        snapshot: &'s GraphSnapshot,
        id: &str,
    ) -> Vec<(&'s str, &'s GraphEdge)> {
        let filter = self.kind_filter();
        let edges = match self.direction() {
            Direction::Forward => snapshot.outgoing(id, filter.as_ref()),
            Direction::Reverse => snapshot.incoming(id, filter.as_ref()),
        };
        edges
            .into_iter()
            .filter(|edge| self.accepts(&edge.kind))
            .map(|edge| {
                let other = match self.direction() {
                    Direction::Forward => edge.target.as_str(),
                    Direction::Reverse => edge.source.as_str(),
                };
                (other, edge)
            })
            .collect()
    }
}

impl fmt::Display for TraversalQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a traversal result was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultClass {
    /// One hop from the start node.
    Direct,
    /// Reached through a single predecessor at depth > 1.
    Transitive,
    /// Reached through two or more distinct predecessors.
    Secondary,
}

/// One node reached by a traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraversalResult {
    pub node_id: String,
    pub node: GraphNode,
    /// Shortest hop count from the start node.
    pub depth: usize,
    /// Node ids from the start node to this one, inclusive.
    pub path: Vec<String>,
    pub edges: Vec<GraphEdge>,
    #[serde(rename = "type")]
    pub classification: ResultClass,
    /// Distinct predecessors this node was reached from within the bounds.
    pub path_count: usize,
}

/// Outcome of one bounded traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiHopResult {
    pub source: String,
    pub query: TraversalQuery,
    pub max_depth: usize,
    pub results: Vec<TraversalResult>,
    pub total_results: usize,
    /// Set when `max_results` cut the walk short.
    pub truncated: bool,
    pub max_depth_reached: usize,
    /// Wall time in milliseconds.
    pub execution_time: f64,
}

impl MultiHopResult {
    pub fn direct(&self) -> impl Iterator<Item = &TraversalResult> {
        self.results
            .iter()
            .filter(|r| r.classification == ResultClass::Direct)
    }

    pub fn get(&self, id: &str) -> Option<&TraversalResult> {
        self.results.iter().find(|r| r.node_id == id)
    }
}

/// Run one traversal against a snapshot. Returns `None` when `start` is not
/// in the graph.
pub fn traverse_snapshot(
    snapshot: &GraphSnapshot,
    start: &str,
    query: TraversalQuery,
    max_depth: usize,
    max_results: usize,
) -> Option<MultiHopResult> {
    if !snapshot.contains(start) {
        return None;
    }
    let started = Instant::now();

    struct Frontier {
        id: String,
        path: Vec<String>,
        edges: Vec<GraphEdge>,
    }

    let mut results: Vec<TraversalResult> = Vec::new();
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut predecessors: Vec<HashSet<String>> = Vec::new();
    let mut truncated = false;

    let mut frontier = vec![Frontier {
        id: start.to_string(),
        path: vec![start.to_string()],
        edges: Vec::new(),
    }];
    let mut depth = 0;

    while !frontier.is_empty() && depth < max_depth {
        let mut next = Vec::new();
        for current in &frontier {
            for (neighbor, edge) in query.neighbors(snapshot, &current.id) {
                if neighbor == start {
                    continue;
                }
                if let Some(&idx) = position.get(neighbor) {
                    let via_itself = current.path.iter().any(|p| p == neighbor);
                    if !via_itself && predecessors[idx].insert(current.id.clone()) {
                        let seen = &mut results[idx];
                        seen.path_count += 1;
                        if seen.classification == ResultClass::Transitive {
                            seen.classification = ResultClass::Secondary;
                        }
                    }
                    continue;
                }
                if results.len() >= max_results {
                    truncated = true;
                    continue;
                }
                let Some(node) = snapshot.node(neighbor) else {
                    continue;
                };

                let mut path = current.path.clone();
                path.push(neighbor.to_string());
                let mut edges = current.edges.clone();
                edges.push(edge.clone());

                position.insert(neighbor.to_string(), results.len());
                predecessors.push(HashSet::from([current.id.clone()]));
                results.push(TraversalResult {
                    node_id: neighbor.to_string(),
                    node: node.clone(),
                    depth: depth + 1,
                    path: path.clone(),
                    edges: edges.clone(),
                    classification: if depth == 0 {
                        ResultClass::Direct
                    } else {
                        ResultClass::Transitive
                    },
                    path_count: 1,
                });
                next.push(Frontier {
                    id: neighbor.to_string(),
                    path,
                    edges,
                });
            }
        }
        depth += 1;
        if truncated {
            break;
        }
        frontier = next;
    }

    let max_depth_reached = results.iter().map(|r| r.depth).max().unwrap_or(0);
    Some(MultiHopResult {
        source: start.to_string(),
        query,
        max_depth,
        total_results: results.len(),
        results,
        truncated,
        max_depth_reached,
        execution_time: started.elapsed().as_secs_f64() * 1000.0,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TraversalKey {
    node: String,
    query: TraversalQuery,
    depth: usize,
}

/// Traversal engine bound to a shared analyzer.
///
/// Results are memoized per `(node, query, depth)` in an LRU of
/// `traversal.max_cache_entries` and dropped whenever the analyzer installs a
/// new graph or the bounds change.
#[derive(Debug)]
pub struct MultiHopTraversal {
    analyzer: SharedAnalyzer,
    max_depth: usize,
    max_results: usize,
    /// `None` when memoization is disabled.
    cache: Option<LruCache<TraversalKey, MultiHopResult>>,
    cache_generation: u64,
    cache_hits: u64,
}

impl MultiHopTraversal {
    /// Create an engine with bounds taken from the analyzer's configuration.
    pub fn new(analyzer: SharedAnalyzer) -> Self {
        let limits = {
            let guard = analyzer
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            guard.config().traversal.clone()
        };
        Self {
            analyzer,
            max_depth: limits.max_depth.max(1),
            max_results: limits.max_results.max(1),
            cache: NonZeroUsize::new(limits.max_cache_entries).map(LruCache::new),
            cache_generation: 0,
            cache_hits: 0,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// Change the default depth bound. Clears memoized results.
    pub fn set_max_depth(&mut self, depth: usize) {
        self.max_depth = depth.max(1);
        self.clear_cache();
    }

    /// Change the result cap. Clears memoized results.
    pub fn set_max_results(&mut self, limit: usize) {
        self.max_results = limit.max(1);
        self.clear_cache();
    }

    pub fn clear_cache(&mut self) {
        if let Some(cache) = &mut self.cache {
            cache.clear();
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.as_ref().map_or(0, LruCache::len)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits
    }

    /// Everything that references `id`, transitively.
    pub fn used_by(&mut self, id: &str) -> Option<MultiHopResult> {
        self.traverse(id, TraversalQuery::UsedBy, None)
    }

    /// Everything `id` calls, transitively.
    pub fn calls(&mut self, id: &str) -> Option<MultiHopResult> {
        self.traverse(id, TraversalQuery::Calls, None)
    }

    /// Everything `id` depends on through non-containment edges.
    pub fn depends_on(&mut self, id: &str) -> Option<MultiHopResult> {
        self.traverse(id, TraversalQuery::DependsOn, None)
    }

    /// Traverse from `id` against the analyzer's current graph. `depth`
    /// overrides the configured bound for this call only.
    pub fn traverse(
        &mut self,
        id: &str,
        query: TraversalQuery,
        depth: Option<usize>,
    ) -> Option<MultiHopResult> {
        let snapshot = current_snapshot(&self.analyzer)?;
        self.traverse_in(&snapshot, id, query, depth)
    }

    /// Traverse against a specific snapshot. Used by callers that already
    /// hold one so a single request never mixes two graph generations.
    pub fn traverse_in(
        &mut self,
        snapshot: &GraphSnapshot,
        id: &str,
        query: TraversalQuery,
        depth: Option<usize>,
    ) -> Option<MultiHopResult> {
        self.sync_generation(snapshot.generation());

        let depth = depth.unwrap_or(self.max_depth).max(1);
        let key = TraversalKey {
            node: id.to_string(),
            query,
            depth,
        };
        if let Some(hit) = self.cache.as_mut().and_then(|cache| cache.get(&key)) {
            let hit = hit.clone();
            self.cache_hits += 1;
            return Some(hit);
        }

        let result = traverse_snapshot(snapshot, id, query, depth, self.max_results)?;
        tracing::debug!(
            node = id,
            query = %query,
            depth,
            results = result.total_results,
            truncated = result.truncated,
            "traversal complete"
        );
        if let Some(cache) = &mut self.cache {
            cache.put(key, result.clone());
        }
        Some(result)
    }

    fn sync_generation(&mut self, generation: u64) {
        if generation != self.cache_generation {
            if self.cache_len() > 0 {
                tracing::debug!(
                    from = self.cache_generation,
                    to = generation,
                    "graph replaced, dropping traversal cache"
                );
            }
            self.clear_cache();
            self.cache_generation = generation;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coderef_core::analyzer::Analyzer;
    use coderef_core::element::CodeElement;

    fn shared(elements: &[CodeElement]) -> SharedAnalyzer {
        let mut analyzer = Analyzer::default();
        analyzer.analyze(elements).unwrap();
        analyzer.into_shared()
    }

    // a → b → d, a → c → d, d → e
    fn diamond() -> SharedAnalyzer {
        shared(&[
            CodeElement::new("a", "function").calling(["b", "c"]),
            CodeElement::new("b", "function").calling(["d"]),
            CodeElement::new("c", "function").calling(["d"]),
            CodeElement::new("d", "function").calling(["e"]),
            CodeElement::new("e", "function"),
        ])
    }

    #[test]
    fn test_classification_in_diamond() {
        let mut engine = MultiHopTraversal::new(diamond());
        let result = engine.calls("a").unwrap();
        assert_eq!(result.total_results, 4);

        assert_eq!(result.get("b").unwrap().classification, ResultClass::Direct);
        assert_eq!(result.get("c").unwrap().classification, ResultClass::Direct);
        let d = result.get("d").unwrap();
        assert_eq!(d.depth, 2);
        assert_eq!(d.classification, ResultClass::Secondary);
        assert_eq!(d.path_count, 2);
        assert_eq!(d.path, vec!["a", "b", "d"]);
        let e = result.get("e").unwrap();
        assert_eq!(e.depth, 3);
        assert_eq!(e.classification, ResultClass::Transitive);
        assert_eq!(e.edges.len(), 3);
    }

    #[test]
    fn test_depth_bound() {
        let mut engine = MultiHopTraversal::new(diamond());
        let result = engine.traverse("a", TraversalQuery::Calls, Some(1)).unwrap();
        assert_eq!(result.total_results, 2);
        assert!(result.results.iter().all(|r| r.depth == 1));
        assert_eq!(result.max_depth_reached, 1);
        assert!(!result.truncated);
    }

    #[test]
    fn test_reverse_traversal() {
        let mut engine = MultiHopTraversal::new(diamond());
        let result = engine.used_by("e").unwrap();
        let ids: Vec<_> = result.results.iter().map(|r| r.node_id.as_str()).collect();
        assert_eq!(ids[0], "d");
        assert!(ids.contains(&"a"));
        assert_eq!(result.get("d").unwrap().classification, ResultClass::Direct);
    }

    #[test]
    fn test_unknown_start_is_none() {
        let mut engine = MultiHopTraversal::new(diamond());
        assert!(engine.calls("missing").is_none());
        assert_eq!(engine.cache_len(), 0);
    }

    #[test]
    fn test_cycle_never_revisits_start() {
        let mut engine = MultiHopTraversal::new(shared(&[
            CodeElement::new("a", "function").calling(["b"]),
            CodeElement::new("b", "function").calling(["a"]),
        ]));
        let result = engine.traverse("a", TraversalQuery::Calls, Some(10)).unwrap();
        assert_eq!(result.total_results, 1);
        assert_eq!(result.results[0].node_id, "b");
    }

    #[test]
    fn test_cycle_back_edge_is_not_a_second_path() {
        // a → b → c → d → c: only one simple path reaches c
        let mut engine = MultiHopTraversal::new(shared(&[
            CodeElement::new("a", "function").calling(["b"]),
            CodeElement::new("b", "function").calling(["c"]),
            CodeElement::new("c", "function").calling(["d"]),
            CodeElement::new("d", "function").calling(["c"]),
        ]));
        let result = engine.traverse("a", TraversalQuery::Calls, Some(4)).unwrap();
        let c = result.get("c").unwrap();
        assert_eq!(c.depth, 2);
        assert_eq!(c.classification, ResultClass::Transitive);
        assert_eq!(c.path_count, 1);
        assert_eq!(result.get("d").unwrap().classification, ResultClass::Transitive);
    }

    #[test]
    fn test_memo_keeps_most_recent_entries() {
        let mut config = coderef_core::config::CoderefConfig::default();
        config.traversal.max_cache_entries = 2;
        let mut analyzer = Analyzer::new(config);
        analyzer
            .analyze(&[
                CodeElement::new("a", "function").calling(["b"]),
                CodeElement::new("b", "function").calling(["c"]),
                CodeElement::new("c", "function"),
            ])
            .unwrap();
        let mut engine = MultiHopTraversal::new(analyzer.into_shared());
        engine.calls("a").unwrap();
        engine.calls("b").unwrap();
        engine.calls("a").unwrap();
        engine.calls("c").unwrap();
        assert_eq!(engine.cache_len(), 2);
        assert_eq!(engine.cache_hits(), 1);

        // "b" was least recently used and is gone, "a" survives
        engine.calls("a").unwrap();
        assert_eq!(engine.cache_hits(), 2);
        engine.calls("b").unwrap();
        assert_eq!(engine.cache_hits(), 2);
    }

    #[test]
    fn test_memo_disabled_with_zero_entries() {
        let mut config = coderef_core::config::CoderefConfig::default();
        config.traversal.max_cache_entries = 0;
        let mut analyzer = Analyzer::new(config);
        analyzer
            .analyze(&[CodeElement::new("a", "function").calling(["b"])])
            .unwrap();
        let mut engine = MultiHopTraversal::new(analyzer.into_shared());
        engine.calls("a").unwrap();
        engine.calls("a").unwrap();
        assert_eq!(engine.cache_len(), 0);
        assert_eq!(engine.cache_hits(), 0);
    }

    #[test]
    fn test_truncation_sets_flag() {
        let mut engine = MultiHopTraversal::new(diamond());
        engine.set_max_results(1);
        let result = engine.calls("a").unwrap();
        assert_eq!(result.total_results, 1);
        assert!(result.truncated);
    }

    #[test]
    fn test_depends_on_skips_containment() {
        let mut analyzer = Analyzer::default();
        let mut graph = coderef_core::graph::DependencyGraph::new();
        graph.upsert_node(GraphNode::new("mod", "module"));
        graph.upsert_node(GraphNode::new("fn", "function"));
        graph.upsert_node(GraphNode::new("dep", "module"));
        graph
            .add_edge(GraphEdge::new("mod", "fn", EdgeKind::Contains))
            .unwrap();
        graph
            .add_edge(GraphEdge::new("mod", "dep", EdgeKind::Imports))
            .unwrap();
        analyzer
            .import_graph(coderef_core::schema::ExportedGraph::from_graph(&graph))
            .unwrap();

        let mut engine = MultiHopTraversal::new(analyzer.into_shared());
        let deps = engine.depends_on("mod").unwrap();
        assert_eq!(deps.total_results, 1);
        assert_eq!(deps.results[0].node_id, "dep");
        let all = engine.traverse("fn", TraversalQuery::UsedBy, None).unwrap();
        assert_eq!(all.results[0].node_id, "mod");
    }

    #[test]
    fn test_memoization_and_invalidation() {
        let analyzer = diamond();
        let mut engine = MultiHopTraversal::new(analyzer.clone());
        engine.calls("a").unwrap();
        engine.calls("a").unwrap();
        assert_eq!(engine.cache_hits(), 1);
        assert_eq!(engine.cache_len(), 1);

        analyzer
            .write()
            .unwrap()
            .analyze(&[
                CodeElement::new("a", "function").calling(["z"]),
                CodeElement::new("z", "function"),
            ])
            .unwrap();
        let fresh = engine.calls("a").unwrap();
        assert_eq!(fresh.total_results, 1);
        assert_eq!(fresh.results[0].node_id, "z");
        assert_eq!(engine.cache_hits(), 1);
    }

    #[test]
    fn test_bound_changes_clear_cache() {
        let mut engine = MultiHopTraversal::new(diamond());
        engine.calls("a").unwrap();
        engine.set_max_depth(2);
        assert_eq!(engine.cache_len(), 0);
        assert_eq!(engine.calls("a").unwrap().max_depth_reached, 2);
    }
}
