//! Path finding between two nodes along outgoing edges.

use coderef_core::analyzer::GraphSnapshot;
use coderef_core::graph::GraphEdge;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// A path through the graph: `nodes[i] -[edges[i]]-> nodes[i + 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphPath {
    pub nodes: Vec<String>,
    pub edges: Vec<GraphEdge>,
}

impl GraphPath {
    fn trivial(id: &str) -> Self {
        Self {
            nodes: vec![id.to_string()],
            edges: Vec::new(),
        }
    }

    fn from_edges(source: &str, edges: Vec<GraphEdge>) -> Self {
        let mut nodes = Vec::with_capacity(edges.len() + 1);
        nodes.push(source.to_string());
        nodes.extend(edges.iter().map(|e| e.target.clone()));
        Self { nodes, edges }
    }

    /// Number of hops.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Render as `a → b → c`.
    pub fn display(&self) -> String {
        self.nodes.join(" → ")
    }
}

/// Find the shortest path from `source` to `target` using BFS.
///
/// Among equal-length paths the one discovered first in edge insertion order
/// wins. `max_depth` bounds the number of hops. Returns `None` when either
/// endpoint is missing or no path exists within the bound.
pub fn shortest_path(
    snapshot: &GraphSnapshot,
    source: &str,
    target: &str,
    max_depth: Option<usize>,
) -> Option<GraphPath> {
    if !snapshot.contains(source) || !snapshot.contains(target) {
        return None;
    }
    if source == target {
        return Some(GraphPath::trivial(source));
    }

    let edges = snapshot.graph().edges();
    // node -> (edge position that first reached it, hop count)
    let mut parent: HashMap<&str, (usize, usize)> = HashMap::new();
    let mut visited: HashSet<&str> = HashSet::from([source]);
    let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(source, 0)]);

    while let Some((current, hops)) = queue.pop_front() {
        if let Some(limit) = max_depth
            && hops >= limit
        {
            continue;
        }

        for &pos in snapshot.index().outgoing_positions(current, None) {
            let neighbor = edges[pos].target.as_str();
            if !visited.insert(neighbor) {
                continue;
            }
            parent.insert(neighbor, (pos, hops + 1));
            if neighbor == target {
                return Some(rebuild(edges, &parent, source, target));
            }
            queue.push_back((neighbor, hops + 1));
        }
    }

    None
}

fn rebuild(
    edges: &[GraphEdge],
    parent: &HashMap<&str, (usize, usize)>,
    source: &str,
    target: &str,
) -> GraphPath {
    let mut hops = Vec::new();
    let mut current = target;
    while current != source {
        let Some(&(pos, _)) = parent.get(current) else {
            break;
        };
        hops.push(edges[pos].clone());
        current = edges[pos].source.as_str();
    }
    hops.reverse();
    GraphPath::from_edges(source, hops)
}

/// Outcome of [`all_paths`].
#[derive(Debug, Clone, PartialEq)]
pub struct PathSearch {
    pub paths: Vec<GraphPath>,
    /// More paths exist within the depth bound than were returned.
    pub truncated: bool,
}

/// Enumerate simple paths from `source` to `target`, shortest first.
///
/// Paths are node sequences: when several edges join the same pair of nodes,
/// the first in insertion order represents the hop. The search deepens one
/// hop at a time up to `max_depth`, so the `max_paths` kept are always the
/// shortest ones. Ties in length keep discovery order.
pub fn all_paths(
    snapshot: &GraphSnapshot,
    source: &str,
    target: &str,
    max_depth: usize,
    max_paths: usize,
) -> PathSearch {
    let mut found: Vec<GraphPath> = Vec::new();
    if !snapshot.contains(source) || !snapshot.contains(target) {
        return PathSearch {
            paths: found,
            truncated: false,
        };
    }
    if source == target {
        found.push(GraphPath::trivial(source));
    } else {
        // One past the cap tells a full result from a cut one.
        let limit = max_paths.saturating_add(1);
        for hops in 1..=max_depth {
            paths_of_length(snapshot, source, target, hops, limit, &mut found);
            if found.len() >= limit {
                break;
            }
        }
    }

    let truncated = found.len() > max_paths;
    found.truncate(max_paths);
    PathSearch {
        paths: found,
        truncated,
    }
}

/// Append simple paths of exactly `hops` edges until `found` holds `limit`.
fn paths_of_length(
    snapshot: &GraphSnapshot,
    source: &str,
    target: &str,
    hops: usize,
    limit: usize,
    found: &mut Vec<GraphPath>,
) {
    let edges = snapshot.graph().edges();
    let index = snapshot.index();

    let mut stack: Vec<(&str, usize)> = vec![(source, 0)];
    let mut on_path: HashSet<&str> = HashSet::from([source]);
    let mut path_edges: Vec<&GraphEdge> = Vec::new();

    while let Some(frame) = stack.last_mut() {
        let node = frame.0;
        let cursor = frame.1;
        let out = index.outgoing_positions(node, None);

        if cursor >= out.len() {
            stack.pop();
            if let Some(edge) = path_edges.pop() {
                on_path.remove(edge.target.as_str());
            }
            continue;
        }
        frame.1 += 1;

        let edge = &edges[out[cursor]];
        let next = edge.target.as_str();
        if out[..cursor].iter().any(|&p| edges[p].target == next) {
            continue;
        }

        let depth = path_edges.len() + 1;
        if next == target {
            if depth == hops {
                let mut path: Vec<GraphEdge> = path_edges.iter().map(|e| (*e).clone()).collect();
                path.push(edge.clone());
                found.push(GraphPath::from_edges(source, path));
                if found.len() >= limit {
                    return;
                }
            }
            continue;
        }
        if depth >= hops || on_path.contains(next) {
            continue;
        }
        on_path.insert(next);
        path_edges.push(edge);
        stack.push((next, 0));
    }
}
