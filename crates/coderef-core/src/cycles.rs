//! Circular dependency detection via Tarjan's strongly connected components.
//!
//! A group is reported for every SCC with two or more members, and for every
//! node that references itself. Output is deterministic: members are sorted by
//! id and groups by their first member.

use crate::graph::DependencyGraph;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// A set of nodes that are mutually reachable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleGroup {
    /// Member ids, sorted.
    pub nodes: Vec<String>,
    /// Distinct files the members live in.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

impl CycleGroup {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Human-readable form: `a → b → c → a`.
    pub fn representation(&self) -> String {
        let mut parts: Vec<&str> = self.nodes.iter().map(String::as_str).collect();
        if let Some(first) = self.nodes.first() {
            parts.push(first);
        }
        parts.join(" → ")
    }
}

const UNVISITED: usize = usize::MAX;

/// All strongly connected components, each as a list of node ids.
///
/// Iterative Tarjan: the explicit call stack holds `(node, next neighbor)`
/// frames so recursion depth never depends on graph depth.
pub fn strongly_connected_components(graph: &DependencyGraph) -> Vec<Vec<String>> {
    let ids: Vec<&str> = graph.node_ids().collect();
    let adj = adjacency(graph, &ids);
    let n = ids.len();

    let mut index = vec![UNVISITED; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut next_index = 0usize;
    let mut components: Vec<Vec<String>> = Vec::new();

    for root in 0..n {
        if index[root] != UNVISITED {
            continue;
        }
        index[root] = next_index;
        lowlink[root] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack[root] = true;

        let mut call_stack: Vec<(usize, usize)> = vec![(root, 0)];
        while let Some(frame) = call_stack.last_mut() {
            let v = frame.0;
            if let Some(&w) = adj[v].get(frame.1) {
                frame.1 += 1;
                if index[w] == UNVISITED {
                    index[w] = next_index;
                    lowlink[w] = next_index;
                    next_index += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    call_stack.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(index[w]);
                }
                continue;
            }

            call_stack.pop();
            if let Some(&(parent, _)) = call_stack.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[v]);
            }
            if lowlink[v] == index[v] {
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component.push(ids[w].to_string());
                    if w == v {
                        break;
                    }
                }
                components.push(component);
            }
        }
    }

    components
}

/// Circular-dependency groups: SCCs of size ≥ 2 plus self-referencing nodes.
pub fn find_circular_dependencies(graph: &DependencyGraph) -> Vec<CycleGroup> {
    let self_loops: BTreeSet<&str> = graph
        .edges()
        .iter()
        .filter(|e| e.source == e.target)
        .map(|e| e.source.as_str())
        .collect();

    let mut groups: Vec<CycleGroup> = strongly_connected_components(graph)
        .into_iter()
        .filter(|c| c.len() >= 2 || c.first().is_some_and(|id| self_loops.contains(id.as_str())))
        .map(|mut nodes| {
            nodes.sort();
            let files: BTreeSet<String> = nodes
                .iter()
                .filter_map(|id| graph.node(id).and_then(|n| n.file.clone()))
                .collect();
            CycleGroup {
                nodes,
                files: files.into_iter().collect(),
            }
        })
        .collect();

    groups.sort_by(|a, b| a.nodes.first().cmp(&b.nodes.first()));
    groups
}

fn adjacency(graph: &DependencyGraph, ids: &[&str]) -> Vec<Vec<usize>> {
    let position: HashMap<&str, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let mut adj = vec![Vec::new(); ids.len()];
    for edge in graph.edges() {
        if let (Some(&s), Some(&t)) = (
            position.get(edge.source.as_str()),
            position.get(edge.target.as_str()),
        ) && !adj[s].contains(&t)
        {
            adj[s].push(t);
        }
    }
    adj
}
