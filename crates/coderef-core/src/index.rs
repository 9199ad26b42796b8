//! Forward and reverse adjacency over a built graph.
//!
//! The index stores positions into [`DependencyGraph::edges`], grouped per node
//! and per relationship kind. It is derived once per graph and never mutates it.

use crate::graph::{DependencyGraph, EdgeKind, GraphEdge};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default)]
struct Adjacency {
    all: Vec<usize>,
    by_kind: BTreeMap<EdgeKind, Vec<usize>>,
}

impl Adjacency {
    fn push(&mut self, kind: &EdgeKind, edge_idx: usize) {
        self.all.push(edge_idx);
        self.by_kind.entry(kind.clone()).or_default().push(edge_idx);
    }

    fn select(&self, kind: Option<&EdgeKind>) -> &[usize] {
        match kind {
            None => &self.all,
            Some(kind) => self.by_kind.get(kind).map_or(&[], Vec::as_slice),
        }
    }
}

/// Per-node outgoing and incoming edge lists, keyed by relationship kind.
#[derive(Debug, Clone, Default)]
pub struct RelationshipIndex {
    outgoing: HashMap<String, Adjacency>,
    incoming: HashMap<String, Adjacency>,
}

impl RelationshipIndex {
    /// Build the index in O(nodes + edges).
    pub fn build(graph: &DependencyGraph) -> Self {
        let mut outgoing: HashMap<String, Adjacency> = graph
            .node_ids()
            .map(|id| (id.to_string(), Adjacency::default()))
            .collect();
        let mut incoming = outgoing.clone();

        for (i, edge) in graph.edges().iter().enumerate() {
            outgoing
                .entry(edge.source.clone())
                .or_default()
                .push(&edge.kind, i);
            incoming
                .entry(edge.target.clone())
                .or_default()
                .push(&edge.kind, i);
        }

        Self { outgoing, incoming }
    }

    /// Positions of edges leaving `id`, in edge insertion order.
    pub fn outgoing_positions(&self, id: &str, kind: Option<&EdgeKind>) -> &[usize] {
        self.outgoing.get(id).map_or(&[], |adj| adj.select(kind))
    }

    /// Positions of edges arriving at `id`, in edge insertion order.
    pub fn incoming_positions(&self, id: &str, kind: Option<&EdgeKind>) -> &[usize] {
        self.incoming.get(id).map_or(&[], |adj| adj.select(kind))
    }

    pub fn outgoing<'g>(
        &self,
        graph: &'g DependencyGraph,
        id: &str,
        kind: Option<&EdgeKind>,
    ) -> Vec<&'g GraphEdge> {
        resolve(graph, self.outgoing_positions(id, kind))
    }

    pub fn incoming<'g>(
        &self,
        graph: &'g DependencyGraph,
        id: &str,
        kind: Option<&EdgeKind>,
    ) -> Vec<&'g GraphEdge> {
        resolve(graph, self.incoming_positions(id, kind))
    }

    pub fn out_degree(&self, id: &str, kind: Option<&EdgeKind>) -> usize {
        self.outgoing_positions(id, kind).len()
    }

    pub fn in_degree(&self, id: &str, kind: Option<&EdgeKind>) -> usize {
        self.incoming_positions(id, kind).len()
    }

    pub fn degree(&self, id: &str, kind: Option<&EdgeKind>) -> usize {
        self.out_degree(id, kind) + self.in_degree(id, kind)
    }

    /// Relationship kinds leaving `id`, sorted.
    pub fn outgoing_kinds(&self, id: &str) -> Vec<&EdgeKind> {
        self.outgoing
            .get(id)
            .map(|adj| adj.by_kind.keys().collect())
            .unwrap_or_default()
    }

    /// Nodes with no incoming and no outgoing edges, sorted by id.
    pub fn isolated_nodes(&self, graph: &DependencyGraph) -> Vec<String> {
        graph
            .node_ids()
            .filter(|id| self.degree(id, None) == 0)
            .map(str::to_string)
            .collect()
    }
}

fn resolve<'g>(graph: &'g DependencyGraph, positions: &[usize]) -> Vec<&'g GraphEdge> {
    positions
        .iter()
        .filter_map(|&i| graph.edges().get(i))
        .collect()
}
