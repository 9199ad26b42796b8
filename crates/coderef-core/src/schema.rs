//! Exported graph format and schema version handling.

use crate::error::{GraphError, Result};
use crate::graph::{
    DependencyGraph, GraphEdge, GraphNode, GraphStatistics, MAX_METADATA_EXTRAS, NodeKind,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

pub const CURRENT_VERSION: &str = "1.0.0";

/// Durable JSON form of a dependency graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedGraph {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub statistics: GraphStatistics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visualization: Option<VisualizationHints>,
}

/// Optional rendering hints for graph viewers. Not part of the round-trip contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualizationHints {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_positions: BTreeMap<String, Position>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_colors: BTreeMap<String, String>,
    /// Keyed by `source->target:type`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub edge_weights: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_hints: Option<LayoutHints>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutHints {
    pub algorithm: String,
    pub directed: bool,
    /// Node ids grouped by file.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub clusters: BTreeMap<String, Vec<String>>,
}

impl ExportedGraph {
    /// Snapshot a graph into its exported form.
    pub fn from_graph(graph: &DependencyGraph) -> Self {
        Self {
            version: CURRENT_VERSION.to_string(),
            exported_at: Utc::now(),
            nodes: graph.nodes().cloned().collect(),
            edges: graph.edges().to_vec(),
            statistics: graph.statistics(),
            visualization: None,
        }
    }

    pub fn with_visualization(mut self) -> Self {
        self.visualization = Some(visualization_for(&self.nodes, &self.edges));
        self
    }

    /// Rebuild a graph, rejecting duplicate ids, duplicate edges, oversized
    /// metadata and edges with unknown endpoints.
    pub fn into_graph(self) -> Result<DependencyGraph> {
        validate_version(&self.version)?;

        let mut graph = DependencyGraph::new();
        for node in self.nodes {
            if let Some(meta) = &node.metadata
                && meta.extras().len() > MAX_METADATA_EXTRAS
            {
                return Err(GraphError::InvalidGraph(format!(
                    "node {} carries {} metadata extras (max {})",
                    node.id,
                    meta.extras().len(),
                    MAX_METADATA_EXTRAS
                )));
            }
            let id = node.id.clone();
            if id.is_empty() {
                return Err(GraphError::InvalidGraph("node with empty id".to_string()));
            }
            if !graph.upsert_node(node) {
                return Err(GraphError::InvalidGraph(format!("duplicate node id {id}")));
            }
        }
        for edge in self.edges {
            let label = format!("{} -[{}]-> {}", edge.source, edge.kind, edge.target);
            let inserted = graph
                .add_edge(edge)
                .map_err(|e| GraphError::InvalidGraph(e.to_string()))?;
            if !inserted {
                return Err(GraphError::InvalidGraph(format!("duplicate edge {label}")));
            }
        }
        Ok(graph)
    }
}

/// Validate a serialized graph's schema version.
pub fn validate_version(version: &str) -> Result<()> {
    if version != CURRENT_VERSION {
        return Err(GraphError::UnsupportedVersion {
            expected: CURRENT_VERSION.to_string(),
            found: version.to_string(),
        });
    }
    Ok(())
}

/// Serialize an exported graph to pretty-printed JSON.
pub fn to_json(exported: &ExportedGraph) -> Result<String> {
    Ok(serde_json::to_string_pretty(exported)?)
}

/// Deserialize an exported graph from JSON and check its version.
pub fn from_json(json: &str) -> Result<ExportedGraph> {
    let exported: ExportedGraph = serde_json::from_str(json)?;
    validate_version(&exported.version)?;
    Ok(exported)
}

/// Stable key for an edge in `edge_weights`.
pub fn edge_weight_key(edge: &GraphEdge) -> String {
    format!("{}->{}:{}", edge.source, edge.target, edge.kind)
}

fn color_for(kind: &NodeKind) -> &'static str {
    match kind {
        NodeKind::Function | NodeKind::Method => "#4e79a7",
        NodeKind::Class | NodeKind::Interface => "#f28e2b",
        NodeKind::Type => "#edc948",
        NodeKind::Constant | NodeKind::Variable => "#76b7b2",
        NodeKind::Component | NodeKind::Hook => "#e15759",
        NodeKind::Module => "#59a14f",
        NodeKind::Other(_) => "#bab0ac",
    }
}

fn visualization_for(nodes: &[GraphNode], edges: &[GraphEdge]) -> VisualizationHints {
    let n = nodes.len().max(1) as f64;
    let radius = (n * 12.0).max(100.0);

    let mut hints = VisualizationHints::default();
    let mut clusters: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (i, node) in nodes.iter().enumerate() {
        let angle = std::f64::consts::TAU * i as f64 / n;
        hints.node_positions.insert(
            node.id.clone(),
            Position {
                x: (radius * angle.cos() * 100.0).round() / 100.0,
                y: (radius * angle.sin() * 100.0).round() / 100.0,
            },
        );
        hints
            .node_colors
            .insert(node.id.clone(), color_for(&node.kind).to_string());
        if let Some(file) = &node.file {
            clusters.entry(file.clone()).or_default().push(node.id.clone());
        }
    }

    let mut seen = HashSet::new();
    for edge in edges {
        let key = edge_weight_key(edge);
        if seen.insert(key.clone()) {
            hints.edge_weights.insert(key, edge.weight.unwrap_or(1.0));
        }
    }

    hints.layout_hints = Some(LayoutHints {
        algorithm: "force-directed".to_string(),
        directed: true,
        clusters,
    });
    hints
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EdgeKind;

    fn sample() -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        graph.upsert_node(GraphNode::new("a.ts:a", NodeKind::Function).with_location("a.ts", 1));
        graph.upsert_node(GraphNode::new("b.ts:B", NodeKind::Class).with_location("b.ts", 7));
        let mut weighted = GraphEdge::new("a.ts:a", "b.ts:B", EdgeKind::Imports);
        weighted.weight = Some(2.5);
        graph.add_edge(weighted).unwrap();
        graph
    }

    #[test]
    fn test_json_uses_camel_case_keys() {
        let exported = ExportedGraph::from_graph(&sample());
        let value = serde_json::to_value(&exported).unwrap();
        assert!(value.get("exportedAt").is_some());
        assert_eq!(value["statistics"]["nodeCount"], 2);
        assert_eq!(value["statistics"]["edgesByType"]["imports"], 1);
        assert_eq!(value["edges"][0]["type"], "imports");
        assert_eq!(value["edges"][0]["weight"], 2.5);
        assert!(value.get("visualization").is_none());
    }

    #[test]
    fn test_roundtrip_preserves_fields() {
        let graph = sample();
        let json = to_json(&ExportedGraph::from_graph(&graph)).unwrap();
        let restored = from_json(&json).unwrap().into_graph().unwrap();
        assert_eq!(restored.node_count(), graph.node_count());
        assert_eq!(restored.edges(), graph.edges());
        assert_eq!(restored.node("b.ts:B"), graph.node("b.ts:B"));
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let mut exported = ExportedGraph::from_graph(&sample());
        exported.version = "0.9.0".to_string();
        let json = serde_json::to_string(&exported).unwrap();
        assert!(matches!(
            from_json(&json),
            Err(GraphError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn test_into_graph_rejects_dangling_and_duplicates() {
        let mut exported = ExportedGraph::from_graph(&sample());
        exported
            .edges
            .push(GraphEdge::new("a.ts:a", "ghost", EdgeKind::Calls));
        assert!(matches!(
            exported.clone().into_graph(),
            Err(GraphError::InvalidGraph(_))
        ));

        let mut dup = ExportedGraph::from_graph(&sample());
        dup.nodes.push(dup.nodes[0].clone());
        assert!(matches!(dup.into_graph(), Err(GraphError::InvalidGraph(_))));
    }

    #[test]
    fn test_visualization_hints() {
        let exported = ExportedGraph::from_graph(&sample()).with_visualization();
        let viz = exported.visualization.as_ref().unwrap();
        assert_eq!(viz.node_positions.len(), 2);
        assert_eq!(viz.node_colors["b.ts:B"], "#f28e2b");
        assert_eq!(viz.edge_weights["a.ts:a->b.ts:B:imports"], 2.5);
        let hints = viz.layout_hints.as_ref().unwrap();
        assert_eq!(hints.clusters["a.ts"], vec!["a.ts:a"]);

        // Visualization is dropped on reload without affecting the graph
        let graph = exported.into_graph().unwrap();
        assert_eq!(graph.edge_count(), 1);
    }
}
