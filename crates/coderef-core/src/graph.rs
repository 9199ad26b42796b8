//! Graph data model: nodes, typed edges and the dependency graph container.

use crate::error::{GraphError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Maximum number of uninterpreted keys a node's metadata may carry.
pub const MAX_METADATA_EXTRAS: usize = 32;

/// The kind of code element a node represents.
///
/// Unknown kinds are preserved verbatim in `Other` so they survive export/import.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    Function,
    Method,
    Class,
    Interface,
    Type,
    Constant,
    Variable,
    Component,
    Hook,
    Module,
    Other(String),
}

impl NodeKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Type => "type",
            Self::Constant => "constant",
            Self::Variable => "variable",
            Self::Component => "component",
            Self::Hook => "hook",
            Self::Module => "module",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for NodeKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "function" => Self::Function,
            "method" => Self::Method,
            "class" => Self::Class,
            "interface" => Self::Interface,
            "type" => Self::Type,
            "constant" => Self::Constant,
            "variable" => Self::Variable,
            "component" => Self::Component,
            "hook" => Self::Hook,
            "module" | "file" => Self::Module,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for NodeKind {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of relationship an edge encodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EdgeKind {
    /// Function call or method invocation.
    Calls,
    /// Import/use of another element or module.
    Imports,
    /// Generic declared dependency.
    DependsOn,
    /// Class inheritance.
    Extends,
    /// Interface/trait implementation.
    Implements,
    /// Structural containment (module → member). Not a dependency.
    Contains,
    Other(String),
}

impl EdgeKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Calls => "calls",
            Self::Imports => "imports",
            Self::DependsOn => "depends-on",
            Self::Extends => "extends",
            Self::Implements => "implements",
            Self::Contains => "contains",
            Self::Other(s) => s,
        }
    }

    /// Whether this edge kind expresses a dependency (everything but containment).
    pub fn is_dependency(&self) -> bool {
        !matches!(self, Self::Contains)
    }
}

impl From<String> for EdgeKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "calls" => Self::Calls,
            "imports" => Self::Imports,
            "depends-on" | "depends_on" | "dependsOn" => Self::DependsOn,
            "extends" => Self::Extends,
            "implements" => Self::Implements,
            "contains" => Self::Contains,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for EdgeKind {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<EdgeKind> for String {
    fn from(kind: EdgeKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific structural details for a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum NodeDetail {
    Function {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        parameters: Vec<String>,
        #[serde(default)]
        is_async: bool,
        #[serde(default)]
        exported: bool,
    },
    Class {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        extends: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        implements: Vec<String>,
    },
    Module {
        path: String,
    },
}

/// Per-node metadata: typed details plus a bounded map of uninterpreted extras.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetadata {
    /// Display name of the element (the `name` part of `file:name`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<NodeDetail>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    extras: BTreeMap<String, serde_json::Value>,
}

impl NodeMetadata {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_detail(mut self, detail: NodeDetail) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Store an extra key. Returns false when the map is full and `key` is new.
    pub fn insert_extra(&mut self, key: impl Into<String>, value: serde_json::Value) -> bool {
        let key = key.into();
        if self.extras.len() >= MAX_METADATA_EXTRAS && !self.extras.contains_key(&key) {
            return false;
        }
        self.extras.insert(key, value);
        true
    }

    pub fn extra(&self, key: &str) -> Option<&serde_json::Value> {
        self.extras.get(key)
    }

    pub fn extras(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.extras
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.detail.is_none() && self.extras.is_empty()
    }
}

/// A uniquely identified code element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Stable identity, typically `file:name`.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<NodeMetadata>,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, kind: impl Into<NodeKind>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            file: None,
            line: None,
            metadata: None,
        }
    }

    pub fn with_location(mut self, file: impl Into<String>, line: usize) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    pub fn with_metadata(mut self, metadata: NodeMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Display name: the metadata name if present, else the text after the last `:`.
    pub fn short_name(&self) -> &str {
        if let Some(name) = self.metadata.as_ref().and_then(|m| m.name.as_deref()) {
            return name;
        }
        short_name_of(&self.id)
    }
}

/// The `name` part of a `file:name` identity.
pub fn short_name_of(id: &str) -> &str {
    id.rsplit_once(':').map_or(id, |(_, name)| name)
}

/// A directed, typed relationship between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

/// Identity of an edge: at most one edge per `(source, target, kind)`.
pub type EdgeKey = (String, String, EdgeKind);

impl GraphEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
            weight: None,
        }
    }

    pub fn key(&self) -> EdgeKey {
        (self.source.clone(), self.target.clone(), self.kind.clone())
    }
}

/// Aggregate counts describing a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStatistics {
    pub node_count: usize,
    pub edge_count: usize,
    #[serde(default)]
    pub edges_by_type: BTreeMap<String, usize>,
    #[serde(default)]
    pub density_ratio: f64,
}

/// Nodes keyed by id plus an ordered edge list.
///
/// Every edge's endpoints exist among the nodes; [`DependencyGraph::add_edge`]
/// rejects anything else.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeMap<String, GraphNode>,
    edges: Vec<GraphEdge>,
    edge_keys: HashSet<EdgeKey>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, replacing any existing node with the same id.
    /// Returns true if the id was new.
    pub fn upsert_node(&mut self, node: GraphNode) -> bool {
        self.nodes.insert(node.id.clone(), node).is_none()
    }

    /// Insert an edge. Returns `Ok(false)` if an edge with the same key exists.
    pub fn add_edge(&mut self, edge: GraphEdge) -> Result<bool> {
        for endpoint in [&edge.source, &edge.target] {
            if !self.nodes.contains_key(endpoint) {
                return Err(GraphError::DanglingEdge {
                    source_id: edge.source.clone(),
                    target_id: edge.target.clone(),
                    kind: edge.kind.to_string(),
                    missing: endpoint.clone(),
                });
            }
        }
        if !self.edge_keys.insert(edge.key()) {
            return Ok(false);
        }
        self.edges.push(edge);
        Ok(true)
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn has_edge(&self, source: &str, target: &str, kind: &EdgeKind) -> bool {
        self.edge_keys
            .contains(&(source.to_string(), target.to_string(), kind.clone()))
    }

    /// Nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Edges in insertion order.
    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edges_by_type(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for edge in &self.edges {
            *counts.entry(edge.kind.to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// edges / (n * (n - 1)) for n > 1, else 0.
    pub fn density_ratio(&self) -> f64 {
        let n = self.nodes.len();
        if n <= 1 {
            return 0.0;
        }
        self.edges.len() as f64 / (n * (n - 1)) as f64
    }

    pub fn statistics(&self) -> GraphStatistics {
        GraphStatistics {
            node_count: self.node_count(),
            edge_count: self.edge_count(),
            edges_by_type: self.edges_by_type(),
            density_ratio: self.density_ratio(),
        }
    }

    /// Re-check the endpoint invariant over every edge.
    pub fn validate(&self) -> Result<()> {
        for edge in &self.edges {
            for endpoint in [&edge.source, &edge.target] {
                if !self.nodes.contains_key(endpoint) {
                    return Err(GraphError::DanglingEdge {
                        source_id: edge.source.clone(),
                        target_id: edge.target.clone(),
                        kind: edge.kind.to_string(),
                        missing: endpoint.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
