//! Analysis orchestration: owns the current graph snapshot.
//!
//! Each successful [`Analyzer::analyze`] or [`Analyzer::load_graph`] installs a
//! new immutable [`GraphSnapshot`] (graph + relationship index) under a fresh
//! generation number. Query components hold the analyzer through
//! [`SharedAnalyzer`] and compare generations to drop stale caches.

use crate::builder::{GraphBuilder, UnresolvedReference};
use crate::config::CoderefConfig;
use crate::cycles::{CycleGroup, find_circular_dependencies};
use crate::element::{self, CodeElement};
use crate::error::{GraphError, Result};
use crate::graph::{DependencyGraph, EdgeKind, GraphEdge, GraphNode, GraphStatistics};
use crate::index::RelationshipIndex;
use crate::schema::ExportedGraph;
use crate::storage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

/// Analyzer handle shared by the query executor and traversal engine.
pub type SharedAnalyzer = Arc<RwLock<Analyzer>>;

/// The current snapshot of a shared analyzer, if any.
pub fn current_snapshot(shared: &SharedAnalyzer) -> Option<Arc<GraphSnapshot>> {
    shared
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .snapshot()
}

/// An immutable graph together with its relationship index.
#[derive(Debug)]
pub struct GraphSnapshot {
    generation: u64,
    graph: DependencyGraph,
    index: RelationshipIndex,
}

impl GraphSnapshot {
    pub fn new(generation: u64, graph: DependencyGraph) -> Self {
        let index = RelationshipIndex::build(&graph);
        Self {
            generation,
            graph,
            index,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn index(&self) -> &RelationshipIndex {
        &self.index
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.graph.node(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.graph.contains_node(id)
    }

    pub fn outgoing(&self, id: &str, kind: Option<&EdgeKind>) -> Vec<&GraphEdge> {
        self.index.outgoing(&self.graph, id, kind)
    }

    pub fn incoming(&self, id: &str, kind: Option<&EdgeKind>) -> Vec<&GraphEdge> {
        self.index.incoming(&self.graph, id, kind)
    }
}

/// Summary of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub statistics: GraphStatistics,
    pub circular_dependencies: Vec<CycleGroup>,
    pub isolated_nodes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved_references: Vec<UnresolvedReference>,
    /// Wall time in milliseconds.
    pub analysis_time: f64,
}

/// Drives graph construction and owns the current snapshot.
///
/// Not reentrant: callers serialize `analyze`/`load_graph` calls, which the
/// `RwLock` in [`SharedAnalyzer`] does for shared use.
#[derive(Debug)]
pub struct Analyzer {
    config: CoderefConfig,
    snapshot: Option<Arc<GraphSnapshot>>,
    generation: u64,
    last_analysis: Option<AnalysisResult>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(CoderefConfig::default())
    }
}

impl Analyzer {
    pub fn new(config: CoderefConfig) -> Self {
        Self {
            config,
            snapshot: None,
            generation: 0,
            last_analysis: None,
        }
    }

    pub fn into_shared(self) -> SharedAnalyzer {
        Arc::new(RwLock::new(self))
    }

    pub fn config(&self) -> &CoderefConfig {
        &self.config
    }

    /// Build a graph from `elements` and replace the held snapshot.
    /// On error the previous snapshot stays authoritative.
    pub fn analyze(&mut self, elements: &[CodeElement]) -> Result<AnalysisResult> {
        let start = Instant::now();
        let output = GraphBuilder::new()
            .resolve_by_name(self.config.analysis.resolve_by_name)
            .build(elements)?;

        if !output.unresolved.is_empty() {
            tracing::warn!(
                count = output.unresolved.len(),
                "skipped unresolved references"
            );
        }

        let snapshot = self.install(output.graph);
        let result = summarize(&snapshot, output.unresolved, start);
        tracing::info!(
            generation = snapshot.generation(),
            nodes = result.statistics.node_count,
            edges = result.statistics.edge_count,
            cycles = result.circular_dependencies.len(),
            isolated = result.isolated_nodes.len(),
            "analysis complete"
        );
        self.last_analysis = Some(result.clone());
        Ok(result)
    }

    /// Read an element JSON file and analyze it.
    pub fn analyze_file(&mut self, path: &Path) -> Result<AnalysisResult> {
        let elements = element::load_elements(path)?;
        self.analyze(&elements)
    }

    pub fn snapshot(&self) -> Option<Arc<GraphSnapshot>> {
        self.snapshot.clone()
    }

    /// Generation of the held snapshot; 0 before the first build.
    pub fn generation(&self) -> u64 {
        self.snapshot.as_ref().map_or(0, |s| s.generation())
    }

    pub fn has_graph(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn statistics(&self) -> Option<GraphStatistics> {
        self.snapshot.as_ref().map(|s| s.graph().statistics())
    }

    pub fn last_analysis(&self) -> Option<&AnalysisResult> {
        self.last_analysis.as_ref()
    }

    /// Export the held graph, or `None` if nothing has been built.
    pub fn export_graph_as_json(&self) -> Option<ExportedGraph> {
        let snapshot = self.snapshot.as_ref()?;
        let exported = ExportedGraph::from_graph(snapshot.graph());
        Some(if self.config.export.include_visualization {
            exported.with_visualization()
        } else {
            exported
        })
    }

    pub fn save_graph(&self, path: &Path) -> Result<()> {
        let exported = self.export_graph_as_json().ok_or(GraphError::NoGraph)?;
        storage::save(path, &exported, self.config.storage.compress)?;
        tracing::info!(path = %path.display(), nodes = exported.nodes.len(), "graph saved");
        Ok(())
    }

    /// Restore a saved graph. Any failure leaves the held graph unchanged.
    pub fn load_graph(&mut self, path: &Path) -> Result<AnalysisResult> {
        let exported = storage::load(path)?;
        let result = self.import_graph(exported)?;
        tracing::info!(
            path = %path.display(),
            nodes = result.statistics.node_count,
            "graph loaded"
        );
        Ok(result)
    }

    pub fn import_graph(&mut self, exported: ExportedGraph) -> Result<AnalysisResult> {
        let start = Instant::now();
        let graph = exported.into_graph()?;
        let snapshot = self.install(graph);
        let result = summarize(&snapshot, Vec::new(), start);
        self.last_analysis = Some(result.clone());
        Ok(result)
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.snapshot.as_ref().is_some_and(|s| s.contains(id))
    }

    /// Outgoing edges of `id`; empty when the node is unknown (see [`Self::has_node`]).
    pub fn get_dependencies(&self, id: &str) -> Vec<GraphEdge> {
        self.snapshot
            .as_ref()
            .map(|s| s.outgoing(id, None).into_iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Incoming edges of `id`; empty when the node is unknown.
    pub fn get_dependents(&self, id: &str) -> Vec<GraphEdge> {
        self.snapshot
            .as_ref()
            .map(|s| s.incoming(id, None).into_iter().cloned().collect())
            .unwrap_or_default()
    }

    fn install(&mut self, graph: DependencyGraph) -> Arc<GraphSnapshot> {
        self.generation += 1;
        let snapshot = Arc::new(GraphSnapshot::new(self.generation, graph));
        self.snapshot = Some(Arc::clone(&snapshot));
        snapshot
    }
}

fn summarize(
    snapshot: &GraphSnapshot,
    unresolved_references: Vec<UnresolvedReference>,
    start: Instant,
) -> AnalysisResult {
    AnalysisResult {
        statistics: snapshot.graph().statistics(),
        circular_dependencies: find_circular_dependencies(snapshot.graph()),
        isolated_nodes: snapshot.index().isolated_nodes(snapshot.graph()),
        unresolved_references,
        analysis_time: start.elapsed().as_secs_f64() * 1000.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> Vec<CodeElement> {
        vec![
            CodeElement::new("a", "function").calling(["b"]),
            CodeElement::new("b", "function").calling(["c"]),
            CodeElement::new("c", "function").calling(["a"]),
            CodeElement::new("d", "function"),
        ]
    }

    #[test]
    fn test_generation_increments() {
        let mut analyzer = Analyzer::default();
        assert_eq!(analyzer.generation(), 0);
        analyzer.analyze(&scenario()).unwrap();
        assert_eq!(analyzer.generation(), 1);
        analyzer.analyze(&scenario()).unwrap();
        assert_eq!(analyzer.generation(), 2);
    }

    #[test]
    fn test_failed_analyze_keeps_previous_graph() {
        let mut analyzer = Analyzer::default();
        analyzer.analyze(&scenario()).unwrap();
        let bad = vec![CodeElement::new("", "function")];
        assert!(analyzer.analyze(&bad).is_err());
        assert_eq!(analyzer.generation(), 1);
        assert_eq!(analyzer.statistics().unwrap().node_count, 4);
    }

    #[test]
    fn test_dependencies_and_dependents() {
        let mut analyzer = Analyzer::default();
        analyzer.analyze(&scenario()).unwrap();
        let deps = analyzer.get_dependencies("a");
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].target, "b");
        assert_eq!(analyzer.get_dependents("a")[0].source, "c");
        assert!(analyzer.get_dependencies("zzz").is_empty());
        assert!(!analyzer.has_node("zzz"));
        assert!(analyzer.get_dependencies("d").is_empty());
        assert!(analyzer.has_node("d"));
    }

    #[test]
    fn test_save_without_graph_fails() {
        let analyzer = Analyzer::default();
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            analyzer.save_graph(&tmp.path().join("g.json")),
            Err(GraphError::NoGraph)
        ));
        assert!(analyzer.export_graph_as_json().is_none());
    }

    #[test]
    fn test_shared_snapshot_survives_replacement() {
        let shared = Analyzer::default().into_shared();
        shared.write().unwrap().analyze(&scenario()).unwrap();
        let before = current_snapshot(&shared).unwrap();
        shared
            .write()
            .unwrap()
            .analyze(&[CodeElement::new("solo", "module")])
            .unwrap();
        let after = current_snapshot(&shared).unwrap();
        // Readers holding the old snapshot still see a consistent old graph
        assert_eq!(before.graph().node_count(), 4);
        assert_eq!(before.graph().edge_count(), 3);
        assert_eq!(after.graph().node_count(), 1);
        assert!(after.generation() > before.generation());
    }
}
