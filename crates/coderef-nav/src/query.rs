//! Query execution over the analyzer's current graph.
//!
//! Every request goes through a response cache keyed by the canonical JSON of
//! the normalized request. Cached responses are dropped when the analyzer
//! installs a new graph or when they outlive `query.cache_expiry_ms`.
//! Query failures are reported in [`QueryResponse::error`], never as `Err`.

use crate::cache::ResponseCache;
use crate::paths::{self, GraphPath};
use crate::suggest::similar_ids;
use crate::traversal::{MultiHopTraversal, ResultClass, TraversalQuery, TraversalResult};
use chrono::{DateTime, Utc};
use coderef_core::analyzer::{GraphSnapshot, SharedAnalyzer, current_snapshot};
use coderef_core::graph::{EdgeKind, GraphEdge, NodeKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError};
use std::time::{Duration, Instant};

const MAX_SUGGESTIONS: usize = 3;

/// The closed set of supported queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryType {
    /// What the target calls.
    WhatCalls,
    /// What calls the target.
    WhatCallsMe,
    WhatImports,
    WhatImportsMe,
    WhatDependsOn,
    WhatDependsOnMe,
    ShortestPath,
    AllPaths,
}

impl QueryType {
    pub const ALL: [QueryType; 8] = [
        Self::WhatCalls,
        Self::WhatCallsMe,
        Self::WhatImports,
        Self::WhatImportsMe,
        Self::WhatDependsOn,
        Self::WhatDependsOnMe,
        Self::ShortestPath,
        Self::AllPaths,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::WhatCalls => "what-calls",
            Self::WhatCallsMe => "what-calls-me",
            Self::WhatImports => "what-imports",
            Self::WhatImportsMe => "what-imports-me",
            Self::WhatDependsOn => "what-depends-on",
            Self::WhatDependsOnMe => "what-depends-on-me",
            Self::ShortestPath => "shortest-path",
            Self::AllPaths => "all-paths",
        }
    }

    pub fn is_path_query(self) -> bool {
        matches!(self, Self::ShortestPath | Self::AllPaths)
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unsupported query type: {s}"))
    }
}

/// How much detail each result carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultFormat {
    #[default]
    Full,
    /// Ids, kinds and depths only; no locations, paths or edges.
    Compact,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    #[serde(rename = "type")]
    pub query_type: QueryType,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<ResultFormat>,
}

impl QueryRequest {
    pub fn new(query_type: QueryType, target: impl Into<String>) -> Self {
        Self {
            query_type,
            target: target.into(),
            source: None,
            max_depth: None,
            format: None,
        }
    }

    /// A path query from `source` to `target`.
    pub fn path(
        query_type: QueryType,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self::new(query_type, target).with_source(source)
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_format(mut self, format: ResultFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Fill in defaults so equivalent requests share one cache key.
    /// Shortest-path stays unbounded unless a depth is given.
    fn normalized(&self, default_paths_depth: usize) -> Self {
        let max_depth = match self.query_type {
            QueryType::ShortestPath => self.max_depth,
            QueryType::AllPaths => Some(self.max_depth.unwrap_or(default_paths_depth)),
            _ => Some(self.max_depth.unwrap_or(1)),
        }
        .map(|d| d.max(1));

        Self {
            query_type: self.query_type,
            target: self.target.trim().to_string(),
            source: self
                .source
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            max_depth,
            format: Some(self.format.unwrap_or_default()),
        }
    }
}

/// A node matched by a relationship query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMatch {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// Kind of the edge that reached this node.
    pub relationship: EdgeKind,
    pub depth: usize,
    pub classification: ResultClass,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edges: Vec<GraphEdge>,
}

/// A path matched by a path query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathMatch {
    pub nodes: Vec<String>,
    pub length: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum QueryResult {
    Node(NodeMatch),
    Path(PathMatch),
}

impl QueryResult {
    /// Node id for node matches, last node for path matches.
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Node(m) => Some(&m.id),
            Self::Path(p) => p.nodes.last().map(String::as_str),
        }
    }

    fn compact(self) -> Self {
        match self {
            Self::Node(m) => Self::Node(NodeMatch {
                file: None,
                line: None,
                path: Vec::new(),
                edges: Vec::new(),
                ..m
            }),
            Self::Path(p) => Self::Path(PathMatch {
                edges: Vec::new(),
                ..p
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    /// The request as executed, with defaults filled in. For unparseable
    /// requests, the raw JSON received.
    pub query: Value,
    pub results: Vec<QueryResult>,
    pub count: usize,
    /// Milliseconds spent answering this call.
    pub execution_time: f64,
    pub cached: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResponse {
    pub(crate) fn failed(query: Value, message: impl Into<String>, started: Instant) -> Self {
        Self {
            query,
            results: Vec::new(),
            count: 0,
            execution_time: elapsed_ms(started),
            cached: false,
            timestamp: Utc::now(),
            truncated: false,
            error: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-query-type timing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPerformance {
    /// Executions, excluding cache hits.
    pub count: u64,
    pub total_time: f64,
    pub average_time: f64,
    pub cache_hits: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub healthy: bool,
    pub generation: u64,
    pub node_count: usize,
    pub edge_count: usize,
    pub cache_entries: usize,
    pub traversal_cache_entries: usize,
    pub message: String,
}

struct Found {
    results: Vec<QueryResult>,
    truncated: bool,
}

/// Answers [`QueryRequest`]s against a shared analyzer.
#[derive(Debug)]
pub struct QueryExecutor {
    analyzer: SharedAnalyzer,
    traversal: MultiHopTraversal,
    cache: ResponseCache,
    cache_generation: u64,
    default_max_depth: usize,
    max_paths: usize,
    performance: BTreeMap<QueryType, QueryPerformance>,
}

impl QueryExecutor {
    /// Create an executor with limits from the analyzer's configuration.
    pub fn new(analyzer: SharedAnalyzer) -> Self {
        let config = analyzer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .config()
            .query
            .clone();
        Self {
            traversal: MultiHopTraversal::new(Arc::clone(&analyzer)),
            analyzer,
            cache: ResponseCache::new(
                Duration::from_millis(config.cache_expiry_ms),
                config.max_cache_entries,
            ),
            cache_generation: 0,
            default_max_depth: config.default_max_depth.max(1),
            max_paths: config.max_paths,
            performance: BTreeMap::new(),
        }
    }

    /// Replace the response cache with one using `ttl`.
    pub fn with_cache_expiry(mut self, ttl: Duration) -> Self {
        self.cache = ResponseCache::new(ttl, self.cache.max_entries());
        self
    }

    pub fn execute(&mut self, request: &QueryRequest) -> QueryResponse {
        let started = Instant::now();
        let request = request.normalized(self.default_max_depth);
        let echo = serde_json::to_value(&request).unwrap_or(Value::Null);

        let Some(snapshot) = current_snapshot(&self.analyzer) else {
            return QueryResponse::failed(echo, "no graph loaded; run analyze first", started);
        };
        self.sync_generation(snapshot.generation());

        let key = echo.to_string();
        if let Some(mut response) = self.cache.get(&key) {
            response.cached = true;
            response.execution_time = elapsed_ms(started);
            response.timestamp = Utc::now();
            self.performance
                .entry(request.query_type)
                .or_default()
                .cache_hits += 1;
            tracing::debug!(
                query = %request.query_type,
                target = %request.target,
                "query cache hit"
            );
            return response;
        }

        let response = match self.run(&snapshot, &request) {
            Ok(found) => {
                let format = request.format.unwrap_or_default();
                let results: Vec<QueryResult> = match format {
                    ResultFormat::Full => found.results,
                    ResultFormat::Compact => {
                        found.results.into_iter().map(QueryResult::compact).collect()
                    }
                };
                QueryResponse {
                    query: echo,
                    count: results.len(),
                    results,
                    execution_time: elapsed_ms(started),
                    cached: false,
                    timestamp: Utc::now(),
                    truncated: found.truncated,
                    error: None,
                }
            }
            Err(message) => QueryResponse::failed(echo, message, started),
        };

        self.record(request.query_type, response.execution_time);
        tracing::debug!(
            query = %request.query_type,
            target = %request.target,
            count = response.count,
            error = response.error.as_deref(),
            "query executed"
        );
        self.cache.insert(key, response.clone());
        response
    }

    /// Execute a request given as raw JSON. Parse failures and unsupported
    /// query types come back in `error`.
    pub fn execute_json(&mut self, raw: &str) -> QueryResponse {
        let started = Instant::now();
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                let message = format!("invalid query JSON: {e}");
                return QueryResponse::failed(Value::Null, message, started);
            }
        };
        match serde_json::from_value::<QueryRequest>(value.clone()) {
            Ok(request) => self.execute(&request),
            Err(e) => {
                let message = match value.get("type").and_then(Value::as_str) {
                    Some(t) if t.parse::<QueryType>().is_err() => {
                        format!("unsupported query type: {t}")
                    }
                    _ => format!("malformed query request: {e}"),
                };
                QueryResponse::failed(value, message, started)
            }
        }
    }

    /// Run each request independently; one failure does not affect the rest.
    pub fn execute_batch(&mut self, requests: &[QueryRequest]) -> Vec<QueryResponse> {
        requests.iter().map(|r| self.execute(r)).collect()
    }

    pub fn health_check(&self) -> HealthStatus {
        let snapshot = current_snapshot(&self.analyzer);
        let (generation, node_count, edge_count) = snapshot.as_ref().map_or((0, 0, 0), |s| {
            (s.generation(), s.graph().node_count(), s.graph().edge_count())
        });
        let healthy = snapshot.is_some();
        HealthStatus {
            healthy,
            generation,
            node_count,
            edge_count,
            cache_entries: self.cache.len(),
            traversal_cache_entries: self.traversal.cache_len(),
            message: if healthy {
                format!("graph loaded with {node_count} nodes and {edge_count} edges")
            } else {
                "no graph loaded".to_string()
            },
        }
    }

    /// Drop every cached response and traversal.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.traversal.clear_cache();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn performance_stats(&self) -> &BTreeMap<QueryType, QueryPerformance> {
        &self.performance
    }

    /// The traversal engine used for multi-hop lookups.
    pub fn traversal(&mut self) -> &mut MultiHopTraversal {
        &mut self.traversal
    }

    fn sync_generation(&mut self, generation: u64) {
        if generation != self.cache_generation {
            if !self.cache.is_empty() {
                tracing::debug!(
                    from = self.cache_generation,
                    to = generation,
                    "graph replaced, dropping query cache"
                );
            }
            self.cache.clear();
            self.cache_generation = generation;
        }
    }

    fn record(&mut self, query_type: QueryType, elapsed: f64) {
        let stats = self.performance.entry(query_type).or_default();
        stats.count += 1;
        stats.total_time += elapsed;
        stats.average_time = stats.total_time / stats.count as f64;
    }

    fn run(&mut self, snapshot: &GraphSnapshot, request: &QueryRequest) -> Result<Found, String> {
        match request.query_type {
            QueryType::WhatCalls => self.related(snapshot, request, TraversalQuery::Calls),
            QueryType::WhatCallsMe => self.related(snapshot, request, TraversalQuery::CalledBy),
            QueryType::WhatImports => self.related(snapshot, request, TraversalQuery::Imports),
            QueryType::WhatImportsMe => {
                self.related(snapshot, request, TraversalQuery::ImportedBy)
            }
            QueryType::WhatDependsOn => {
                self.related(snapshot, request, TraversalQuery::DependsOn)
            }
            QueryType::WhatDependsOnMe => {
                self.related(snapshot, request, TraversalQuery::Dependents)
            }
            QueryType::ShortestPath => shortest(snapshot, request),
            QueryType::AllPaths => all_paths(snapshot, request, self.max_paths),
        }
    }

    fn related(
        &mut self,
        snapshot: &GraphSnapshot,
        request: &QueryRequest,
        query: TraversalQuery,
    ) -> Result<Found, String> {
        require_node(snapshot, &request.target, "target")?;
        let depth = request.max_depth.unwrap_or(1);
        if depth <= 1 {
            return Ok(Found {
                results: direct_matches(snapshot, &request.target, query),
                truncated: false,
            });
        }

        let result = self
            .traversal
            .traverse_in(snapshot, &request.target, query, Some(depth))
            .ok_or_else(|| not_found(snapshot, &request.target, "target"))?;
        Ok(Found {
            results: result
                .results
                .into_iter()
                .map(|r| QueryResult::Node(node_match_from(r)))
                .collect(),
            truncated: result.truncated,
        })
    }
}

/// Single-hop neighbors straight from the relationship index.
fn direct_matches(
    snapshot: &GraphSnapshot,
    id: &str,
    query: TraversalQuery,
) -> Vec<QueryResult> {
    let mut seen = HashSet::new();
    query
        .neighbors(snapshot, id)
        .into_iter()
        .filter(|(other, _)| *other != id && seen.insert(*other))
        .filter_map(|(other, edge)| {
            let node = snapshot.node(other)?;
            Some(QueryResult::Node(NodeMatch {
                id: node.id.clone(),
                kind: node.kind.clone(),
                file: node.file.clone(),
                line: node.line,
                relationship: edge.kind.clone(),
                depth: 1,
                classification: ResultClass::Direct,
                path: vec![id.to_string(), node.id.clone()],
                edges: vec![edge.clone()],
            }))
        })
        .collect()
}

fn node_match_from(result: TraversalResult) -> NodeMatch {
    let relationship = result
        .edges
        .last()
        .map(|e| e.kind.clone())
        .unwrap_or(EdgeKind::DependsOn);
    NodeMatch {
        id: result.node_id,
        kind: result.node.kind,
        file: result.node.file,
        line: result.node.line,
        relationship,
        depth: result.depth,
        classification: result.classification,
        path: result.path,
        edges: result.edges,
    }
}

fn path_match_from(path: GraphPath) -> QueryResult {
    QueryResult::Path(PathMatch {
        length: path.len(),
        nodes: path.nodes,
        edges: path.edges,
    })
}

fn path_endpoints<'r>(
    snapshot: &GraphSnapshot,
    request: &'r QueryRequest,
) -> Result<(&'r str, &'r str), String> {
    let source = request
        .source
        .as_deref()
        .ok_or_else(|| format!("{} requires a source", request.query_type))?;
    require_node(snapshot, source, "source")?;
    require_node(snapshot, &request.target, "target")?;
    Ok((source, &request.target))
}

fn shortest(snapshot: &GraphSnapshot, request: &QueryRequest) -> Result<Found, String> {
    let (source, target) = path_endpoints(snapshot, request)?;
    let results = paths::shortest_path(snapshot, source, target, request.max_depth)
        .map(path_match_from)
        .into_iter()
        .collect();
    Ok(Found {
        results,
        truncated: false,
    })
}

fn all_paths(
    snapshot: &GraphSnapshot,
    request: &QueryRequest,
    max_paths: usize,
) -> Result<Found, String> {
    let (source, target) = path_endpoints(snapshot, request)?;
    let depth = request.max_depth.unwrap_or(1);
    let search = paths::all_paths(snapshot, source, target, depth, max_paths);
    Ok(Found {
        results: search.paths.into_iter().map(path_match_from).collect(),
        truncated: search.truncated,
    })
}

fn require_node(snapshot: &GraphSnapshot, id: &str, role: &str) -> Result<(), String> {
    if snapshot.contains(id) {
        Ok(())
    } else {
        Err(not_found(snapshot, id, role))
    }
}

fn not_found(snapshot: &GraphSnapshot, id: &str, role: &str) -> String {
    let suggestions = similar_ids(snapshot.graph(), id, MAX_SUGGESTIONS);
    if suggestions.is_empty() {
        format!("{role} node not found: {id}")
    } else {
        format!(
            "{role} node not found: {id} (did you mean: {})",
            suggestions.join(", ")
        )
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
