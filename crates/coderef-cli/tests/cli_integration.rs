//! Integration tests for coderef-cli functionality.
//! Covers the library calls the CLI commands make plus a few end-to-end runs
//! of the built binary.

use coderef_core::analyzer::Analyzer;
use coderef_core::config::CoderefConfig;
use coderef_core::storage;
use coderef_nav::query::{QueryExecutor, QueryRequest, QueryType};
use std::path::Path;
use std::process::Command;

const ELEMENTS: &str = r#"[
  {"id": "src/app.ts:main", "type": "function", "file": "src/app.ts", "line": 1,
   "calls": ["load", "render"], "imports": ["./ui"]},
  {"id": "src/app.ts:load", "type": "function", "file": "src/app.ts", "line": 12,
   "calls": ["render"]},
  {"id": "src/ui.ts:render", "type": "function", "file": "src/ui.ts", "line": 3},
  {"id": "src/ui.ts:ui", "type": "module", "file": "src/ui.ts", "line": 1}
]"#;

fn write_elements(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("elements.json");
    std::fs::write(&path, ELEMENTS).unwrap();
    path
}

fn coderef(project: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_coderef"))
        .arg("--project")
        .arg(project)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap()
}

#[test]
fn test_config_defaults_without_file() {
    let tmpdir = tempfile::tempdir().unwrap();
    let config = CoderefConfig::load(tmpdir.path()).unwrap();
    assert_eq!(config.query.cache_expiry_ms, 300_000);
    assert_eq!(config.traversal.max_depth, 3);
    assert!(!storage::graph_exists(tmpdir.path()));
}

#[test]
fn test_analyze_save_then_query() {
    let tmpdir = tempfile::tempdir().unwrap();
    let elements = write_elements(tmpdir.path());

    let mut analyzer = Analyzer::default();
    let result = analyzer.analyze_file(&elements).unwrap();
    assert_eq!(result.statistics.node_count, 4);
    assert_eq!(result.statistics.edge_count, 4);
    analyzer
        .save_graph(&storage::graph_file(tmpdir.path()))
        .unwrap();

    let mut restored = Analyzer::default();
    restored
        .load_graph(&storage::graph_file(tmpdir.path()))
        .unwrap();
    let mut executor = QueryExecutor::new(restored.into_shared());
    let response = executor.execute(&QueryRequest::new(
        QueryType::WhatCallsMe,
        "src/ui.ts:render",
    ));
    assert_eq!(response.count, 2);
}

#[test]
fn test_binary_analyze_and_query() {
    let tmpdir = tempfile::tempdir().unwrap();
    let elements = write_elements(tmpdir.path());

    let out = coderef(tmpdir.path(), &["analyze", elements.to_str().unwrap()]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let analysis: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(analysis["statistics"]["nodeCount"], 4);
    assert!(storage::graph_exists(tmpdir.path()));

    let out = coderef(
        tmpdir.path(),
        &["query", "shortest-path", "src/ui.ts:render", "--source", "src/app.ts:main"],
    );
    assert!(out.status.success());
    let response: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(response["count"], 1);
    assert_eq!(response["results"][0]["length"], 1);
}

#[test]
fn test_binary_query_unknown_node_fails() {
    let tmpdir = tempfile::tempdir().unwrap();
    let elements = write_elements(tmpdir.path());
    assert!(coderef(tmpdir.path(), &["analyze", elements.to_str().unwrap()])
        .status
        .success());

    let out = coderef(tmpdir.path(), &["query", "what-calls", "src/app.ts:mian"]);
    assert!(!out.status.success());
    let response: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert!(response["error"].as_str().unwrap().contains("src/app.ts:main"));
}

#[test]
fn test_binary_without_graph() {
    let tmpdir = tempfile::tempdir().unwrap();
    let out = coderef(tmpdir.path(), &["info"]);
    assert!(!out.status.success());

    let out = coderef(tmpdir.path(), &["health"]);
    assert!(out.status.success());
    let health: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(health["healthy"], false);
}

#[test]
fn test_binary_traverse_and_export() {
    let tmpdir = tempfile::tempdir().unwrap();
    let elements = write_elements(tmpdir.path());
    assert!(coderef(tmpdir.path(), &["analyze", elements.to_str().unwrap()])
        .status
        .success());

    let out = coderef(tmpdir.path(), &["traverse", "used-by", "src/ui.ts:render"]);
    assert!(out.status.success());
    let result: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(result["totalResults"], 2);

    let out = coderef(tmpdir.path(), &["export", "--visualization"]);
    assert!(out.status.success());
    let exported: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(exported["version"], "1.0.0");
    assert!(exported["visualization"]["nodeColors"].is_object());
}
