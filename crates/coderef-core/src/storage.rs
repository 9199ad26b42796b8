//! Read/write exported graph files from disk.

use crate::error::{GraphError, Result};
use crate::schema::{self, ExportedGraph};
use std::fs;
use std::path::{Path, PathBuf};

const CODEREF_DIR: &str = ".coderef";
const GRAPH_FILE: &str = "graph.json";
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];
const ZSTD_LEVEL: i32 = 3;

/// Get the path to the coderef directory for a given project root.
pub fn coderef_dir(project_root: &Path) -> PathBuf {
    project_root.join(CODEREF_DIR)
}

/// Get the default graph file path for a given project root.
pub fn graph_file(project_root: &Path) -> PathBuf {
    coderef_dir(project_root).join(GRAPH_FILE)
}

/// Check if a saved graph exists for the given project root.
pub fn graph_exists(project_root: &Path) -> bool {
    graph_file(project_root).exists()
}

/// Write an exported graph, creating parent directories as needed.
/// With `compress`, the JSON is zstd-compressed before writing.
pub fn save(path: &Path, exported: &ExportedGraph, compress: bool) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| GraphError::io(parent, e))?;
    }

    let json = schema::to_json(exported)?;
    let bytes = if compress {
        zstd::encode_all(json.as_bytes(), ZSTD_LEVEL).map_err(|e| GraphError::io(path, e))?
    } else {
        json.into_bytes()
    };
    fs::write(path, bytes).map_err(|e| GraphError::io(path, e))?;
    tracing::debug!(path = %path.display(), compress, "graph saved");
    Ok(())
}

/// Read an exported graph. Compression is detected from the zstd magic bytes.
pub fn load(path: &Path) -> Result<ExportedGraph> {
    let bytes = fs::read(path).map_err(|e| GraphError::io(path, e))?;
    let bytes = if bytes.starts_with(&ZSTD_MAGIC) {
        zstd::decode_all(bytes.as_slice()).map_err(|e| GraphError::io(path, e))?
    } else {
        bytes
    };
    let json = String::from_utf8(bytes).map_err(|e| {
        GraphError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        )
    })?;
    schema::from_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{DependencyGraph, EdgeKind, GraphEdge, GraphNode, NodeKind};

    fn exported() -> ExportedGraph {
        let mut graph = DependencyGraph::new();
        graph.upsert_node(GraphNode::new("a", NodeKind::Function));
        graph.upsert_node(GraphNode::new("b", NodeKind::Function));
        graph.add_edge(GraphEdge::new("a", "b", EdgeKind::Calls)).unwrap();
        ExportedGraph::from_graph(&graph)
    }

    #[test]
    fn test_save_load_plain() {
        let tmp = tempfile::tempdir().unwrap();
        let path = graph_file(tmp.path());
        save(&path, &exported(), false).unwrap();
        assert!(graph_exists(tmp.path()));
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with('{'));
        assert_eq!(load(&path).unwrap().edges.len(), 1);
    }

    #[test]
    fn test_save_load_compressed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/graph.json.zst");
        save(&path, &exported(), true).unwrap();
        let raw = fs::read(&path).unwrap();
        assert!(raw.starts_with(&ZSTD_MAGIC));
        let loaded = load(&path).unwrap();
        assert_eq!(loaded.nodes.len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let err = load(&tmp.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, GraphError::Io { .. }));
    }

    #[test]
    fn test_load_corrupt_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("graph.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load(&path), Err(GraphError::Json(_))));
    }
}
