//! Error types for graph construction and persistence.
//!
//! Only structural failures are errors here. An unresolved reference is
//! collected by the builder and reported, and query-level "not found" is
//! carried inside query responses by `coderef-nav`.

use std::path::PathBuf;

/// Result type for coderef-core operations.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors that abort an analysis run or a graph load.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// An input element is missing a required field.
    #[error("malformed element at index {index}: {reason}")]
    MalformedElement { index: usize, reason: String },

    /// An edge points at a node id that is not in the graph.
    #[error("edge {source_id} -[{kind}]-> {target_id} references unknown node {missing}")]
    DanglingEdge {
        source_id: String,
        target_id: String,
        kind: String,
        missing: String,
    },

    /// A serialized graph is structurally invalid (duplicate ids, etc.).
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    /// The serialized graph was written by an incompatible schema version.
    #[error("graph version mismatch: expected {expected}, found {found}")]
    UnsupportedVersion { expected: String, found: String },

    /// An operation needed a built graph but none is held.
    #[error("no graph has been built or loaded")]
    NoGraph,

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File system operation failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl GraphError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for errors raised while building a graph from elements.
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedElement { .. } | Self::DanglingEdge { .. }
        )
    }
}
