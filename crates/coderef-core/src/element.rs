//! Element input: the records an external scanner hands to the graph builder.

use crate::error::{GraphError, Result};
use crate::graph::{NodeKind, NodeMetadata};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A scanned code element with its declared outgoing references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeElement {
    pub id: String,
    #[serde(rename = "type", default = "unknown_kind")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Names this element calls.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub calls: Vec<String>,
    /// Names or module paths this element imports.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
    /// Other declared dependencies.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<NodeMetadata>,
}

fn unknown_kind() -> NodeKind {
    NodeKind::Other("unknown".to_string())
}

impl CodeElement {
    pub fn new(id: impl Into<String>, kind: impl Into<NodeKind>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            file: None,
            line: None,
            name: None,
            calls: Vec::new(),
            imports: Vec::new(),
            depends_on: Vec::new(),
            metadata: None,
        }
    }

    pub fn at(mut self, file: impl Into<String>, line: usize) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    pub fn calling<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.calls.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn importing<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.imports.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn depending_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(names.into_iter().map(Into::into));
        self
    }

    /// Check the fields the builder relies on.
    pub fn validate(&self, index: usize) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(GraphError::MalformedElement {
                index,
                reason: "missing id".to_string(),
            });
        }
        if self.file.as_deref().is_some_and(|f| f.trim().is_empty()) {
            return Err(GraphError::MalformedElement {
                index,
                reason: format!("element {} has an empty file path", self.id),
            });
        }
        Ok(())
    }
}

/// Parse a JSON array of elements, reporting the index of the first bad record.
pub fn parse_elements(json: &str) -> Result<Vec<CodeElement>> {
    let raw: Vec<serde_json::Value> = serde_json::from_str(json)?;
    raw.into_iter()
        .enumerate()
        .map(|(index, value)| {
            serde_json::from_value(value).map_err(|e| GraphError::MalformedElement {
                index,
                reason: e.to_string(),
            })
        })
        .collect()
}

/// Read and parse an element file.
pub fn load_elements(path: &Path) -> Result<Vec<CodeElement>> {
    let json = std::fs::read_to_string(path).map_err(|e| GraphError::io(path, e))?;
    parse_elements(&json)
}
