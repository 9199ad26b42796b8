//! Graph construction: elements in, validated [`DependencyGraph`] out.
//!
//! References are resolved against the element-id namespace. A reference that
//! cannot be resolved is skipped and recorded; only malformed elements abort
//! the build.

use crate::element::CodeElement;
use crate::error::Result;
use crate::graph::{DependencyGraph, EdgeKind, GraphEdge, GraphNode, NodeKind, short_name_of};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A declared reference that did not match any element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedReference {
    pub source: String,
    pub reference: String,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
}

/// The graph produced by one build plus the references it had to skip.
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    pub graph: DependencyGraph,
    pub unresolved: Vec<UnresolvedReference>,
}

/// Turns code elements into nodes and edges.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    resolve_by_name: bool,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self {
            resolve_by_name: true,
        }
    }
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow resolving a bare name to the unique element with that short name.
    pub fn resolve_by_name(mut self, enabled: bool) -> Self {
        self.resolve_by_name = enabled;
        self
    }

    pub fn build(&self, elements: &[CodeElement]) -> Result<BuildOutput> {
        for (i, element) in elements.iter().enumerate() {
            element.validate(i)?;
        }

        let mut graph = DependencyGraph::new();
        for element in elements {
            graph.upsert_node(node_from_element(element));
        }

        let resolver = Resolver::new(elements);
        let mut unresolved = Vec::new();

        for element in elements {
            let declared = [
                (EdgeKind::Calls, &element.calls),
                (EdgeKind::Imports, &element.imports),
                (EdgeKind::DependsOn, &element.depends_on),
            ];
            for (kind, references) in declared {
                for reference in references {
                    match resolver.resolve(element, reference, &kind, self.resolve_by_name) {
                        Some(target) => {
                            graph.add_edge(GraphEdge::new(
                                element.id.clone(),
                                target,
                                kind.clone(),
                            ))?;
                        }
                        None => {
                            tracing::debug!(
                                source = %element.id,
                                reference = %reference,
                                kind = %kind,
                                "unresolved reference"
                            );
                            unresolved.push(UnresolvedReference {
                                source: element.id.clone(),
                                reference: reference.clone(),
                                kind: kind.clone(),
                            });
                        }
                    }
                }
            }
        }

        graph.validate()?;
        Ok(BuildOutput { graph, unresolved })
    }
}

fn node_from_element(element: &CodeElement) -> GraphNode {
    let mut metadata = element.metadata.clone().unwrap_or_default();
    if let Some(name) = &element.name {
        metadata.name = Some(name.clone());
    }
    GraphNode {
        id: element.id.clone(),
        kind: element.kind.clone(),
        file: element.file.clone(),
        line: element.line,
        metadata: (!metadata.is_empty()).then_some(metadata),
    }
}

/// Lookup tables for reference resolution, built once per build.
struct Resolver<'a> {
    ids: HashSet<&'a str>,
    by_name: HashMap<&'a str, Vec<&'a str>>,
    by_file: Vec<(String, &'a str, bool)>,
}

impl<'a> Resolver<'a> {
    /// Duplicate ids are indexed by their last occurrence, matching the
    /// node the graph keeps.
    fn new(elements: &'a [CodeElement]) -> Self {
        let last: HashMap<&str, usize> = elements
            .iter()
            .enumerate()
            .map(|(i, element)| (element.id.as_str(), i))
            .collect();
        let mut by_name: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut by_file = Vec::new();

        for (i, element) in elements.iter().enumerate() {
            if last.get(element.id.as_str()) != Some(&i) {
                continue;
            }
            let name = element
                .name
                .as_deref()
                .unwrap_or_else(|| short_name_of(&element.id));
            by_name.entry(name).or_default().push(element.id.as_str());

            if let Some(file) = &element.file {
                by_file.push((
                    strip_extension(file).to_string(),
                    element.id.as_str(),
                    element.kind == NodeKind::Module,
                ));
            }
        }

        Self {
            ids: last.into_keys().collect(),
            by_name,
            by_file,
        }
    }

    fn resolve(
        &self,
        from: &CodeElement,
        reference: &str,
        kind: &EdgeKind,
        by_name: bool,
    ) -> Option<String> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }
        if self.ids.contains(reference) {
            return Some(reference.to_string());
        }
        if let Some(file) = &from.file {
            let local = format!("{file}:{reference}");
            if self.ids.contains(local.as_str()) {
                return Some(local);
            }
        }
        if by_name && let Some(candidates) = self.by_name.get(reference) {
            return candidates.first().map(|id| (*id).to_string());
        }
        if *kind == EdgeKind::Imports {
            return self.resolve_module(reference);
        }
        None
    }

    /// Match an import specifier like `./utils/format.ts` against element files.
    fn resolve_module(&self, specifier: &str) -> Option<String> {
        let mut wanted = specifier;
        while let Some(rest) = wanted.strip_prefix("./") {
            wanted = rest;
        }
        let wanted = strip_extension(wanted);
        if wanted.is_empty() {
            return None;
        }
        let suffix = format!("/{wanted}");
        let matches = |file: &str| file == wanted || file.ends_with(&suffix);

        self.by_file
            .iter()
            .find(|(file, _, is_module)| *is_module && matches(file.as_str()))
            .or_else(|| self.by_file.iter().find(|(file, _, _)| matches(file.as_str())))
            .map(|(_, id, _)| (*id).to_string())
    }
}

fn strip_extension(path: &str) -> &str {
    match path.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.contains('/') => stem,
        _ => path,
    }
}
