//! Core types and persistence for the coderef dependency graph.
//!
//! Provides the graph data model ([`graph::DependencyGraph`]), element input,
//! graph construction with cycle detection, the forward/reverse
//! [`index::RelationshipIndex`], JSON export/import, and the
//! [`analyzer::Analyzer`] that owns the current graph snapshot.

pub mod analyzer;
pub mod builder;
pub mod config;
pub mod cycles;
pub mod element;
pub mod error;
pub mod graph;
pub mod index;
pub mod schema;
pub mod storage;
