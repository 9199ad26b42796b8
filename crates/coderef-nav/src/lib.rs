//! Navigation over coderef dependency graphs.
//!
//! Provides bounded multi-hop traversal with result classification, shortest
//! and all-paths search, and a query executor that caches responses per graph
//! generation.

pub mod cache;
pub mod paths;
pub mod query;
pub mod suggest;
pub mod traversal;

pub use query::{QueryExecutor, QueryRequest, QueryResponse, QueryType};
pub use traversal::{MultiHopResult, MultiHopTraversal, TraversalQuery};
