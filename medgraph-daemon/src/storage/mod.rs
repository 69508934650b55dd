//! Property-graph stores the materializer writes to.
//!
//! Three backends share one interface:
//! - [`MemoryGraph`]: petgraph property graph, for tests and dry runs
//! - [`DuckGraph`]: DuckDB-backed property graph on local disk
//! - [`Neo4jHttp`]: Neo4j transactional HTTP endpoint, Cypher templates
//!
//! Writes go through a [`StoreSession`] acquired per batch and released when
//! dropped.

mod duck;
mod memory;
mod neo4j;
mod statement;

pub use duck::{DuckGraph, GraphStats};
pub use memory::MemoryGraph;
pub use neo4j::{Neo4jConfig, Neo4jHttp};
pub use statement::Statement;

use medgraph_core::Record;
use serde_json::Value;
use thiserror::Error;

/// Errors raised by graph stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("refusing to build statement: {0}")]
    Template(String),

    #[error("cannot merge {label} node with missing or null '{key}'")]
    NullKey { label: String, key: String },

    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Neo4j error {code}: {message}")]
    Neo4j { code: String, message: String },

    #[error("unexpected store response: {0}")]
    Response(String),

    #[error("failed to encode properties: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A handle to a property-graph store.
pub trait GraphStore: Send + Sync {
    /// Short backend name for logs (`memory`, `duckdb`, `neo4j`).
    fn backend(&self) -> &'static str;

    /// Open a session. The session is released when dropped.
    fn session(&self) -> Result<Box<dyn StoreSession + '_>, StoreError>;

    /// Values of `key` over every node labelled `label`, sorted.
    fn anchor_values(&self, label: &str, key: &str) -> Result<Vec<Value>, StoreError>;
}

/// A scoped unit of access to a store.
pub trait StoreSession {
    /// Run `statement` once per bound row, returning the affected count.
    fn execute(&mut self, statement: &Statement, rows: &[Record]) -> Result<u64, StoreError>;
}

impl<T: GraphStore + ?Sized> GraphStore for Box<T> {
    fn backend(&self) -> &'static str {
        (**self).backend()
    }

    fn session(&self) -> Result<Box<dyn StoreSession + '_>, StoreError> {
        (**self).session()
    }

    fn anchor_values(&self, label: &str, key: &str) -> Result<Vec<Value>, StoreError> {
        (**self).anchor_values(label, key)
    }
}

impl<T: GraphStore + ?Sized> GraphStore for std::sync::Arc<T> {
    fn backend(&self) -> &'static str {
        (**self).backend()
    }

    fn session(&self) -> Result<Box<dyn StoreSession + '_>, StoreError> {
        (**self).session()
    }

    fn anchor_values(&self, label: &str, key: &str) -> Result<Vec<Value>, StoreError> {
        (**self).anchor_values(label, key)
    }
}

/// Check a label or property name before it is embedded into a statement.
pub(crate) fn checked(name: &str) -> Result<&str, StoreError> {
    if medgraph_core::is_identifier(name) {
        Ok(name)
    } else {
        Err(StoreError::Template(format!(
            "'{}' is not a valid identifier",
            name
        )))
    }
}

/// Sort JSON values by their plain-text form.
pub(crate) fn sort_values(values: &mut [Value]) {
    values.sort_by_key(medgraph_core::value_key);
}
