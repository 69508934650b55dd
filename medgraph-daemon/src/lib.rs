//! medgraph daemon library.
//!
//! This library provides:
//! - Graph stores (in-memory, DuckDB, Neo4j over HTTP)
//! - The batched graph materializer and the build pipeline
//! - Configuration loading
//! - The HTTP API

pub mod build;
pub mod config;
pub mod server;
pub mod storage;
