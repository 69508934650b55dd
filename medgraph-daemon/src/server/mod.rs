//! HTTP server for the medgraph daemon.
//!
//! Provides REST API for:
//! - Health checks
//! - Graph builds from a graph request
//! - Listing the search terms already in the graph

mod http;
pub mod state;

pub use http::create_router;
pub use state::AppState;
