//! Shared application state for the server.

use std::sync::Arc;
use std::time::Instant;

use crate::build::BuildPipeline;
use crate::storage::GraphStore;

/// The pipeline the server builds with, over whichever store is configured.
pub type SharedPipeline = Arc<BuildPipeline<Box<dyn GraphStore>>>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: SharedPipeline,
    /// When the server started
    pub started: Instant,
}

impl AppState {
    pub fn new(pipeline: BuildPipeline<Box<dyn GraphStore>>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            started: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}
