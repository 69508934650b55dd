//! Graph build.
//!
//! Orchestrates:
//! 1. Checking the requested stages against the stage hierarchy
//! 2. Running the extraction stages in order
//! 3. Materializing their node tables in batches against a graph store

mod batch;
mod materializer;
mod pipeline;

pub use batch::{insert_batched, BatchError, UploadSummary, DEFAULT_BATCH_SIZE};
pub use materializer::{
    Anchor, BuildError, GraphMaterializer, MaterializeReport, TableReport, DEFAULT_RELATION,
};
pub use pipeline::{BuildPipeline, BuildResult, Sources, DEFAULT_MAX_RECORDS};
