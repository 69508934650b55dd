//! Batched statement execution.

use medgraph_core::Record;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

use crate::storage::{GraphStore, Statement, StoreError};

/// Rows sent per store request unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 2000;

/// Totals over all batches of one upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadSummary {
    /// Affected count reported by the store, summed over batches.
    pub total: u64,
    pub batches: usize,
    pub elapsed: Duration,
}

/// A batch failed. Batches before it were applied and stay applied.
#[derive(Debug, Error)]
#[error("batch {batch} failed after {} applied batches: {source}", .completed.batches)]
pub struct BatchError {
    /// Zero-based index of the failing batch.
    pub batch: usize,
    pub completed: UploadSummary,
    #[source]
    pub source: StoreError,
}

/// Execute `statement` over `rows` in chunks of `batch_size`.
///
/// Every chunk opens its own session, released before the next chunk starts.
/// The first failing chunk stops the upload.
pub fn insert_batched<S: GraphStore + ?Sized>(
    store: &S,
    statement: &Statement,
    rows: &[Record],
    batch_size: usize,
) -> Result<UploadSummary, BatchError> {
    let mut summary = UploadSummary::default();
    for (batch, chunk) in rows.chunks(batch_size.max(1)).enumerate() {
        let start = Instant::now();
        let result = store
            .session()
            .and_then(|mut session| session.execute(statement, chunk));
        let count = result.map_err(|source| BatchError {
            batch,
            completed: summary,
            source,
        })?;
        let took = start.elapsed();
        debug!(
            "Batch {}: {} rows, {} affected in {:?}",
            batch,
            chunk.len(),
            count,
            took
        );
        summary.total += count;
        summary.batches += 1;
        summary.elapsed += took;
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryGraph;
    use serde_json::json;

    fn rows(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| {
                let mut record = Record::new();
                record.insert("gene".to_string(), json!(format!("G{i}")));
                record
            })
            .collect()
    }

    fn statement() -> Statement {
        Statement::merge_anchor("Gene", "gene").unwrap()
    }

    #[test]
    fn test_five_rows_in_batches_of_two() {
        let graph = MemoryGraph::new();
        let summary = insert_batched(&graph, &statement(), &rows(5), 2).unwrap();
        assert_eq!(summary.batches, 3);
        assert_eq!(summary.total, 5);
        assert_eq!(graph.node_count(), 5);
    }

    #[test]
    fn test_no_rows_no_batches() {
        let graph = MemoryGraph::new();
        let summary = insert_batched(&graph, &statement(), &[], 2).unwrap();
        assert_eq!(summary, UploadSummary::default());
    }

    #[test]
    fn test_failure_keeps_earlier_batches() {
        let graph = MemoryGraph::new();
        let mut rows = rows(5);
        rows[3].insert("gene".to_string(), serde_json::Value::Null);

        let err = insert_batched(&graph, &statement(), &rows, 2).unwrap_err();
        assert_eq!(err.batch, 1);
        assert_eq!(err.completed.batches, 1);
        assert_eq!(err.completed.total, 2);
        assert!(matches!(err.source, StoreError::NullKey { .. }));
        // Row 2 ran before row 3 failed inside the same batch.
        assert_eq!(graph.node_count(), 3);
    }
}
