//! Graph materializer: node tables → batched upserts.
//!
//! For one build:
//! 1. optionally delete the whole graph
//! 2. merge the anchor node
//! 3. for every table of every stage output, in order: merge its nodes per
//!    label, then merge its anchor relations per (node label, anchor label)

use medgraph_core::{NodeTable, PipeOutput, Record};
use serde::Serialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::info;

use super::batch::{insert_batched, BatchError, UploadSummary, DEFAULT_BATCH_SIZE};
use crate::storage::{GraphStore, Statement, StoreError};

/// Relationship type linking anchors to the nodes of a table.
pub const DEFAULT_RELATION: &str = "CONTAINS";

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Pipeline(#[from] medgraph_core::Error),

    #[error("upload of table '{table}' (label {label}) failed: {source}")]
    Upload {
        table: String,
        label: String,
        #[source]
        source: BatchError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The anchor node every build merges first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub label: String,
    pub key: String,
}

impl Default for Anchor {
    fn default() -> Self {
        Self {
            label: "SearchTerm".to_string(),
            key: "label".to_string(),
        }
    }
}

/// Upload totals of one node table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableReport {
    pub table: String,
    /// Rows merged as nodes, after per-label deduplication.
    pub nodes: u64,
    /// Relationships matched or merged. Zero when no anchor matched.
    pub relations: u64,
    pub batches: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MaterializeReport {
    pub tables: Vec<TableReport>,
    pub batches: usize,
    pub elapsed: Duration,
}

impl MaterializeReport {
    pub fn node_count(&self) -> u64 {
        self.tables.iter().map(|t| t.nodes).sum()
    }

    pub fn relation_count(&self) -> u64 {
        self.tables.iter().map(|t| t.relations).sum()
    }
}

pub struct GraphMaterializer<S> {
    store: S,
    anchor: Anchor,
    batch_size: usize,
    relation: String,
}

impl<S: GraphStore> GraphMaterializer<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            anchor: Anchor::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            relation: DEFAULT_RELATION.to_string(),
        }
    }

    pub fn with_anchor(mut self, anchor: Anchor) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn anchor(&self) -> &Anchor {
        &self.anchor
    }

    /// Existing anchor values, e.g. the search terms already in the graph.
    pub fn anchor_values(&self) -> Result<Vec<serde_json::Value>, StoreError> {
        self.store.anchor_values(&self.anchor.label, &self.anchor.key)
    }

    /// Write `outputs` to the store under the anchor `anchor_value`.
    pub fn build(
        &self,
        anchor_value: &str,
        outputs: &[PipeOutput],
        reset: bool,
    ) -> Result<MaterializeReport, BuildError> {
        let start = Instant::now();
        let mut report = MaterializeReport::default();

        if reset {
            let removed = self.store.session()?.execute(&Statement::DeleteAll, &[])?;
            info!("Reset graph: removed {} nodes", removed);
        }

        let anchor = Statement::merge_anchor(&self.anchor.label, &self.anchor.key)?;
        let mut row = Record::new();
        row.insert(self.anchor.key.clone(), anchor_value.into());
        self.store.session()?.execute(&anchor, &[row])?;

        for output in outputs {
            for table in output {
                let table_report = self.upload_table(table)?;
                info!(
                    "Uploaded '{}' from '{}': {} nodes, {} relations in {} batches",
                    table.name(),
                    output.pipe(),
                    table_report.nodes,
                    table_report.relations,
                    table_report.batches
                );
                report.batches += table_report.batches;
                report.tables.push(table_report);
            }
        }

        report.elapsed = start.elapsed();
        Ok(report)
    }

    fn upload_table(&self, table: &NodeTable) -> Result<TableReport, BuildError> {
        let mut report = TableReport {
            table: table.name().to_string(),
            ..Default::default()
        };
        let meta = table.meta();

        for label in meta.node_label.iter() {
            let statement = Statement::merge_nodes(meta, label)?;
            let rows = table
                .data()
                .records(&table.node_rows(label), &statement.bound_columns());
            let summary = self.upload(table, label, &statement, &rows)?;
            report.nodes += summary.total;
            report.batches += summary.batches;
        }

        let Some(relation) = meta.relation() else {
            return Ok(report);
        };
        for label in meta.node_label.iter() {
            let rows_for_label = table.relation_rows(label);
            for anchor_label in relation.anchor_labels.iter() {
                let statement =
                    Statement::merge_relations(meta, label, anchor_label, &self.relation)?;
                let rows = table
                    .data()
                    .records(&rows_for_label, &statement.bound_columns());
                let summary = self.upload(table, label, &statement, &rows)?;
                report.relations += summary.total;
                report.batches += summary.batches;
            }
        }
        Ok(report)
    }

    fn upload(
        &self,
        table: &NodeTable,
        label: &str,
        statement: &Statement,
        rows: &[Record],
    ) -> Result<UploadSummary, BuildError> {
        insert_batched(&self.store, statement, rows, self.batch_size).map_err(|source| {
            BuildError::Upload {
                table: table.name().to_string(),
                label: label.to_string(),
                source,
            }
        })
    }
}
