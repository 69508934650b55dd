//! The bundle of node tables one stage produces.

use crate::error::{Error, Result};
use crate::node_table::NodeTable;
use crate::table::Table;

/// Ordered node tables produced by one extraction stage.
///
/// Order is preserved: tables uploaded later may attach to nodes created by
/// tables uploaded earlier.
#[derive(Debug, Clone, PartialEq)]
pub struct PipeOutput {
    pipe: String,
    node_tables: Vec<NodeTable>,
}

impl PipeOutput {
    pub fn new(pipe: impl Into<String>) -> Self {
        Self {
            pipe: pipe.into(),
            node_tables: Vec::new(),
        }
    }

    /// Name of the producing stage.
    pub fn pipe(&self) -> &str {
        &self.pipe
    }

    /// Append a table. Table names must be unique within one output.
    pub fn add(&mut self, node_table: NodeTable) -> Result<()> {
        if self.node_table(node_table.name()).is_some() {
            return Err(Error::ContractViolation(format!(
                "pipe '{}' already holds a table named '{}'",
                self.pipe,
                node_table.name()
            )));
        }
        self.node_tables.push(node_table);
        Ok(())
    }

    /// Row data of the named table, or `None` if this output has no such table.
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.node_table(name).map(NodeTable::data)
    }

    pub fn node_table(&self, name: &str) -> Option<&NodeTable> {
        self.node_tables.iter().find(|t| t.name() == name)
    }

    pub fn node_tables(&self) -> &[NodeTable] {
        &self.node_tables
    }

    pub fn len(&self) -> usize {
        self.node_tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_tables.is_empty()
    }
}

impl<'a> IntoIterator for &'a PipeOutput {
    type Item = &'a NodeTable;
    type IntoIter = std::slice::Iter<'a, NodeTable>;

    fn into_iter(self) -> Self::IntoIter {
        self.node_tables.iter()
    }
}
