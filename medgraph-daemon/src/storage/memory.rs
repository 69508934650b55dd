//! In-memory property graph backed by petgraph.

use medgraph_core::{value_key, Record};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{sort_values, GraphStore, Statement, StoreError, StoreSession};

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryNode {
    pub label: String,
    pub properties: Record,
}

#[derive(Debug, Default)]
struct PropertyGraph {
    graph: DiGraph<MemoryNode, String>,
    /// (label, key property, key value) → node.
    keys: HashMap<(String, String, String), NodeIndex>,
}

impl PropertyGraph {
    fn merge_node(&mut self, label: &str, key: &str, properties: &[String], row: &Record) -> Result<(), StoreError> {
        let key_value = match row.get(key) {
            Some(v) if !v.is_null() => v,
            _ => {
                return Err(StoreError::NullKey {
                    label: label.to_string(),
                    key: key.to_string(),
                })
            }
        };
        let index_key = (label.to_string(), key.to_string(), value_key(key_value));
        let idx = match self.keys.get(&index_key) {
            Some(&idx) => idx,
            None => {
                let idx = self.graph.add_node(MemoryNode {
                    label: label.to_string(),
                    properties: Record::new(),
                });
                self.keys.insert(index_key, idx);
                idx
            }
        };
        let node = &mut self.graph[idx];
        node.properties.insert(key.to_string(), key_value.clone());
        for property in properties {
            match row.get(property) {
                Some(Value::Null) | None => {
                    node.properties.remove(property);
                }
                Some(value) => {
                    node.properties.insert(property.clone(), value.clone());
                }
            }
        }
        Ok(())
    }

    /// Nodes of `label` whose `key` equals `value` in plain-text form, the
    /// same comparison merges use. Merge keys resolve through the key index;
    /// any other property falls back to a scan.
    fn matching(&self, label: &str, key: &str, value: &Value) -> Vec<NodeIndex> {
        let wanted = value_key(value);
        let index_key = (label.to_string(), key.to_string(), wanted);
        if let Some(&idx) = self.keys.get(&index_key) {
            return vec![idx];
        }
        self.graph
            .node_indices()
            .filter(|&i| {
                let node = &self.graph[i];
                node.label == label
                    && node
                        .properties
                        .get(key)
                        .is_some_and(|v| value_key(v) == index_key.2)
            })
            .collect()
    }

    fn merge_edge(&mut self, from: NodeIndex, to: NodeIndex, relation: &str) {
        let exists = self
            .graph
            .edges_connecting(from, to)
            .any(|e| e.weight() == relation);
        if !exists {
            self.graph.add_edge(from, to, relation.to_string());
        }
    }

    fn execute(&mut self, statement: &Statement, rows: &[Record]) -> Result<u64, StoreError> {
        match statement {
            Statement::DeleteAll => {
                let removed = self.graph.node_count() as u64;
                self.graph.clear();
                self.keys.clear();
                Ok(removed)
            }
            Statement::MergeNodes {
                label,
                key,
                properties,
            } => {
                for row in rows {
                    self.merge_node(label, key, properties, row)?;
                }
                Ok(rows.len() as u64)
            }
            Statement::MergeRelations {
                anchor_label,
                anchor_key,
                anchor_column,
                node_label,
                node_key,
                relation,
            } => {
                let mut total = 0;
                for row in rows {
                    let (Some(anchor_value), Some(node_value)) =
                        (row.get(anchor_column), row.get(node_key))
                    else {
                        continue;
                    };
                    let anchors = self.matching(anchor_label, anchor_key, anchor_value);
                    let nodes = self.matching(node_label, node_key, node_value);
                    for &a in &anchors {
                        for &b in &nodes {
                            self.merge_edge(a, b, relation);
                            total += 1;
                        }
                    }
                }
                Ok(total)
            }
        }
    }
}

/// Property graph held in memory for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    inner: Mutex<PropertyGraph>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn acquire(&self) -> MutexGuard<'_, PropertyGraph> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Recovering from poisoned graph mutex");
                poisoned.into_inner()
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.acquire().graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.acquire().graph.edge_count()
    }

    /// Snapshot of every node carrying `label`.
    pub fn nodes_with_label(&self, label: &str) -> Vec<MemoryNode> {
        let inner = self.acquire();
        inner
            .graph
            .node_weights()
            .filter(|n| n.label == label)
            .cloned()
            .collect()
    }

    /// Whether some `from_label` node with `from_key = from_value` has a
    /// `relation` edge to some `to_label` node with `to_key = to_value`.
    pub fn has_relation(
        &self,
        (from_label, from_key, from_value): (&str, &str, &Value),
        relation: &str,
        (to_label, to_key, to_value): (&str, &str, &Value),
    ) -> bool {
        let inner = self.acquire();
        let targets = inner.matching(to_label, to_key, to_value);
        inner
            .matching(from_label, from_key, from_value)
            .into_iter()
            .any(|a| {
                inner
                    .graph
                    .edges(a)
                    .any(|e| e.weight() == relation && targets.contains(&e.target()))
            })
    }
}

struct MemorySession<'a> {
    graph: MutexGuard<'a, PropertyGraph>,
}

impl StoreSession for MemorySession<'_> {
    fn execute(&mut self, statement: &Statement, rows: &[Record]) -> Result<u64, StoreError> {
        self.graph.execute(statement, rows)
    }
}

impl GraphStore for MemoryGraph {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn session(&self) -> Result<Box<dyn StoreSession + '_>, StoreError> {
        Ok(Box::new(MemorySession {
            graph: self.acquire(),
        }))
    }

    fn anchor_values(&self, label: &str, key: &str) -> Result<Vec<Value>, StoreError> {
        let inner = self.acquire();
        let mut values: Vec<Value> = inner
            .graph
            .node_weights()
            .filter(|n| n.label == label)
            .filter_map(|n| n.properties.get(key).cloned())
            .collect();
        sort_values(&mut values);
        Ok(values)
    }
}
