//! DuckDB-backed property graph.
//!
//! Nodes are keyed by (label, key property, key value) with their properties
//! stored as a JSON document; relationships reference both endpoint keys.
//! Every session execute runs in its own transaction.

use anyhow::Context;
use duckdb::{params, Connection};
use medgraph_core::{value_key, Record};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{sort_values, GraphStore, Statement, StoreError, StoreSession};

/// Current schema version.
pub const SCHEMA_VERSION: &str = "1.0.0";

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS graph_nodes (
    label VARCHAR NOT NULL,
    key_attr VARCHAR NOT NULL,
    key_value VARCHAR NOT NULL,
    properties VARCHAR NOT NULL,
    PRIMARY KEY (label, key_attr, key_value)
);

CREATE TABLE IF NOT EXISTS graph_relations (
    source_label VARCHAR NOT NULL,
    source_key_attr VARCHAR NOT NULL,
    source_key_value VARCHAR NOT NULL,
    rel_type VARCHAR NOT NULL,
    target_label VARCHAR NOT NULL,
    target_key_attr VARCHAR NOT NULL,
    target_key_value VARCHAR NOT NULL,
    PRIMARY KEY (source_label, source_key_attr, source_key_value, rel_type,
                 target_label, target_key_attr, target_key_value)
);

CREATE TABLE IF NOT EXISTS metadata (
    key VARCHAR PRIMARY KEY,
    value VARCHAR
);
"#;

/// Node and relationship counts.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub relation_count: usize,
    pub label_counts: HashMap<String, usize>,
}

/// Key of a stored node.
type NodeKey = (String, String, String);

pub struct DuckGraph {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl DuckGraph {
    /// Open or create a graph database file.
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {:?}", path))?;
        Self::init(conn, path.to_path_buf())
    }

    /// A throwaway in-memory database.
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::init(conn, PathBuf::from(":memory:"))
    }

    fn init(conn: Connection, path: PathBuf) -> anyhow::Result<Self> {
        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize schema")?;
        conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?)",
            params![SCHEMA_VERSION],
        )
        .context("Failed to set schema version")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire the connection, recovering from a poisoned lock.
    fn acquire_conn(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Recovering from poisoned database mutex");
                poisoned.into_inner()
            }
        }
    }

    pub fn stats(&self) -> Result<GraphStats, StoreError> {
        let conn = self.acquire_conn();
        let node_count: usize =
            conn.query_row("SELECT COUNT(*) FROM graph_nodes", [], |row| row.get(0))?;
        let relation_count: usize =
            conn.query_row("SELECT COUNT(*) FROM graph_relations", [], |row| row.get(0))?;

        let mut label_counts = HashMap::new();
        let mut stmt = conn.prepare("SELECT label, COUNT(*) FROM graph_nodes GROUP BY label")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let label: String = row.get(0)?;
            let count: usize = row.get(1)?;
            label_counts.insert(label, count);
        }

        Ok(GraphStats {
            node_count,
            relation_count,
            label_counts,
        })
    }

    /// Properties of one node, if it exists.
    pub fn node(&self, label: &str, key: &str, value: &Value) -> Result<Option<Record>, StoreError> {
        let conn = self.acquire_conn();
        load_properties(&conn, &(label.to_string(), key.to_string(), value_key(value)))
    }
}

fn load_properties(conn: &Connection, key: &NodeKey) -> Result<Option<Record>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT properties FROM graph_nodes WHERE label = ? AND key_attr = ? AND key_value = ?",
    )?;
    let mut rows = stmt.query(params![key.0, key.1, key.2])?;
    match rows.next()? {
        Some(row) => {
            let json: String = row.get(0)?;
            Ok(Some(serde_json::from_str(&json)?))
        }
        None => Ok(None),
    }
}

/// Every node of `label` as (key, properties).
fn nodes_with_label(conn: &Connection, label: &str) -> Result<Vec<(NodeKey, Record)>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT key_attr, key_value, properties FROM graph_nodes WHERE label = ? ORDER BY key_value",
    )?;
    let mut rows = stmt.query(params![label])?;
    let mut nodes = Vec::new();
    while let Some(row) = rows.next()? {
        let key_attr: String = row.get(0)?;
        let key_value: String = row.get(1)?;
        let json: String = row.get(2)?;
        let properties: Record = serde_json::from_str(&json)?;
        nodes.push(((label.to_string(), key_attr, key_value), properties));
    }
    Ok(nodes)
}

/// Index nodes of `label` by the plain-text value of `property`.
fn index_by(
    conn: &Connection,
    label: &str,
    property: &str,
) -> Result<HashMap<String, Vec<NodeKey>>, StoreError> {
    let mut index: HashMap<String, Vec<NodeKey>> = HashMap::new();
    for (key, properties) in nodes_with_label(conn, label)? {
        if let Some(value) = properties.get(property) {
            index.entry(value_key(value)).or_default().push(key);
        }
    }
    Ok(index)
}

fn execute_in(conn: &Connection, statement: &Statement, rows: &[Record]) -> Result<u64, StoreError> {
    match statement {
        Statement::DeleteAll => {
            conn.execute("DELETE FROM graph_relations", [])?;
            let removed = conn.execute("DELETE FROM graph_nodes", [])?;
            Ok(removed as u64)
        }
        Statement::MergeNodes {
            label,
            key,
            properties,
        } => {
            for row in rows {
                let key_value = match row.get(key) {
                    Some(v) if !v.is_null() => v,
                    _ => {
                        return Err(StoreError::NullKey {
                            label: label.clone(),
                            key: key.clone(),
                        })
                    }
                };
                let node_key = (label.clone(), key.clone(), value_key(key_value));
                let mut merged = load_properties(conn, &node_key)?.unwrap_or_default();
                merged.insert(key.clone(), key_value.clone());
                for property in properties {
                    match row.get(property) {
                        Some(Value::Null) | None => {
                            merged.remove(property);
                        }
                        Some(value) => {
                            merged.insert(property.clone(), value.clone());
                        }
                    }
                }
                conn.execute(
                    "INSERT OR REPLACE INTO graph_nodes (label, key_attr, key_value, properties) \
                     VALUES (?, ?, ?, ?)",
                    params![node_key.0, node_key.1, node_key.2, serde_json::to_string(&merged)?],
                )?;
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
            let anchors = index_by(conn, anchor_label, anchor_key)?;
            let nodes = index_by(conn, node_label, node_key)?;
            let mut insert = conn.prepare(
                "INSERT OR IGNORE INTO graph_relations VALUES (?, ?, ?, ?, ?, ?, ?)",
            )?;
            let mut total = 0;
            for row in rows {
                let (Some(anchor_value), Some(node_value)) =
                    (row.get(anchor_column), row.get(node_key))
                else {
                    continue;
                };
                let (Some(sources), Some(targets)) = (
                    anchors.get(&value_key(anchor_value)),
                    nodes.get(&value_key(node_value)),
                ) else {
                    continue;
                };
                for source in sources {
                    for target in targets {
                        insert.execute(params![
                            source.0, source.1, source.2, relation, target.0, target.1, target.2
                        ])?;
                        total += 1;
                    }
                }
            }
            Ok(total)
        }
    }
}

struct DuckSession<'a> {
    conn: MutexGuard<'a, Connection>,
}

impl StoreSession for DuckSession<'_> {
    fn execute(&mut self, statement: &Statement, rows: &[Record]) -> Result<u64, StoreError> {
        let tx = self.conn.transaction()?;
        let count = execute_in(&tx, statement, rows)?;
        tx.commit()?;
        Ok(count)
    }
}

impl GraphStore for DuckGraph {
    fn backend(&self) -> &'static str {
        "duckdb"
    }

    fn session(&self) -> Result<Box<dyn StoreSession + '_>, StoreError> {
        Ok(Box::new(DuckSession {
            conn: self.acquire_conn(),
        }))
    }

    fn anchor_values(&self, label: &str, key: &str) -> Result<Vec<Value>, StoreError> {
        let conn = self.acquire_conn();
        let mut values: Vec<Value> = nodes_with_label(&conn, label)?
            .into_iter()
            .filter_map(|(_, mut properties)| properties.remove(key))
            .collect();
        sort_values(&mut values);
        Ok(values)
    }
}
