//! Neo4j over the transactional HTTP endpoint.
//!
//! Each execute is one `POST /db/{database}/tx/commit` carrying the rendered
//! Cypher template and the batch rows as the `$rows` parameter.

use medgraph_core::Record;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{checked, sort_values, GraphStore, Statement, StoreError, StoreSession};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neo4jConfig {
    /// Base URL, e.g. `http://localhost:7474`.
    pub uri: String,
    pub database: String,
    pub user: String,
    pub password: String,
}

#[derive(Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<TxResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Deserialize)]
struct TxResult {
    #[serde(default)]
    data: Vec<TxRow>,
}

#[derive(Deserialize)]
struct TxRow {
    row: Vec<Value>,
}

#[derive(Deserialize)]
struct TxError {
    code: String,
    message: String,
}

pub struct Neo4jHttp {
    client: Client,
    config: Neo4jConfig,
}

impl Neo4jHttp {
    pub fn new(config: Neo4jConfig) -> Result<Self, StoreError> {
        let client = Client::builder().build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/db/{}/tx/commit",
            self.config.uri.trim_end_matches('/'),
            self.config.database
        )
    }

    /// Run one Cypher statement and return the rows of its first result.
    fn run(&self, cypher: &str, parameters: Value) -> Result<Vec<Vec<Value>>, StoreError> {
        debug!("Cypher: {}", cypher);
        let body = json!({
            "statements": [{"statement": cypher, "parameters": parameters}]
        });
        let response: TxResponse = self
            .client
            .post(self.endpoint())
            .basic_auth(&self.config.user, Some(&self.config.password))
            .json(&body)
            .send()?
            .error_for_status()?
            .json()?;

        if let Some(error) = response.errors.into_iter().next() {
            return Err(StoreError::Neo4j {
                code: error.code,
                message: error.message,
            });
        }
        Ok(response
            .results
            .into_iter()
            .next()
            .map(|r| r.data.into_iter().map(|d| d.row).collect())
            .unwrap_or_default())
    }
}

/// The single `total` column of a write statement.
fn total(rows: &[Vec<Value>]) -> Result<u64, StoreError> {
    match rows.first().and_then(|r| r.first()) {
        Some(value) => value
            .as_u64()
            .ok_or_else(|| StoreError::Response(format!("expected a count, got {}", value))),
        None => Ok(0),
    }
}

struct Neo4jSession<'a> {
    store: &'a Neo4jHttp,
}

impl StoreSession for Neo4jSession<'_> {
    fn execute(&mut self, statement: &Statement, rows: &[Record]) -> Result<u64, StoreError> {
        let result = self
            .store
            .run(&statement.to_cypher(), json!({ "rows": rows }))?;
        total(&result)
    }
}

impl GraphStore for Neo4jHttp {
    fn backend(&self) -> &'static str {
        "neo4j"
    }

    fn session(&self) -> Result<Box<dyn StoreSession + '_>, StoreError> {
        Ok(Box::new(Neo4jSession { store: self }))
    }

    fn anchor_values(&self, label: &str, key: &str) -> Result<Vec<Value>, StoreError> {
        let cypher = format!(
            "MATCH (n:{}) RETURN n.{} AS value",
            checked(label)?,
            checked(key)?
        );
        let mut values: Vec<Value> = self
            .run(&cypher, json!({}))?
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .filter(|v| !v.is_null())
            .collect();
        sort_values(&mut values);
        Ok(values)
    }
}
