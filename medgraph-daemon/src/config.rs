//! Configuration loading from `medgraph.toml`.
//!
//! Every section is optional; missing values fall back to defaults and a file
//! that cannot be read or parsed is logged and ignored.
//!
//! # Example Configuration
//!
//! ```toml
//! [store]
//! backend = "neo4j"
//! uri = "http://localhost:7474"
//! database = "neo4j"
//! user = "neo4j"
//!
//! [build]
//! batch_size = 2000
//! max_records = 25
//!
//! [sources]
//! archive = "records.json"
//!
//! [server]
//! port = 9130
//! ```

use anyhow::Context;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::build::{Anchor, DEFAULT_BATCH_SIZE, DEFAULT_MAX_RECORDS};
use crate::storage::{DuckGraph, GraphStore, MemoryGraph, Neo4jConfig, Neo4jHttp};

/// Default config file name.
pub const CONFIG_FILE: &str = "medgraph.toml";

/// Environment variable overriding `[store].password`.
pub const PASSWORD_ENV: &str = "MEDGRAPH_NEO4J_PASSWORD";

#[derive(Debug, Deserialize, Default)]
pub struct MedGraphConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

/// Which graph store backs the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    #[default]
    DuckDb,
    Neo4j,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Memory => "memory",
            StoreBackend::DuckDb => "duckdb",
            StoreBackend::Neo4j => "neo4j",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "memory" => Some(StoreBackend::Memory),
            "duckdb" => Some(StoreBackend::DuckDb),
            "neo4j" => Some(StoreBackend::Neo4j),
            _ => None,
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// DuckDB database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    /// Neo4j HTTP base URL.
    #[serde(default = "default_neo4j_uri")]
    pub uri: String,

    #[serde(default = "default_neo4j_database")]
    pub database: String,

    #[serde(default = "default_neo4j_user")]
    pub user: String,

    /// Prefer setting `MEDGRAPH_NEO4J_PASSWORD` over storing it here.
    #[serde(default)]
    pub password: Option<String>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("medgraph.duckdb")
}

fn default_neo4j_uri() -> String {
    "http://localhost:7474".to_string()
}

fn default_neo4j_database() -> String {
    "neo4j".to_string()
}

fn default_neo4j_user() -> String {
    "neo4j".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_db_path(),
            uri: default_neo4j_uri(),
            database: default_neo4j_database(),
            user: default_neo4j_user(),
            password: None,
        }
    }
}

impl StoreConfig {
    /// Neo4j password, from the environment first.
    pub fn password(&self) -> String {
        std::env::var(PASSWORD_ENV)
            .ok()
            .or_else(|| self.password.clone())
            .unwrap_or_default()
    }

    /// Open the configured store.
    pub fn open(&self) -> anyhow::Result<Box<dyn GraphStore>> {
        Ok(match self.backend {
            StoreBackend::Memory => Box::new(MemoryGraph::new()),
            StoreBackend::DuckDb => Box::new(DuckGraph::open(&self.path)?),
            StoreBackend::Neo4j => Box::new(
                Neo4jHttp::new(Neo4jConfig {
                    uri: self.uri.clone(),
                    database: self.database.clone(),
                    user: self.user.clone(),
                    password: self.password(),
                })
                .context("Failed to create Neo4j client")?,
            ),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct BuildConfig {
    /// Rows per store request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Papers fetched when a request sets no `n_articles`.
    #[serde(default = "default_max_records")]
    pub max_records: usize,

    #[serde(default = "default_anchor_label")]
    pub anchor_label: String,

    #[serde(default = "default_anchor_key")]
    pub anchor_key: String,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_max_records() -> usize {
    DEFAULT_MAX_RECORDS
}

fn default_anchor_label() -> String {
    Anchor::default().label
}

fn default_anchor_key() -> String {
    Anchor::default().key
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_records: default_max_records(),
            anchor_label: default_anchor_label(),
            anchor_key: default_anchor_key(),
        }
    }
}

impl BuildConfig {
    pub fn anchor(&self) -> Anchor {
        Anchor {
            label: self.anchor_label.clone(),
            key: self.anchor_key.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct SourcesConfig {
    /// JSON record archive serving papers, entities, concepts and proteins.
    #[serde(default)]
    pub archive: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    9130
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

impl MedGraphConfig {
    /// Load `medgraph.toml` from `dir`.
    pub fn load(dir: &Path) -> Self {
        Self::load_file(&dir.join(CONFIG_FILE))
    }

    /// Load a config file, falling back to defaults if it is missing or bad.
    pub fn load_file(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse {}: {}", path.display(), e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read {}: {}", path.display(), e);
                }
            }
        }
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = MedGraphConfig::default();
        assert_eq!(config.store.backend, StoreBackend::DuckDb);
        assert_eq!(config.build.batch_size, 2000);
        assert_eq!(config.build.max_records, 10);
        assert_eq!(config.build.anchor(), Anchor::default());
        assert_eq!(config.server.port, 9130);
        assert!(config.sources.archive.is_none());
    }

    #[test]
    fn test_parse_partial_config() {
        let config: MedGraphConfig = toml::from_str(
            r#"
[store]
backend = "neo4j"
uri = "http://graph:7474"

[build]
batch_size = 500
"#,
        )
        .unwrap();
        assert_eq!(config.store.backend, StoreBackend::Neo4j);
        assert_eq!(config.store.uri, "http://graph:7474");
        assert_eq!(config.store.database, "neo4j");
        assert_eq!(config.build.batch_size, 500);
        assert_eq!(config.build.max_records, 10);
        assert_eq!(config.server.port, 9130);
    }

    #[test]
    fn test_bad_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join(CONFIG_FILE)).unwrap();
        writeln!(file, "[build\nbatch_size = ").unwrap();

        let config = MedGraphConfig::load(dir.path());
        assert_eq!(config.build.batch_size, DEFAULT_BATCH_SIZE);

        let missing = MedGraphConfig::load(&dir.path().join("nowhere"));
        assert_eq!(missing.store.backend, StoreBackend::DuckDb);
    }

    #[test]
    fn test_backend_names() {
        assert_eq!(StoreBackend::parse("DuckDB"), Some(StoreBackend::DuckDb));
        assert_eq!(StoreBackend::parse("sqlite"), None);
        assert_eq!(StoreBackend::Neo4j.to_string(), "neo4j");
    }

    #[test]
    fn test_memory_store_opens() {
        let config = StoreConfig {
            backend: StoreBackend::Memory,
            ..Default::default()
        };
        assert_eq!(config.open().unwrap().backend(), "memory");
    }
}
