//! Error types for medgraph-core.

use thiserror::Error;

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A node table whose metadata or rows break the intermediate schema.
///
/// Every check in [`crate::node_table::NodeTable::new`] has its own variant so
/// callers can tell a missing column apart from a wrong label.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("node table metadata is missing following fields: {0:?}")]
    MissingFields(Vec<String>),

    #[error("malformed node table metadata: {0}")]
    MalformedMeta(String),

    #[error("node table field '{0}' must not be empty")]
    EmptyField(&'static str),

    #[error("node table '{table}' sets a source column but '{field}' is missing")]
    IncompleteRelation { table: String, field: &'static str },

    #[error("name '{name}' in table '{table}' is not a valid identifier")]
    InvalidIdentifier { table: String, name: String },

    #[error("table '{table}' is missing required column '{column}'")]
    MissingColumn { table: String, column: String },

    #[error("table '{table}': found node label '{found}' but expected '{expected}'")]
    LabelMismatch {
        table: String,
        expected: String,
        found: String,
    },

    #[error("table '{table}': found unexpected node labels {unexpected:?}")]
    UnexpectedLabels {
        table: String,
        unexpected: Vec<String>,
    },

    #[error("table '{table}': declared node labels {missing:?} have no rows")]
    MissingLabels { table: String, missing: Vec<String> },

    #[error("row {row} has {found} values but the table has {expected} columns")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// Failure reported by an external record source or recognizer.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("record source unavailable: {0}")]
    Unavailable(String),

    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("failed to read record archive: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode record archive: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while extracting stage outputs.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaViolation),

    #[error("Pipe '{stage}' is set in request but required predecessor pipe '{predecessor}' is missing.")]
    MissingDependency { stage: String, predecessor: String },

    #[error("unknown pipe '{0}'")]
    UnknownStage(String),

    #[error("contract violation: {0}")]
    ContractViolation(String),

    #[error("pipe '{stage}' failed to fetch records: {source}")]
    Source {
        stage: String,
        #[source]
        source: SourceError,
    },

    #[error("invalid graph request: {0}")]
    Request(String),
}

impl Error {
    /// Wrap a collaborator failure with the stage that hit it.
    pub fn source(stage: impl Into<String>, source: SourceError) -> Self {
        Error::Source {
            stage: stage.into(),
            source,
        }
    }
}
