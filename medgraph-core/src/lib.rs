//! medgraph-core: the intermediate schema and extraction side of medgraph.
//!
//! Extraction stages turn records from literature, entity-recognition, concept
//! and protein sources into [`NodeTable`]s, bundled per stage in a
//! [`PipeOutput`]. The [`StageHierarchy`] decides which stage sets may run
//! together. Writing the tables to a graph store lives in `medgraph-daemon`.

pub mod error;
pub mod hierarchy;
pub mod labels;
pub mod node_table;
pub mod pipe;
pub mod pipe_output;
pub mod request;
pub mod sources;
pub mod stages;
pub mod table;

pub use error::{Error, Result, SchemaViolation, SourceError};
pub use hierarchy::{StageHierarchy, PIPE_HIERARCHY};
pub use labels::{is_identifier, Labels};
pub use node_table::{NodeTable, NodeTableMeta, Relation, LABEL_COLUMN, SOURCE_COLUMN};
pub use pipe::Pipe;
pub use pipe_output::PipeOutput;
pub use request::GraphRequest;
pub use table::{value_key, Record, Table};
