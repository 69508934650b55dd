//! The four biomedical extraction stages.
//!
//! ```text
//! pubmed ──► ner ──► medGen ──► uniProt
//! papers     entities  genes     proteins
//! mesh/kw    UMLS      SNOMED
//!                      features
//! ```
//!
//! Each stage reads its upstream stage's tables and emits validated node
//! tables. Tables without rows are left out of the output.

pub mod medgen;
pub mod ner;
pub mod pubmed;
pub mod uniprot;

pub use medgen::{MedGenInput, MedGenStage};
pub use ner::{NerInput, NerStage};
pub use pubmed::{PubMedInput, PubMedStage};
pub use uniprot::{UniProtInput, UniProtStage};

use tracing::debug;

use crate::error::Result;
use crate::node_table::{NodeTable, NodeTableMeta};
use crate::pipe_output::PipeOutput;
use crate::table::Table;

pub const PAPER_TABLE: &str = "pubmedPaper";
pub const MESH_TABLE: &str = "meshTerms";
pub const KEYWORD_TABLE: &str = "keywords";
pub const ENTITY_TABLE: &str = "Entities";
pub const LINK_TABLE: &str = "UmlsLinks";
pub const GENE_TABLE: &str = "Gene";
pub const SNOMED_TABLE: &str = "SnomedConcept";
pub const FEATURE_TABLE: &str = "ClinicalFeature";
pub const PROTEIN_TABLE: &str = "Protein";

/// Validate a table and add it to `output`, unless it has no rows.
pub(crate) fn add_table(output: &mut PipeOutput, meta: NodeTableMeta, data: Table) -> Result<()> {
    if data.is_empty() {
        debug!(
            "Pipe '{}': table '{}' has no rows, skipping",
            output.pipe(),
            meta.table_name
        );
        return Ok(());
    }
    output.add(NodeTable::new(meta, data)?)
}

/// String cell of a table, empty when absent or not a string.
pub(crate) fn text_at<'a>(table: &'a Table, row: usize, column: &str) -> &'a str {
    table
        .value(row, column)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
}
