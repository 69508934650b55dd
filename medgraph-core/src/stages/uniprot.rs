//! Protein stage: UniProt-style entries for the genes found by the concept stage.

use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use super::medgen::GENE_ID;
use super::{add_table, text_at, PROTEIN_TABLE};
use crate::error::{Error, Result};
use crate::labels::Labels;
use crate::node_table::{NodeTableMeta, LABEL_COLUMN, SOURCE_COLUMN};
use crate::pipe::Pipe;
use crate::pipe_output::PipeOutput;
use crate::sources::ProteinSource;
use crate::table::Table;

pub const PROTEIN_ID: &str = "accession";

/// Result slack on top of one entry per gene.
pub const EXTRA_RESULTS: usize = 5;

pub struct UniProtInput<'a> {
    pub genes: Option<&'a Table>,
}

pub struct UniProtStage {
    source: Arc<dyn ProteinSource>,
}

impl UniProtStage {
    pub fn new(source: Arc<dyn ProteinSource>) -> Self {
        Self { source }
    }
}

impl Pipe for UniProtStage {
    type Input<'a> = UniProtInput<'a>;

    fn name(&self) -> &str {
        "uniProt"
    }

    fn depends_on(&self) -> Option<&str> {
        Some("medGen")
    }

    fn produce(&self, input: UniProtInput<'_>) -> Result<PipeOutput> {
        let mut output = PipeOutput::new(self.name());
        let Some(gene_table) = input.genes else {
            warn!("Pipe 'uniProt': no gene table to look up");
            return Ok(output);
        };

        let mut genes: Vec<String> = Vec::new();
        for row in 0..gene_table.len() {
            let gene = text_at(gene_table, row, GENE_ID);
            if !gene.is_empty() && !genes.iter().any(|g| g == gene) {
                genes.push(gene.to_string());
            }
        }
        if genes.is_empty() {
            return Ok(output);
        }

        let proteins = self
            .source
            .proteins(&genes, genes.len() + EXTRA_RESULTS)
            .map_err(|e| Error::source(self.name(), e))?;
        info!("Fetched {} proteins for {} genes", proteins.len(), genes.len());

        let meta = NodeTableMeta::new(PROTEIN_TABLE, Labels::single("Protein"), PROTEIN_ID)
            .with_source(Labels::single("Gene"), GENE_ID, SOURCE_COLUMN)
            .with_attributes(["entry_name", "protein_names", "organism", "function"]);
        let mut data = Table::new([
            SOURCE_COLUMN,
            LABEL_COLUMN,
            PROTEIN_ID,
            "entry_name",
            "protein_names",
            "organism",
            "function",
        ]);
        for protein in &proteins {
            for gene in protein.genes.iter().filter(|g| genes.contains(g)) {
                data.push_row(vec![
                    json!(gene),
                    json!("Protein"),
                    json!(protein.accession),
                    json!(protein.entry_name),
                    json!(protein.protein_names),
                    json!(protein.organism),
                    json!(protein.function),
                ])?;
            }
        }
        add_table(&mut output, meta, data)?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::sources::ProteinRecord;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<(Vec<String>, usize)>>,
    }

    impl ProteinSource for Recording {
        fn proteins(
            &self,
            genes: &[String],
            limit: usize,
        ) -> std::result::Result<Vec<ProteinRecord>, SourceError> {
            self.calls.lock().unwrap().push((genes.to_vec(), limit));
            Ok(vec![ProteinRecord {
                accession: "P00439".to_string(),
                entry_name: "PH4H_HUMAN".to_string(),
                protein_names: "Phenylalanine-4-hydroxylase".to_string(),
                organism: "Homo sapiens".to_string(),
                function: String::new(),
                genes: vec!["PAH".to_string(), "PH4H".to_string()],
            }])
        }
    }

    fn genes() -> Table {
        Table::from_rows(
            [SOURCE_COLUMN, LABEL_COLUMN, GENE_ID],
            vec![
                vec![json!("C1"), json!("Gene"), json!("PAH")],
                vec![json!("C2"), json!("Gene"), json!("PAH")],
                vec![json!("C2"), json!("Gene"), json!("QDPR")],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_proteins_attach_to_requested_genes() {
        let source = Arc::new(Recording::default());
        let stage = UniProtStage::new(source.clone());
        let table = genes();
        let output = stage.run(UniProtInput { genes: Some(&table) }).unwrap();

        let calls = source.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, vec!["PAH", "QDPR"]);
        assert_eq!(calls[0].1, 2 + EXTRA_RESULTS);

        let proteins = output.get_table(PROTEIN_TABLE).unwrap();
        assert_eq!(proteins.len(), 1);
        assert_eq!(proteins.value(0, SOURCE_COLUMN), Some(&json!("PAH")));
        assert_eq!(proteins.value(0, PROTEIN_ID), Some(&json!("P00439")));
    }

    #[test]
    fn test_missing_gene_table() {
        let source = Arc::new(Recording::default());
        let output = UniProtStage::new(source.clone())
            .run(UniProtInput { genes: None })
            .unwrap();
        assert!(output.is_empty());
        assert!(source.calls.lock().unwrap().is_empty());
    }
}
