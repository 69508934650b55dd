//! Literature stage: papers, MeSH terms and keywords for a search term.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use super::{add_table, KEYWORD_TABLE, MESH_TABLE, PAPER_TABLE};
use crate::error::{Error, Result};
use crate::labels::Labels;
use crate::node_table::{NodeTableMeta, LABEL_COLUMN, SOURCE_COLUMN};
use crate::pipe::Pipe;
use crate::pipe_output::PipeOutput;
use crate::request::PubMedOptions;
use crate::sources::{title_case, LiteratureSource, PaperRecord};
use crate::table::Table;

pub const PAPER_ID: &str = "pubmedID";

pub struct PubMedInput<'a> {
    pub search_term: &'a str,
    pub max_records: usize,
    pub options: &'a PubMedOptions,
}

pub struct PubMedStage {
    source: Arc<dyn LiteratureSource>,
    anchor_label: String,
    anchor_key: String,
}

impl PubMedStage {
    pub fn new(source: Arc<dyn LiteratureSource>) -> Self {
        Self {
            source,
            anchor_label: "SearchTerm".to_string(),
            anchor_key: "label".to_string(),
        }
    }

    /// Attach papers to a different anchor node type.
    pub fn with_anchor(mut self, label: impl Into<String>, key: impl Into<String>) -> Self {
        self.anchor_label = label.into();
        self.anchor_key = key.into();
        self
    }

    fn paper_table(&self, term: &str, papers: &[PaperRecord]) -> Result<(NodeTableMeta, Table)> {
        let meta = NodeTableMeta::new(PAPER_TABLE, Labels::single("Paper"), PAPER_ID)
            .with_source(
                Labels::single(self.anchor_label.clone()),
                self.anchor_key.clone(),
                SOURCE_COLUMN,
            )
            .with_attributes(["title", "abstract"]);
        let mut data = Table::new([SOURCE_COLUMN, LABEL_COLUMN, PAPER_ID, "title", "abstract"]);
        for paper in papers {
            data.push_row(vec![
                json!(term),
                json!("Paper"),
                json!(paper.uri()),
                json!(paper.title),
                json!(paper.abstract_text()),
            ])?;
        }
        Ok((meta, data))
    }
}

/// Papers → one row per (paper, term), terms title-cased.
fn term_table(
    name: &str,
    label: &str,
    id: &str,
    papers: &[PaperRecord],
    terms: impl Fn(&PaperRecord) -> &[String],
) -> Result<(NodeTableMeta, Table)> {
    let meta = NodeTableMeta::new(name, Labels::single(label), id).with_source(
        Labels::single("Paper"),
        PAPER_ID,
        SOURCE_COLUMN,
    );
    let mut data = Table::new([SOURCE_COLUMN, LABEL_COLUMN, id]);
    for paper in papers {
        let uri = Value::String(paper.uri());
        for term in terms(paper) {
            data.push_row(vec![uri.clone(), json!(label), json!(title_case(term))])?;
        }
    }
    Ok((meta, data))
}

impl Pipe for PubMedStage {
    type Input<'a> = PubMedInput<'a>;

    fn name(&self) -> &str {
        "pubmed"
    }

    fn depends_on(&self) -> Option<&str> {
        None
    }

    fn produce(&self, input: PubMedInput<'_>) -> Result<PipeOutput> {
        let papers = self
            .source
            .search(input.search_term, input.max_records)
            .map_err(|e| Error::source(self.name(), e))?;
        info!(
            "Fetched {} papers for '{}'",
            papers.len(),
            input.search_term
        );

        let mut output = PipeOutput::new(self.name());
        let (meta, data) = self.paper_table(input.search_term, &papers)?;
        add_table(&mut output, meta, data)?;

        if input.options.mesh_terms {
            let (meta, data) = term_table(MESH_TABLE, "MeshTerm", "term", &papers, |p| p.mesh_terms.as_slice())?;
            add_table(&mut output, meta, data)?;
        }
        if input.options.keywords {
            let (meta, data) = term_table(KEYWORD_TABLE, "Keyword", "keyword", &papers, |p| p.keywords.as_slice())?;
            add_table(&mut output, meta, data)?;
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::sources::RecordArchive;

    fn stage() -> PubMedStage {
        let archive: RecordArchive = serde_json::from_value(json!({
            "papers": [
                {"pmid": "1", "title": "PKU in adults", "abstract_sections": ["PKU", "outcome."],
                 "mesh_terms": ["phenylketonurias", "ADULT"], "keywords": ["diet"]},
                {"pmid": "2", "title": "PKU screening", "mesh_terms": ["phenylketonurias"]}
            ]
        }))
        .unwrap();
        PubMedStage::new(Arc::new(archive))
    }

    #[test]
    fn test_paper_table_attaches_to_search_term() {
        let options = PubMedOptions::default();
        let output = stage()
            .run(PubMedInput {
                search_term: "PKU",
                max_records: 10,
                options: &options,
            })
            .unwrap();

        assert_eq!(output.len(), 1);
        let papers = output.node_table(PAPER_TABLE).unwrap();
        assert_eq!(papers.data().len(), 2);
        assert_eq!(papers.data().value(0, PAPER_ID), Some(&json!("pubmed~1")));
        assert_eq!(papers.data().value(0, "abstract"), Some(&json!("PKU outcome.")));
        assert_eq!(papers.data().value(1, SOURCE_COLUMN), Some(&json!("PKU")));
        let relation = papers.meta().relation().unwrap();
        assert_eq!(relation.anchor_labels, &Labels::single("SearchTerm"));
        assert_eq!(relation.anchor_attr, "label");
    }

    #[test]
    fn test_optional_term_tables() {
        let options = PubMedOptions {
            mesh_terms: true,
            keywords: true,
        };
        let output = stage()
            .run(PubMedInput {
                search_term: "PKU",
                max_records: 10,
                options: &options,
            })
            .unwrap();

        let mesh = output.get_table(MESH_TABLE).unwrap();
        assert_eq!(mesh.len(), 3);
        assert_eq!(mesh.value(1, "term"), Some(&json!("Adult")));
        assert_eq!(mesh.value(2, SOURCE_COLUMN), Some(&json!("pubmed~2")));

        let keywords = output.get_table(KEYWORD_TABLE).unwrap();
        assert_eq!(keywords.len(), 1);
        assert_eq!(keywords.value(0, "keyword"), Some(&json!("Diet")));
    }

    #[test]
    fn test_no_papers_gives_empty_output() {
        let options = PubMedOptions::default();
        let output = stage()
            .run(PubMedInput {
                search_term: "cystic fibrosis",
                max_records: 10,
                options: &options,
            })
            .unwrap();
        assert!(output.is_empty());
    }

    struct Offline;

    impl LiteratureSource for Offline {
        fn search(&self, _term: &str, _max: usize) -> std::result::Result<Vec<PaperRecord>, SourceError> {
            Err(SourceError::Unavailable("no network".to_string()))
        }
    }

    #[test]
    fn test_source_failure_names_stage() {
        let options = PubMedOptions::default();
        let err = PubMedStage::new(Arc::new(Offline))
            .run(PubMedInput {
                search_term: "PKU",
                max_records: 1,
                options: &options,
            })
            .unwrap_err();
        assert!(matches!(err, Error::Source { ref stage, .. } if stage == "pubmed"));
    }
}
