//! Entity recognition stage: entity mentions per paper and their UMLS links.

use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use super::pubmed::PAPER_ID;
use super::{add_table, text_at, ENTITY_TABLE, LINK_TABLE};
use crate::error::Result;
use crate::labels::Labels;
use crate::node_table::{NodeTableMeta, LABEL_COLUMN, SOURCE_COLUMN};
use crate::pipe::Pipe;
use crate::pipe_output::PipeOutput;
use crate::request::NerOptions;
use crate::sources::{Entity, EntityRecognizer};
use crate::table::Table;

pub const ENTITY_ID: &str = "text";
pub const CONCEPT_ID: &str = "CUI";
pub const SCORE_COLUMN: &str = "kb_score";

pub struct NerInput<'a> {
    /// The literature stage's paper table, if it produced one.
    pub papers: Option<&'a Table>,
    pub options: &'a NerOptions,
}

pub struct NerStage {
    recognizer: Arc<dyn EntityRecognizer>,
}

impl NerStage {
    pub fn new(recognizer: Arc<dyn EntityRecognizer>) -> Self {
        Self { recognizer }
    }

    fn link_table(&self, entities: &[Entity], categories: &Labels) -> Result<(NodeTableMeta, Table)> {
        let meta = NodeTableMeta::new(LINK_TABLE, Labels::single("UMLS"), CONCEPT_ID)
            .with_source(categories.clone(), ENTITY_ID, SOURCE_COLUMN)
            .with_attributes(["name", "definition"]);
        let mut data = Table::new([
            SOURCE_COLUMN,
            LABEL_COLUMN,
            CONCEPT_ID,
            "name",
            "definition",
            SCORE_COLUMN,
        ]);
        for entity in entities {
            for link in self.recognizer.link(entity) {
                data.push_row(vec![
                    json!(entity.text),
                    json!("UMLS"),
                    json!(link.cui),
                    json!(link.name),
                    json!(link.definition),
                    json!(link.score),
                ])?;
            }
        }
        Ok((meta, data))
    }
}

impl Pipe for NerStage {
    type Input<'a> = NerInput<'a>;

    fn name(&self) -> &str {
        "ner"
    }

    fn depends_on(&self) -> Option<&str> {
        Some("pubmed")
    }

    fn produce(&self, input: NerInput<'_>) -> Result<PipeOutput> {
        let mut output = PipeOutput::new(self.name());
        let Some(papers) = input.papers else {
            warn!("Pipe 'ner': no paper table to process");
            return Ok(output);
        };

        let mut data = Table::new([SOURCE_COLUMN, LABEL_COLUMN, ENTITY_ID]);
        let mut categories: Vec<String> = Vec::new();
        let mut distinct: Vec<Entity> = Vec::new();
        let mut seen: HashSet<Entity> = HashSet::new();

        for row in 0..papers.len() {
            let paper_id = text_at(papers, row, PAPER_ID);
            let text = text_at(papers, row, "abstract");
            if text.is_empty() {
                continue;
            }
            let mut found = self.recognizer.recognize(text);
            let mut in_paper = HashSet::new();
            found.retain(|e| in_paper.insert(e.clone()));

            for entity in found {
                if !categories.contains(&entity.category) {
                    categories.push(entity.category.clone());
                }
                data.push_row(vec![json!(paper_id), json!(entity.category), json!(entity.text)])?;
                if seen.insert(entity.clone()) {
                    distinct.push(entity);
                }
            }
        }
        info!(
            "Recognized {} distinct entities in {} papers",
            distinct.len(),
            papers.len()
        );
        if distinct.is_empty() {
            return Ok(output);
        }

        let categories = Labels::multiple(categories);
        let meta = NodeTableMeta::new(ENTITY_TABLE, categories.clone(), ENTITY_ID).with_source(
            Labels::single("Paper"),
            PAPER_ID,
            SOURCE_COLUMN,
        );
        add_table(&mut output, meta, data)?;

        if input.options.entity_links {
            let (meta, data) = self.link_table(&distinct, &categories)?;
            add_table(&mut output, meta, data)?;
        }
        Ok(output)
    }
}
