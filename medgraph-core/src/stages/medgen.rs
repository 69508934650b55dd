//! Concept stage: genes, SNOMED concepts and clinical features of the most
//! mentioned diseases.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::ner::{CONCEPT_ID, ENTITY_ID, SCORE_COLUMN};
use super::{add_table, text_at, FEATURE_TABLE, GENE_TABLE, SNOMED_TABLE};
use crate::error::{Error, Result};
use crate::labels::Labels;
use crate::node_table::{NodeTableMeta, LABEL_COLUMN, SOURCE_COLUMN};
use crate::pipe::Pipe;
use crate::pipe_output::PipeOutput;
use crate::request::MedGenOptions;
use crate::sources::{ConceptSource, ConceptSummary};
use crate::table::Table;

pub const GENE_ID: &str = "gene";

/// Most frequent disease entities considered.
pub const TOP_ENTITIES: usize = 5;
/// Concept ids kept per entity.
pub const LINKS_PER_ENTITY: usize = 3;
/// Links scoring at or below this are dropped.
pub const MIN_LINK_SCORE: f64 = 0.9;

pub struct MedGenInput<'a> {
    pub entities: Option<&'a Table>,
    pub links: Option<&'a Table>,
    pub options: &'a MedGenOptions,
}

pub struct MedGenStage {
    source: Arc<dyn ConceptSource>,
}

impl MedGenStage {
    pub fn new(source: Arc<dyn ConceptSource>) -> Self {
        Self { source }
    }
}

/// Concept ids to summarize: for each of the most mentioned `DISEASE`
/// entities, its best-scoring links.
pub fn select_concepts(entities: &Table, links: &Table) -> Vec<String> {
    let diseases = entities.rows_where(LABEL_COLUMN, &json!("DISEASE"));
    let mut cuis = Vec::new();

    for (text, _) in entities
        .value_counts(ENTITY_ID, &diseases)
        .into_iter()
        .take(TOP_ENTITIES)
    {
        let mut candidates: Vec<(f64, &str)> = links
            .rows_where(SOURCE_COLUMN, &text)
            .into_iter()
            .filter_map(|row| {
                let score = links.value(row, SCORE_COLUMN).and_then(Value::as_f64)?;
                (score > MIN_LINK_SCORE).then(|| (score, text_at(links, row, CONCEPT_ID)))
            })
            .collect();
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0));
        cuis.extend(
            candidates
                .into_iter()
                .take(LINKS_PER_ENTITY)
                .map(|(_, cui)| cui.to_string()),
        );
    }
    cuis
}

fn gene_table(summaries: &[ConceptSummary]) -> Result<(NodeTableMeta, Table)> {
    let meta = NodeTableMeta::new(GENE_TABLE, Labels::single("Gene"), GENE_ID).with_source(
        Labels::single("UMLS"),
        CONCEPT_ID,
        SOURCE_COLUMN,
    );
    let mut data = Table::new([SOURCE_COLUMN, LABEL_COLUMN, GENE_ID]);
    for summary in summaries {
        for gene in &summary.genes {
            data.push_row(vec![json!(summary.cui), json!("Gene"), json!(gene)])?;
        }
    }
    Ok((meta, data))
}

fn snomed_table(summaries: &[ConceptSummary]) -> Result<(NodeTableMeta, Table)> {
    let meta = NodeTableMeta::new(SNOMED_TABLE, Labels::single("SnomedConcept"), "SAUI")
        .with_source(Labels::single("UMLS"), CONCEPT_ID, SOURCE_COLUMN)
        .with_attributes(["snomed_text", "SCUI", "SAB"]);
    let mut data = Table::new([SOURCE_COLUMN, LABEL_COLUMN, "SAUI", "snomed_text", "SCUI", "SAB"]);
    for summary in summaries {
        for concept in &summary.snomed {
            data.push_row(vec![
                json!(summary.cui),
                json!("SnomedConcept"),
                json!(concept.saui),
                json!(concept.text),
                json!(concept.scui),
                json!(concept.sab),
            ])?;
        }
    }
    Ok((meta, data))
}

fn feature_table(summaries: &[ConceptSummary]) -> Result<(NodeTableMeta, Table)> {
    let meta = NodeTableMeta::new(FEATURE_TABLE, Labels::single("ClinicalFeature"), CONCEPT_ID)
        .with_source(Labels::single("UMLS"), CONCEPT_ID, SOURCE_COLUMN)
        .with_attributes(["feature_type", "name", "definition"]);
    let mut data = Table::new([
        SOURCE_COLUMN,
        LABEL_COLUMN,
        CONCEPT_ID,
        "feature_type",
        "name",
        "definition",
    ]);
    for summary in summaries {
        for feature in &summary.clinical_features {
            data.push_row(vec![
                json!(summary.cui),
                json!("ClinicalFeature"),
                json!(feature.cui),
                json!(feature.feature_type),
                json!(feature.name),
                json!(feature.definition),
            ])?;
        }
    }
    Ok((meta, data))
}

impl Pipe for MedGenStage {
    type Input<'a> = MedGenInput<'a>;

    fn name(&self) -> &str {
        "medGen"
    }

    fn depends_on(&self) -> Option<&str> {
        Some("ner")
    }

    fn produce(&self, input: MedGenInput<'_>) -> Result<PipeOutput> {
        let mut output = PipeOutput::new(self.name());
        let (Some(entities), Some(links)) = (input.entities, input.links) else {
            warn!("Pipe 'medGen': entity or link table missing, nothing to look up");
            return Ok(output);
        };

        let cuis = select_concepts(entities, links);
        debug!("Selected concepts {:?}", cuis);
        if cuis.is_empty() {
            return Ok(output);
        }
        let summaries = self
            .source
            .summaries(&cuis)
            .map_err(|e| Error::source(self.name(), e))?;
        info!("Fetched {} concept summaries", summaries.len());

        let (meta, data) = gene_table(&summaries)?;
        add_table(&mut output, meta, data)?;
        if input.options.snomed {
            let (meta, data) = snomed_table(&summaries)?;
            add_table(&mut output, meta, data)?;
        }
        if input.options.clinical_features {
            let (meta, data) = feature_table(&summaries)?;
            add_table(&mut output, meta, data)?;
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::RecordArchive;

    fn entities(texts: &[(&str, &str)]) -> Table {
        let rows = texts
            .iter()
            .enumerate()
            .map(|(i, (text, label))| vec![json!(format!("pubmed~{i}")), json!(label), json!(text)])
            .collect();
        Table::from_rows([SOURCE_COLUMN, LABEL_COLUMN, ENTITY_ID], rows).unwrap()
    }

    fn links(rows: &[(&str, &str, f64)]) -> Table {
        let rows = rows
            .iter()
            .map(|(text, cui, score)| {
                vec![json!(text), json!("UMLS"), json!(cui), json!(""), json!(""), json!(score)]
            })
            .collect();
        Table::from_rows(
            [SOURCE_COLUMN, LABEL_COLUMN, CONCEPT_ID, "name", "definition", SCORE_COLUMN],
            rows,
        )
        .unwrap()
    }

    #[test]
    fn test_select_concepts_ranks_and_filters() {
        let entities = entities(&[
            ("pku", "DISEASE"),
            ("pku", "DISEASE"),
            ("hpa", "DISEASE"),
            ("pku", "CHEMICAL"),
            ("aspirin", "CHEMICAL"),
        ]);
        let links = links(&[
            ("pku", "C1", 0.95),
            ("pku", "C2", 0.99),
            ("pku", "C3", 0.5),
            ("pku", "C4", 0.91),
            ("pku", "C5", 0.92),
            ("hpa", "C6", 0.97),
            ("aspirin", "C7", 1.0),
        ]);
        assert_eq!(
            select_concepts(&entities, &links),
            vec!["C2", "C1", "C5", "C6"]
        );
    }

    #[test]
    fn test_top_five_entities_only() {
        let texts: Vec<(String, &str)> = (0..7).map(|i| (format!("d{i}"), "DISEASE")).collect();
        let mut pairs: Vec<(&str, &str)> = texts.iter().map(|(t, l)| (t.as_str(), *l)).collect();
        pairs.push(("d6", "DISEASE"));
        let link_rows: Vec<(String, String)> =
            (0..7).map(|i| (format!("d{i}"), format!("C{i}"))).collect();
        let link_refs: Vec<(&str, &str, f64)> = link_rows
            .iter()
            .map(|(t, c)| (t.as_str(), c.as_str(), 0.95))
            .collect();

        let cuis = select_concepts(&entities(&pairs), &links(&link_refs));
        assert_eq!(cuis.len(), TOP_ENTITIES);
        assert_eq!(cuis[0], "C6");
    }

    fn archive() -> RecordArchive {
        serde_json::from_value(json!({
            "concepts": [{
                "cui": "C1",
                "genes": ["PAH", "QDPR"],
                "snomed": [{"saui": "S1", "text": "PKU", "scui": "7573000", "sab": "SNOMEDCT_US"}],
                "clinical_features": [{"cui": "C9", "type": "phenotype", "name": "Seizure"}]
            }]
        }))
        .unwrap()
    }

    #[test]
    fn test_output_tables_follow_flags() {
        let stage = MedGenStage::new(Arc::new(archive()));
        let entities = entities(&[("pku", "DISEASE")]);
        let links = links(&[("pku", "C1", 0.99)]);

        let options = MedGenOptions::default();
        let output = stage
            .run(MedGenInput {
                entities: Some(&entities),
                links: Some(&links),
                options: &options,
            })
            .unwrap();
        assert_eq!(output.len(), 1);
        let genes = output.get_table(GENE_TABLE).unwrap();
        assert_eq!(genes.column(GENE_ID).unwrap(), vec![&json!("PAH"), &json!("QDPR")]);
        assert_eq!(genes.value(0, SOURCE_COLUMN), Some(&json!("C1")));

        let options = MedGenOptions {
            snomed: true,
            clinical_features: true,
        };
        let output = stage
            .run(MedGenInput {
                entities: Some(&entities),
                links: Some(&links),
                options: &options,
            })
            .unwrap();
        assert_eq!(output.len(), 3);
        let snomed = output.get_table(SNOMED_TABLE).unwrap();
        assert_eq!(snomed.value(0, "SCUI"), Some(&json!("7573000")));
        let features = output.get_table(FEATURE_TABLE).unwrap();
        assert_eq!(features.value(0, "feature_type"), Some(&json!("phenotype")));
    }

    #[test]
    fn test_missing_links_gives_empty_output() {
        let stage = MedGenStage::new(Arc::new(archive()));
        let entities = entities(&[("pku", "DISEASE")]);
        let options = MedGenOptions::default();
        let output = stage
            .run(MedGenInput {
                entities: Some(&entities),
                links: None,
                options: &options,
            })
            .unwrap();
        assert!(output.is_empty());
    }
}
