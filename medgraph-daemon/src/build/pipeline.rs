//! Build pipeline: request → stage outputs → graph.

use chrono::{DateTime, Utc};
use medgraph_core::request::{MedGenOptions, NerOptions, PubMedOptions};
use medgraph_core::sources::{
    ConceptSource, EntityRecognizer, LiteratureSource, ProteinSource, RecordArchive,
};
use medgraph_core::stages::{
    MedGenInput, MedGenStage, NerInput, NerStage, PubMedInput, PubMedStage, UniProtInput,
    UniProtStage, ENTITY_TABLE, GENE_TABLE, LINK_TABLE, PAPER_TABLE,
};
use medgraph_core::{GraphRequest, Pipe, PipeOutput, StageHierarchy};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use uuid::Uuid;

use super::materializer::{BuildError, GraphMaterializer, MaterializeReport};
use crate::storage::GraphStore;

/// Papers fetched when a request does not say.
pub const DEFAULT_MAX_RECORDS: usize = 10;

/// Record sources the stages draw from.
#[derive(Clone)]
pub struct Sources {
    pub literature: Arc<dyn LiteratureSource>,
    pub recognizer: Arc<dyn EntityRecognizer>,
    pub concepts: Arc<dyn ConceptSource>,
    pub proteins: Arc<dyn ProteinSource>,
}

impl Sources {
    /// Serve every source from one archive.
    pub fn from_archive(archive: RecordArchive) -> Self {
        let archive = Arc::new(archive);
        Self {
            literature: archive.clone(),
            recognizer: archive.clone(),
            concepts: archive.clone(),
            proteins: archive,
        }
    }
}

/// Result of a build operation.
#[derive(Debug, Clone, Serialize)]
pub struct BuildResult {
    pub build_id: Uuid,
    pub search_term: String,
    pub started_at: DateTime<Utc>,
    /// Stages that ran, in order.
    pub stages: Vec<String>,
    pub report: MaterializeReport,
    pub duration: Duration,
}

pub struct BuildPipeline<S> {
    pubmed: PubMedStage,
    ner: NerStage,
    medgen: MedGenStage,
    uniprot: UniProtStage,
    hierarchy: StageHierarchy,
    materializer: GraphMaterializer<S>,
    max_records: usize,
}

impl<S: GraphStore> BuildPipeline<S> {
    pub fn new(sources: Sources, materializer: GraphMaterializer<S>) -> Result<Self, BuildError> {
        let anchor = materializer.anchor();
        let pubmed =
            PubMedStage::new(sources.literature).with_anchor(&anchor.label, &anchor.key);
        let ner = NerStage::new(sources.recognizer);
        let medgen = MedGenStage::new(sources.concepts);
        let uniprot = UniProtStage::new(sources.proteins);

        let hierarchy = StageHierarchy::from_declarations([
            (pubmed.name(), pubmed.depends_on()),
            (ner.name(), ner.depends_on()),
            (medgen.name(), medgen.depends_on()),
            (uniprot.name(), uniprot.depends_on()),
        ])?;

        Ok(Self {
            pubmed,
            ner,
            medgen,
            uniprot,
            hierarchy,
            materializer,
            max_records: DEFAULT_MAX_RECORDS,
        })
    }

    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = max_records;
        self
    }

    pub fn materializer(&self) -> &GraphMaterializer<S> {
        &self.materializer
    }

    pub fn hierarchy(&self) -> &StageHierarchy {
        &self.hierarchy
    }

    /// Run the requested stages in order, each fed by its predecessor.
    ///
    /// The requested set is checked against the hierarchy before any stage
    /// runs.
    pub fn extract(&self, request: &GraphRequest) -> Result<Vec<PipeOutput>, BuildError> {
        let requested = request.pipelines.requested();
        self.hierarchy.check(&requested)?;

        let mut outputs = Vec::with_capacity(requested.len());
        let pipelines = &request.pipelines;

        let Some(options) = &pipelines.pubmed else {
            return Ok(outputs);
        };
        let pubmed = self.run_pubmed(request, options)?;

        let Some(options) = &pipelines.ner else {
            outputs.push(pubmed);
            return Ok(outputs);
        };
        let ner = self.run_ner(&pubmed, options)?;
        outputs.push(pubmed);

        let Some(options) = &pipelines.med_gen else {
            outputs.push(ner);
            return Ok(outputs);
        };
        let medgen = self.run_medgen(&ner, options)?;
        outputs.push(ner);

        if pipelines.uni_prot.is_some() {
            let uniprot = self.uniprot.run(UniProtInput {
                genes: medgen.get_table(GENE_TABLE),
            })?;
            outputs.push(medgen);
            outputs.push(uniprot);
        } else {
            outputs.push(medgen);
        }
        Ok(outputs)
    }

    fn run_pubmed(&self, request: &GraphRequest, options: &PubMedOptions) -> Result<PipeOutput, BuildError> {
        Ok(self.pubmed.run(PubMedInput {
            search_term: &request.search_term,
            max_records: request.max_records.unwrap_or(self.max_records),
            options,
        })?)
    }

    fn run_ner(&self, pubmed: &PipeOutput, options: &NerOptions) -> Result<PipeOutput, BuildError> {
        Ok(self.ner.run(NerInput {
            papers: pubmed.get_table(PAPER_TABLE),
            options,
        })?)
    }

    fn run_medgen(&self, ner: &PipeOutput, options: &MedGenOptions) -> Result<PipeOutput, BuildError> {
        Ok(self.medgen.run(MedGenInput {
            entities: ner.get_table(ENTITY_TABLE),
            links: ner.get_table(LINK_TABLE),
            options,
        })?)
    }

    /// Extract, then materialize under the request's search term.
    pub fn build(&self, request: &GraphRequest) -> Result<BuildResult, BuildError> {
        let start = Instant::now();
        let build_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!("Build {}: starting for '{}'", build_id, request.search_term);

        let outputs = self.extract(request)?;
        let stages: Vec<String> = outputs.iter().map(|o| o.pipe().to_string()).collect();
        info!("Build {}: extracted {:?}", build_id, stages);

        let report = self
            .materializer
            .build(&request.search_term, &outputs, request.reset)?;

        let duration = start.elapsed();
        info!(
            "Build {}: {} nodes, {} relations in {:?}",
            build_id,
            report.node_count(),
            report.relation_count(),
            duration
        );
        Ok(BuildResult {
            build_id,
            search_term: request.search_term.clone(),
            started_at,
            stages,
            report,
            duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryGraph;
    use medgraph_core::Error;
    use serde_json::json;

    fn pipeline() -> BuildPipeline<MemoryGraph> {
        let archive: RecordArchive = serde_json::from_value(json!({
            "papers": [{"pmid": "1", "title": "PKU", "abstract_sections": ["phenylketonuria"]}],
            "entities": [{"text": "phenylketonuria", "category": "DISEASE"}]
        }))
        .unwrap();
        BuildPipeline::new(
            Sources::from_archive(archive),
            GraphMaterializer::new(MemoryGraph::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_hierarchy_from_stage_declarations() {
        assert_eq!(
            pipeline().hierarchy().order(),
            &["pubmed", "ner", "medGen", "uniProt"]
        );
    }

    #[test]
    fn test_missing_predecessor_stops_before_extraction() {
        let pipeline = pipeline();
        let request = GraphRequest::from_value(&json!({
            "disease": "PKU",
            "pipelines": {"pubmed": {"run": true}, "medGen": {"run": true}}
        }))
        .unwrap();
        let err = pipeline.build(&request).unwrap_err();
        assert!(matches!(
            err,
            BuildError::Pipeline(Error::MissingDependency { ref predecessor, .. }) if predecessor == "ner"
        ));
        assert_eq!(pipeline.materializer().store().node_count(), 0);
    }

    #[test]
    fn test_outputs_follow_requested_stages() {
        let request = GraphRequest::from_value(&json!({
            "disease": "PKU",
            "pipelines": {"pubmed": {"run": true}, "ner": {"run": true}}
        }))
        .unwrap();
        let outputs = pipeline().extract(&request).unwrap();
        let names: Vec<&str> = outputs.iter().map(PipeOutput::pipe).collect();
        assert_eq!(names, vec!["pubmed", "ner"]);
    }
}
