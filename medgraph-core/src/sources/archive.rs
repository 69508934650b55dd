//! Offline record archive.
//!
//! A JSON document holding papers, a gazetteer of known entities, concept
//! links, concept summaries and protein entries. Used for offline builds and
//! as the fixture behind tests.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::debug;

use super::{
    ConceptLink, ConceptSource, ConceptSummary, Entity, EntityRecognizer, LiteratureSource,
    PaperRecord, ProteinRecord, ProteinSource,
};
use crate::error::SourceError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordArchive {
    #[serde(default)]
    pub papers: Vec<PaperRecord>,
    /// Known entity mentions; recognition is a case-insensitive lookup.
    #[serde(default)]
    pub entities: Vec<Entity>,
    /// Entity text → candidate concepts.
    #[serde(default)]
    pub links: HashMap<String, Vec<ConceptLink>>,
    #[serde(default)]
    pub concepts: Vec<ConceptSummary>,
    #[serde(default)]
    pub proteins: Vec<ProteinRecord>,
}

impl RecordArchive {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let archive: Self = serde_json::from_str(&content)?;
        debug!(
            "Loaded record archive {} ({} papers, {} entities, {} concepts, {} proteins)",
            path.display(),
            archive.papers.len(),
            archive.entities.len(),
            archive.concepts.len(),
            archive.proteins.len()
        );
        Ok(archive)
    }
}

impl LiteratureSource for RecordArchive {
    fn search(&self, term: &str, max_records: usize) -> Result<Vec<PaperRecord>, SourceError> {
        let needle = term.to_lowercase();
        Ok(self
            .papers
            .iter()
            .filter(|p| {
                p.title.to_lowercase().contains(&needle)
                    || p.abstract_text().to_lowercase().contains(&needle)
            })
            .take(max_records)
            .cloned()
            .collect())
    }
}

impl EntityRecognizer for RecordArchive {
    fn recognize(&self, text: &str) -> Vec<Entity> {
        let haystack = text.to_lowercase();
        let mut seen = HashSet::new();
        self.entities
            .iter()
            .filter(|e| !e.text.is_empty() && haystack.contains(&e.text.to_lowercase()))
            .filter(|e| seen.insert((*e).clone()))
            .cloned()
            .collect()
    }

    fn link(&self, entity: &Entity) -> Vec<ConceptLink> {
        self.links.get(&entity.text).cloned().unwrap_or_default()
    }
}

impl ConceptSource for RecordArchive {
    fn summaries(&self, cuis: &[String]) -> Result<Vec<ConceptSummary>, SourceError> {
        let mut seen = HashSet::new();
        Ok(cuis
            .iter()
            .filter(|cui| seen.insert(cui.as_str()))
            .filter_map(|cui| self.concepts.iter().find(|c| &c.cui == cui))
            .cloned()
            .collect())
    }
}

impl ProteinSource for RecordArchive {
    fn proteins(&self, genes: &[String], limit: usize) -> Result<Vec<ProteinRecord>, SourceError> {
        Ok(self
            .proteins
            .iter()
            .filter(|p| p.genes.iter().any(|g| genes.contains(g)))
            .take(limit)
            .cloned()
            .collect())
    }
}
