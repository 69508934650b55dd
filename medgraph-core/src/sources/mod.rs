//! Collaborators the extraction stages fetch records from.
//!
//! Each trait stands in for an external service (literature search, entity
//! recognition, concept summaries, protein lookup). [`archive::RecordArchive`]
//! serves all of them from a local JSON file.

pub mod archive;

use serde::{Deserialize, Serialize};

use crate::error::SourceError;

pub use archive::RecordArchive;

/// One article as returned by a literature search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperRecord {
    pub pmid: String,
    pub title: String,
    #[serde(default)]
    pub abstract_sections: Vec<String>,
    #[serde(default)]
    pub mesh_terms: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl PaperRecord {
    /// Graph identifier of the paper, e.g. `pubmed~31378419`.
    pub fn uri(&self) -> String {
        format!("pubmed~{}", self.pmid)
    }

    /// Abstract sections joined into one text.
    pub fn abstract_text(&self) -> String {
        self.abstract_sections.join(" ")
    }
}

/// Capitalize the first letter of every word, lowercasing the rest.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut word_start = true;
    for c in text.chars() {
        if c.is_alphabetic() {
            if word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            word_start = false;
        } else {
            out.push(c);
            word_start = true;
        }
    }
    out
}

/// A recognized entity mention.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    /// Entity category, e.g. `DISEASE` or `CHEMICAL`.
    pub category: String,
}

/// A candidate concept for an entity, scored by the linker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptLink {
    pub cui: String,
    pub name: String,
    #[serde(default)]
    pub definition: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnomedConcept {
    pub saui: String,
    pub text: String,
    pub scui: String,
    pub sab: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicalFeature {
    pub cui: String,
    #[serde(rename = "type")]
    pub feature_type: String,
    pub name: String,
    #[serde(default)]
    pub definition: String,
}

/// Concept summary for one CUI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptSummary {
    pub cui: String,
    #[serde(default)]
    pub genes: Vec<String>,
    #[serde(default)]
    pub snomed: Vec<SnomedConcept>,
    #[serde(default)]
    pub clinical_features: Vec<ClinicalFeature>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProteinRecord {
    pub accession: String,
    pub entry_name: String,
    #[serde(default)]
    pub protein_names: String,
    #[serde(default)]
    pub organism: String,
    #[serde(default)]
    pub function: String,
    /// Gene names the entry is annotated with.
    #[serde(default)]
    pub genes: Vec<String>,
}

pub trait LiteratureSource: Send + Sync {
    /// Papers matching `term`, at most `max_records` of them.
    fn search(&self, term: &str, max_records: usize) -> Result<Vec<PaperRecord>, SourceError>;
}

pub trait EntityRecognizer: Send + Sync {
    /// Distinct entity mentions in `text`.
    fn recognize(&self, text: &str) -> Vec<Entity>;

    /// Candidate concepts for an entity, in any order.
    fn link(&self, entity: &Entity) -> Vec<ConceptLink>;
}

pub trait ConceptSource: Send + Sync {
    fn summaries(&self, cuis: &[String]) -> Result<Vec<ConceptSummary>, SourceError>;
}

pub trait ProteinSource: Send + Sync {
    /// Proteins annotated with any of `genes`, at most `limit` of them.
    fn proteins(&self, genes: &[String], limit: usize) -> Result<Vec<ProteinRecord>, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paper_uri_and_abstract() {
        let paper = PaperRecord {
            pmid: "31378419".to_string(),
            title: "PKU".to_string(),
            abstract_sections: vec!["Background.".to_string(), "Results.".to_string()],
            mesh_terms: vec![],
            keywords: vec![],
        };
        assert_eq!(paper.uri(), "pubmed~31378419");
        assert_eq!(paper.abstract_text(), "Background. Results.");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("phenylalanine HYDROXYLASE"), "Phenylalanine Hydroxylase");
        assert_eq!(title_case("tetrahydrobiopterin-deficient"), "Tetrahydrobiopterin-Deficient");
        assert_eq!(title_case(""), "");
    }
}
