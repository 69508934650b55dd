//! Graph build requests.
//!
//! A request names the search term and which stages to run:
//!
//! ```json
//! {
//!     "disease": "phenylketonuria",
//!     "n_articles": 100,
//!     "pipelines": {
//!         "pubmed": {"run": true, "meshTerms": true},
//!         "ner": {"run": true, "entityLinks": true},
//!         "medGen": {"run": true, "Snomed": true, "clinicalFeatures": false},
//!         "uniProt": {"run": false}
//!     }
//! }
//! ```

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::hierarchy::PIPE_HIERARCHY;

/// Request keys that must be present.
pub const REQUIRED_REQUEST_ARGS: [&str; 2] = ["disease", "pipelines"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PubMedOptions {
    #[serde(default, rename = "meshTerms")]
    pub mesh_terms: bool,
    #[serde(default)]
    pub keywords: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NerOptions {
    #[serde(default, rename = "entityLinks")]
    pub entity_links: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MedGenOptions {
    #[serde(default, rename = "Snomed")]
    pub snomed: bool,
    #[serde(default, rename = "clinicalFeatures")]
    pub clinical_features: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UniProtOptions {}

/// Options of the stages a request turned on. `None` means "not requested".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    pub pubmed: Option<PubMedOptions>,
    pub ner: Option<NerOptions>,
    pub med_gen: Option<MedGenOptions>,
    pub uni_prot: Option<UniProtOptions>,
}

impl PipelineOptions {
    /// Names of the requested stages, in hierarchy order.
    pub fn requested(&self) -> Vec<&'static str> {
        let flags = [
            self.pubmed.is_some(),
            self.ner.is_some(),
            self.med_gen.is_some(),
            self.uni_prot.is_some(),
        ];
        PIPE_HIERARCHY
            .iter()
            .zip(flags)
            .filter(|(_, on)| *on)
            .map(|(name, _)| *name)
            .collect()
    }
}

/// A parsed graph build request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphRequest {
    /// Search term; becomes the anchor node.
    pub search_term: String,
    /// Upper bound on fetched papers, if the request sets one.
    pub max_records: Option<usize>,
    /// Delete the existing graph before building.
    pub reset: bool,
    pub pipelines: PipelineOptions,
}

#[derive(Deserialize)]
struct StageToggle {
    #[serde(default)]
    run: bool,
    #[serde(flatten)]
    options: serde_json::Map<String, Value>,
}

impl GraphRequest {
    pub fn from_json_str(body: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(body).map_err(|e| Error::Request(e.to_string()))?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let Some(request) = value.as_object() else {
            return Err(Error::Request("request must be a JSON object".to_string()));
        };
        let missing: Vec<&str> = REQUIRED_REQUEST_ARGS
            .iter()
            .copied()
            .filter(|k| !request.contains_key(*k))
            .collect();
        if !missing.is_empty() {
            return Err(Error::Request(format!(
                "Missing required parameters in request: {:?}",
                missing
            )));
        }

        let search_term = request["disease"]
            .as_str()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::Request("'disease' must be a non-empty string".to_string()))?
            .to_string();

        let max_records = match request.get("n_articles") {
            None | Some(Value::Null) => None,
            Some(n) => Some(n.as_u64().filter(|n| *n > 0).ok_or_else(|| {
                Error::Request("'n_articles' must be a positive integer".to_string())
            })? as usize),
        };

        let reset = match request.get("reset") {
            None | Some(Value::Null) => false,
            Some(flag) => flag
                .as_bool()
                .ok_or_else(|| Error::Request("'reset' must be a boolean".to_string()))?,
        };

        let toggles: serde_json::Map<String, Value> =
            serde_json::from_value(request["pipelines"].clone())
                .map_err(|e| Error::Request(format!("'pipelines' must be an object: {}", e)))?;

        let mut pipelines = PipelineOptions::default();
        for (name, toggle) in toggles {
            let toggle: StageToggle = serde_json::from_value(toggle)
                .map_err(|e| Error::Request(format!("pipe '{}': {}", name, e)))?;
            if !toggle.run {
                continue;
            }
            let options = Value::Object(toggle.options);
            let decode_err = |e: serde_json::Error| Error::Request(format!("pipe '{}': {}", name, e));
            match name.as_str() {
                "pubmed" => pipelines.pubmed = Some(serde_json::from_value(options).map_err(decode_err)?),
                "ner" => pipelines.ner = Some(serde_json::from_value(options).map_err(decode_err)?),
                "medGen" => pipelines.med_gen = Some(serde_json::from_value(options).map_err(decode_err)?),
                "uniProt" => pipelines.uni_prot = Some(UniProtOptions::default()),
                _ => return Err(Error::UnknownStage(name)),
            }
        }

        Ok(Self {
            search_term,
            max_records,
            reset,
            pipelines,
        })
    }
}
