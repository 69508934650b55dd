//! Node labels and identifier rules.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier pattern"));

/// Check whether `name` may be embedded into a store operation as a label,
/// property or column name.
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// One label, or an ordered set of labels.
///
/// Serialized untagged, so metadata records carry either `"Gene"` or
/// `["DISEASE", "CHEMICAL"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Labels {
    Single(String),
    Multiple(Vec<String>),
}

impl Labels {
    pub fn single(label: impl Into<String>) -> Self {
        Labels::Single(label.into())
    }

    /// Build a label set, dropping repeated labels but keeping first-seen order.
    pub fn multiple<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set: Vec<String> = Vec::new();
        for label in labels {
            let label = label.into();
            if !set.contains(&label) {
                set.push(label);
            }
        }
        Labels::Multiple(set)
    }

    /// Iterate the labels in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let labels: &[String] = match self {
            Labels::Single(label) => std::slice::from_ref(label),
            Labels::Multiple(labels) => labels,
        };
        labels.iter().map(String::as_str)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.iter().any(|l| l == label)
    }

    pub fn len(&self) -> usize {
        match self {
            Labels::Single(_) => 1,
            Labels::Multiple(labels) => labels.len(),
        }
    }

    /// True when no usable label is declared (an empty set or a blank label).
    pub fn is_empty(&self) -> bool {
        match self {
            Labels::Single(label) => label.is_empty(),
            Labels::Multiple(labels) => labels.is_empty() || labels.iter().any(String::is_empty),
        }
    }
}

impl fmt::Display for Labels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Labels::Single(label) => write!(f, "{}", label),
            Labels::Multiple(labels) => write!(f, "[{}]", labels.join(", ")),
        }
    }
}

impl From<&str> for Labels {
    fn from(label: &str) -> Self {
        Labels::single(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_rules() {
        assert!(is_identifier("pubmedID"));
        assert!(is_identifier("_private"));
        assert!(is_identifier("SCUI"));
        assert!(!is_identifier("source-column"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a}) DETACH DELETE (n"));
    }

    #[test]
    fn test_multiple_keeps_order_and_drops_repeats() {
        let labels = Labels::multiple(["DISEASE", "CHEMICAL", "DISEASE"]);
        assert_eq!(labels.iter().collect::<Vec<_>>(), vec!["DISEASE", "CHEMICAL"]);
        assert_eq!(labels.len(), 2);
        assert!(labels.contains("CHEMICAL"));
    }

    #[test]
    fn test_untagged_serde() {
        let single: Labels = serde_json::from_str("\"Gene\"").unwrap();
        assert_eq!(single, Labels::single("Gene"));

        let many: Labels = serde_json::from_str(r#"["DISEASE","CHEMICAL"]"#).unwrap();
        assert_eq!(many, Labels::multiple(["DISEASE", "CHEMICAL"]));
    }

    #[test]
    fn test_empty_labels() {
        assert!(Labels::single("").is_empty());
        assert!(Labels::Multiple(vec![]).is_empty());
        assert!(!Labels::single("Gene").is_empty());
    }
}
