//! Node tables: the uniform schema every extraction stage emits.
//!
//! A node table is a [`Table`] plus [`NodeTableMeta`] describing which graph
//! nodes its rows become and how they attach to nodes that already exist.
//!
//! ```text
//! | source | node_label | gene | ... attribute_cols |
//! | C0031485 | Gene     | PAH  | ...                |
//! ```
//!
//! Construction validates everything up front; a [`NodeTable`] that exists is
//! valid and immutable.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::error::SchemaViolation;
use crate::labels::{is_identifier, Labels};
use crate::table::Table;

/// Column holding each row's anchor value, by convention.
pub const SOURCE_COLUMN: &str = "source";

/// Column holding each row's node label. Always required.
pub const LABEL_COLUMN: &str = "node_label";

/// Fields a loose metadata record must carry (values may be null where optional).
pub const REQUIRED_FIELDS: [&str; 7] = [
    "table_name",
    "source_node",
    "source_node_attr",
    "source_column",
    "node_label",
    "id_attribute",
    "attribute_cols",
];

/// Metadata describing a node table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTableMeta {
    pub table_name: String,
    /// Anchor node label(s) the rows attach to.
    pub source_node: Option<Labels>,
    /// Identifying property on the anchor node.
    pub source_node_attr: Option<String>,
    /// Column in the row data holding the anchor's identifying value.
    pub source_column: Option<String>,
    pub node_label: Labels,
    pub id_attribute: String,
    #[serde(default)]
    pub attribute_cols: Vec<String>,
}

/// How a table's rows relate to their anchors, with every part present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation<'a> {
    pub anchor_labels: &'a Labels,
    pub anchor_attr: &'a str,
    pub source_column: &'a str,
}

impl NodeTableMeta {
    /// Metadata for a table that does not attach to any anchor.
    pub fn new(
        table_name: impl Into<String>,
        node_label: Labels,
        id_attribute: impl Into<String>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            source_node: None,
            source_node_attr: None,
            source_column: None,
            node_label,
            id_attribute: id_attribute.into(),
            attribute_cols: Vec::new(),
        }
    }

    /// Attach rows to anchors of `source_node` whose `source_node_attr` equals
    /// the row's `source_column` value.
    pub fn with_source(
        mut self,
        source_node: Labels,
        source_node_attr: impl Into<String>,
        source_column: impl Into<String>,
    ) -> Self {
        self.source_node = Some(source_node);
        self.source_node_attr = Some(source_node_attr.into());
        self.source_column = Some(source_column.into());
        self
    }

    pub fn with_attributes<I, S>(mut self, attribute_cols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attribute_cols = attribute_cols.into_iter().map(Into::into).collect();
        self
    }

    /// Decode metadata from a loose JSON record, naming every missing field.
    pub fn from_json(value: &Value) -> Result<Self, SchemaViolation> {
        let Some(record) = value.as_object() else {
            return Err(SchemaViolation::MalformedMeta(
                "expected a JSON object".to_string(),
            ));
        };
        let missing: Vec<String> = REQUIRED_FIELDS
            .iter()
            .filter(|f| !record.contains_key(**f))
            .map(|f| f.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(SchemaViolation::MissingFields(missing));
        }

        let mut record = record.clone();
        if record.get("attribute_cols").is_some_and(Value::is_null) {
            record.insert("attribute_cols".to_string(), Value::Array(Vec::new()));
        }
        for field in ["table_name", "node_label", "id_attribute"] {
            if record.get(field).is_some_and(Value::is_null) {
                return Err(SchemaViolation::EmptyField(static_field(field)));
            }
        }
        serde_json::from_value(Value::Object(record))
            .map_err(|e| SchemaViolation::MalformedMeta(e.to_string()))
    }

    /// Check the metadata on its own, without row data.
    pub fn validate(&self) -> Result<(), SchemaViolation> {
        if self.table_name.is_empty() {
            return Err(SchemaViolation::EmptyField("table_name"));
        }
        if self.node_label.is_empty() {
            return Err(SchemaViolation::EmptyField("node_label"));
        }
        if self.id_attribute.is_empty() {
            return Err(SchemaViolation::EmptyField("id_attribute"));
        }

        if self.source_column.is_some() {
            if self.source_node.as_ref().map_or(true, Labels::is_empty) {
                return Err(self.incomplete("source_node"));
            }
            if self.source_node_attr.as_deref().map_or(true, str::is_empty) {
                return Err(self.incomplete("source_node_attr"));
            }
        }

        let mut names: Vec<&str> = self.required_columns();
        names.extend(self.node_label.iter());
        if let Some(source_node) = &self.source_node {
            names.extend(source_node.iter());
        }
        if let Some(attr) = &self.source_node_attr {
            names.push(attr);
        }
        if let Some(bad) = names.into_iter().find(|n| !is_identifier(n)) {
            return Err(SchemaViolation::InvalidIdentifier {
                table: self.table_name.clone(),
                name: bad.to_string(),
            });
        }
        Ok(())
    }

    /// Columns the row data must carry.
    pub fn required_columns(&self) -> Vec<&str> {
        let mut columns = Vec::with_capacity(3 + self.attribute_cols.len());
        if let Some(source) = &self.source_column {
            columns.push(source.as_str());
        }
        columns.push(LABEL_COLUMN);
        columns.push(&self.id_attribute);
        columns.extend(self.attribute_cols.iter().map(String::as_str));
        columns
    }

    /// The anchor relation, when the table declares one.
    pub fn relation(&self) -> Option<Relation<'_>> {
        Some(Relation {
            anchor_labels: self.source_node.as_ref()?,
            anchor_attr: self.source_node_attr.as_deref()?,
            source_column: self.source_column.as_deref()?,
        })
    }

    fn incomplete(&self, field: &'static str) -> SchemaViolation {
        SchemaViolation::IncompleteRelation {
            table: self.table_name.clone(),
            field,
        }
    }
}

fn static_field(field: &str) -> &'static str {
    REQUIRED_FIELDS
        .iter()
        .find(|f| **f == field)
        .copied()
        .unwrap_or("unknown")
}

/// A validated node table.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeTable {
    meta: NodeTableMeta,
    data: Table,
}

impl NodeTable {
    /// Validate `meta` against `data` and build the table.
    pub fn new(meta: NodeTableMeta, data: Table) -> Result<Self, SchemaViolation> {
        meta.validate()?;

        for column in meta.required_columns() {
            if !data.has_column(column) {
                return Err(SchemaViolation::MissingColumn {
                    table: meta.table_name.clone(),
                    column: column.to_string(),
                });
            }
        }
        if let Some(bad) = data.columns().iter().find(|c| !is_identifier(c)) {
            return Err(SchemaViolation::InvalidIdentifier {
                table: meta.table_name.clone(),
                name: bad.clone(),
            });
        }

        check_labels(&meta, &data)?;
        Ok(Self { meta, data })
    }

    pub fn name(&self) -> &str {
        &self.meta.table_name
    }

    pub fn meta(&self) -> &NodeTableMeta {
        &self.meta
    }

    pub fn data(&self) -> &Table {
        &self.data
    }

    /// Rows that become nodes of `label`, one per distinct id (first wins).
    pub fn node_rows(&self, label: &str) -> Vec<usize> {
        let rows = self.rows_for_label(label);
        self.data.dedup_by(&rows, &self.meta.id_attribute)
    }

    /// Rows that become relations for nodes of `label`. Not deduplicated.
    pub fn relation_rows(&self, label: &str) -> Vec<usize> {
        self.rows_for_label(label)
    }

    fn rows_for_label(&self, label: &str) -> Vec<usize> {
        match &self.meta.node_label {
            Labels::Single(single) if single == label => (0..self.data.len()).collect(),
            Labels::Single(_) => Vec::new(),
            Labels::Multiple(_) => self
                .data
                .rows_where(LABEL_COLUMN, &Value::String(label.to_string())),
        }
    }
}

fn check_labels(meta: &NodeTableMeta, data: &Table) -> Result<(), SchemaViolation> {
    let table = || meta.table_name.clone();
    let found = data.column(LABEL_COLUMN).unwrap_or_default();

    match &meta.node_label {
        Labels::Single(expected) => {
            if let Some(bad) = found.iter().find(|v| v.as_str() != Some(expected.as_str())) {
                return Err(SchemaViolation::LabelMismatch {
                    table: table(),
                    expected: expected.clone(),
                    found: label_text(bad),
                });
            }
        }
        Labels::Multiple(declared) => {
            let present: BTreeSet<String> = found.iter().map(|v| label_text(v)).collect();
            let declared_set: BTreeSet<&str> = declared.iter().map(String::as_str).collect();

            let unexpected: Vec<String> = present
                .iter()
                .filter(|l| !declared_set.contains(l.as_str()))
                .cloned()
                .collect();
            if !unexpected.is_empty() {
                return Err(SchemaViolation::UnexpectedLabels {
                    table: table(),
                    unexpected,
                });
            }

            let missing: Vec<String> = declared
                .iter()
                .filter(|l| !present.contains(l.as_str()))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(SchemaViolation::MissingLabels {
                    table: table(),
                    missing,
                });
            }
        }
    }
    Ok(())
}

fn label_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gene_rows(labels: [&str; 2]) -> Table {
        Table::from_rows(
            ["source", "node_label", "gene"],
            vec![
                vec![json!("C1"), json!(labels[0]), json!("PAH")],
                vec![json!("C2"), json!(labels[1]), json!("PAH")],
            ],
        )
        .unwrap()
    }

    fn gene_meta() -> NodeTableMeta {
        NodeTableMeta::new("Gene", Labels::single("Gene"), "gene").with_source(
            Labels::single("UMLS"),
            "CUI",
            "source",
        )
    }

    #[test]
    fn test_valid_single_label_table() {
        let table = NodeTable::new(gene_meta(), gene_rows(["Gene", "Gene"])).unwrap();
        assert_eq!(table.name(), "Gene");
        assert_eq!(table.data().len(), 2);
        let relation = table.meta().relation().unwrap();
        assert_eq!(relation.anchor_attr, "CUI");
        assert_eq!(relation.source_column, "source");
    }

    #[test]
    fn test_missing_column_is_named() {
        for column in ["source", "node_label", "gene"] {
            let data = gene_rows(["Gene", "Gene"]);
            let kept: Vec<&str> = data
                .columns()
                .iter()
                .map(String::as_str)
                .filter(|c| *c != column)
                .collect();
            let rows: Vec<Vec<Value>> = data
                .rows()
                .iter()
                .map(|r| {
                    data.columns()
                        .iter()
                        .zip(r)
                        .filter(|(c, _)| c.as_str() != column)
                        .map(|(_, v)| v.clone())
                        .collect::<Vec<Value>>()
                })
                .collect();
            let trimmed = Table::from_rows(kept, rows).unwrap();

            let err = NodeTable::new(gene_meta(), trimmed).unwrap_err();
            assert_eq!(
                err,
                SchemaViolation::MissingColumn {
                    table: "Gene".to_string(),
                    column: column.to_string()
                }
            );
        }
    }

    #[test]
    fn test_missing_attribute_column() {
        let meta = gene_meta().with_attributes(["symbol"]);
        let err = NodeTable::new(meta, gene_rows(["Gene", "Gene"])).unwrap_err();
        assert!(matches!(err, SchemaViolation::MissingColumn { column, .. } if column == "symbol"));
    }

    #[test]
    fn test_single_label_mismatch() {
        let err = NodeTable::new(gene_meta(), gene_rows(["Gene", "FalseLabel"])).unwrap_err();
        assert_eq!(
            err,
            SchemaViolation::LabelMismatch {
                table: "Gene".to_string(),
                expected: "Gene".to_string(),
                found: "FalseLabel".to_string()
            }
        );
    }

    #[test]
    fn test_label_set_must_match_exactly() {
        let meta = NodeTableMeta::new("Entities", Labels::multiple(["DISEASE", "CHEMICAL"]), "gene");

        assert!(NodeTable::new(meta.clone(), gene_rows(["DISEASE", "CHEMICAL"])).is_ok());

        let err = NodeTable::new(meta.clone(), gene_rows(["DISEASE", "DISEASE"])).unwrap_err();
        assert_eq!(
            err,
            SchemaViolation::MissingLabels {
                table: "Entities".to_string(),
                missing: vec!["CHEMICAL".to_string()]
            }
        );

        let err = NodeTable::new(meta, gene_rows(["DISEASE", "GENE"])).unwrap_err();
        assert_eq!(
            err,
            SchemaViolation::UnexpectedLabels {
                table: "Entities".to_string(),
                unexpected: vec!["GENE".to_string()]
            }
        );
    }

    #[test]
    fn test_relation_requires_anchor() {
        let mut meta = gene_meta();
        meta.source_node = None;
        let err = NodeTable::new(meta, gene_rows(["Gene", "Gene"])).unwrap_err();
        assert!(matches!(
            err,
            SchemaViolation::IncompleteRelation { field: "source_node", .. }
        ));

        let mut meta = gene_meta();
        meta.source_node_attr = None;
        let err = NodeTable::new(meta, gene_rows(["Gene", "Gene"])).unwrap_err();
        assert!(matches!(
            err,
            SchemaViolation::IncompleteRelation { field: "source_node_attr", .. }
        ));
    }

    #[test]
    fn test_empty_required_fields() {
        let meta = NodeTableMeta::new("", Labels::single("Gene"), "gene");
        assert_eq!(meta.validate(), Err(SchemaViolation::EmptyField("table_name")));

        let meta = NodeTableMeta::new("Gene", Labels::Multiple(vec![]), "gene");
        assert_eq!(meta.validate(), Err(SchemaViolation::EmptyField("node_label")));

        let meta = NodeTableMeta::new("Gene", Labels::single("Gene"), "");
        assert_eq!(meta.validate(), Err(SchemaViolation::EmptyField("id_attribute")));
    }

    #[test]
    fn test_invalid_column_name() {
        let meta = NodeTableMeta::new("Gene", Labels::single("Gene"), "gene").with_source(
            Labels::single("UMLS"),
            "CUI",
            "source-column",
        );
        let data = Table::from_rows(
            ["source-column", "node_label", "gene"],
            vec![vec![json!("C1"), json!("Gene"), json!("PAH")]],
        )
        .unwrap();
        let err = NodeTable::new(meta, data).unwrap_err();
        assert_eq!(
            err,
            SchemaViolation::InvalidIdentifier {
                table: "Gene".to_string(),
                name: "source-column".to_string()
            }
        );
    }

    #[test]
    fn test_from_json_reports_missing_fields() {
        let err = NodeTableMeta::from_json(&json!({
            "source_node": "UMLS",
            "source_node_attr": "CUI",
            "source_column": "source",
            "node_label": "Gene",
            "attribute_cols": []
        }))
        .unwrap_err();
        assert_eq!(
            err,
            SchemaViolation::MissingFields(vec![
                "table_name".to_string(),
                "id_attribute".to_string()
            ])
        );
    }

    #[test]
    fn test_from_json_round_trips_meta() {
        let meta = NodeTableMeta::from_json(&json!({
            "table_name": "Gene",
            "source_node": "UMLS",
            "source_node_attr": "CUI",
            "source_column": "source",
            "node_label": "Gene",
            "id_attribute": "gene",
            "attribute_cols": null
        }))
        .unwrap();
        assert_eq!(meta, gene_meta());

        let err = NodeTableMeta::from_json(&json!({
            "table_name": null,
            "source_node": null,
            "source_node_attr": null,
            "source_column": null,
            "node_label": "Gene",
            "id_attribute": "gene",
            "attribute_cols": []
        }))
        .unwrap_err();
        assert_eq!(err, SchemaViolation::EmptyField("table_name"));
    }

    #[test]
    fn test_node_rows_dedup_but_relation_rows_do_not() {
        let table = NodeTable::new(gene_meta(), gene_rows(["Gene", "Gene"])).unwrap();
        assert_eq!(table.node_rows("Gene"), vec![0]);
        assert_eq!(table.relation_rows("Gene"), vec![0, 1]);
        assert!(table.node_rows("Protein").is_empty());
    }

    #[test]
    fn test_rows_split_by_label() {
        let meta = NodeTableMeta::new("Entities", Labels::multiple(["DISEASE", "CHEMICAL"]), "gene");
        let table = NodeTable::new(meta, gene_rows(["DISEASE", "CHEMICAL"])).unwrap();
        assert_eq!(table.node_rows("DISEASE"), vec![0]);
        assert_eq!(table.node_rows("CHEMICAL"), vec![1]);
    }
}
