//! Store operations as structured values.
//!
//! A [`Statement`] names only labels and properties taken from validated node
//! table metadata; row values always travel separately as bound parameters.
//! The Neo4j backend renders statements into Cypher, the other backends
//! interpret them directly.

use medgraph_core::NodeTableMeta;

use super::{checked, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Remove every node and relationship.
    DeleteAll,

    /// Merge one node per row keyed by `key`, then set `properties`.
    MergeNodes {
        label: String,
        key: String,
        properties: Vec<String>,
    },

    /// Per row: match anchors of `anchor_label` whose `anchor_key` equals the
    /// row's `anchor_column`, match the node of `node_label` whose `node_key`
    /// equals the row's `node_key`, and merge `anchor -[relation]-> node`.
    MergeRelations {
        anchor_label: String,
        anchor_key: String,
        anchor_column: String,
        node_label: String,
        node_key: String,
        relation: String,
    },
}

impl Statement {
    /// Merge the anchor node; rows carry `key`.
    pub fn merge_anchor(label: &str, key: &str) -> Result<Self, StoreError> {
        Ok(Statement::MergeNodes {
            label: checked(label)?.to_string(),
            key: checked(key)?.to_string(),
            properties: Vec::new(),
        })
    }

    /// Merge the nodes of `label` described by `meta`.
    pub fn merge_nodes(meta: &NodeTableMeta, label: &str) -> Result<Self, StoreError> {
        if !meta.node_label.contains(label) {
            return Err(StoreError::Template(format!(
                "table '{}' declares no label '{}'",
                meta.table_name, label
            )));
        }
        let properties = meta
            .attribute_cols
            .iter()
            .filter(|c| **c != meta.id_attribute)
            .map(|c| checked(c).map(str::to_string))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Statement::MergeNodes {
            label: checked(label)?.to_string(),
            key: checked(&meta.id_attribute)?.to_string(),
            properties,
        })
    }

    /// Attach nodes of `node_label` to anchors of `anchor_label`, as declared
    /// by `meta`.
    pub fn merge_relations(
        meta: &NodeTableMeta,
        node_label: &str,
        anchor_label: &str,
        relation: &str,
    ) -> Result<Self, StoreError> {
        let Some(declared) = meta.relation() else {
            return Err(StoreError::Template(format!(
                "table '{}' declares no anchor relation",
                meta.table_name
            )));
        };
        if !meta.node_label.contains(node_label) {
            return Err(StoreError::Template(format!(
                "table '{}' declares no label '{}'",
                meta.table_name, node_label
            )));
        }
        if !declared.anchor_labels.contains(anchor_label) {
            return Err(StoreError::Template(format!(
                "table '{}' declares no anchor label '{}'",
                meta.table_name, anchor_label
            )));
        }
        Ok(Statement::MergeRelations {
            anchor_label: checked(anchor_label)?.to_string(),
            anchor_key: checked(declared.anchor_attr)?.to_string(),
            anchor_column: checked(declared.source_column)?.to_string(),
            node_label: checked(node_label)?.to_string(),
            node_key: checked(&meta.id_attribute)?.to_string(),
            relation: checked(relation)?.to_string(),
        })
    }

    /// Row columns the statement reads.
    pub fn bound_columns(&self) -> Vec<&str> {
        match self {
            Statement::DeleteAll => Vec::new(),
            Statement::MergeNodes {
                key, properties, ..
            } => std::iter::once(key.as_str())
                .chain(properties.iter().map(String::as_str))
                .collect(),
            Statement::MergeRelations {
                anchor_column,
                node_key,
                ..
            } => {
                if anchor_column == node_key {
                    vec![anchor_column.as_str()]
                } else {
                    vec![anchor_column.as_str(), node_key.as_str()]
                }
            }
        }
    }

    /// Render as a Cypher query over `$rows`.
    pub fn to_cypher(&self) -> String {
        match self {
            Statement::DeleteAll => "MATCH (n) DETACH DELETE n RETURN count(n) AS total".to_string(),
            Statement::MergeNodes {
                label,
                key,
                properties,
            } => {
                let mut query = format!(
                    "UNWIND $rows AS row MERGE (n:{label} {{{key}: row.{key}}})",
                );
                if !properties.is_empty() {
                    let sets: Vec<String> = properties
                        .iter()
                        .map(|p| format!("n.{p} = row.{p}"))
                        .collect();
                    query.push_str(" SET ");
                    query.push_str(&sets.join(", "));
                }
                query.push_str(" RETURN count(*) AS total");
                query
            }
            Statement::MergeRelations {
                anchor_label,
                anchor_key,
                anchor_column,
                node_label,
                node_key,
                relation,
            } => format!(
                "UNWIND $rows AS row \
                 MATCH (a:{anchor_label} {{{anchor_key}: row.{anchor_column}}}), \
                 (b:{node_label} {{{node_key}: row.{node_key}}}) \
                 MERGE (a)-[:{relation}]->(b) RETURN count(*) AS total"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medgraph_core::Labels;

    fn gene_meta() -> NodeTableMeta {
        NodeTableMeta::new("Gene", Labels::single("Gene"), "gene")
            .with_source(Labels::multiple(["UMLS", "Concept"]), "CUI", "source")
            .with_attributes(["symbol", "gene"])
    }

    #[test]
    fn test_merge_nodes_cypher() {
        let statement = Statement::merge_nodes(&gene_meta(), "Gene").unwrap();
        assert_eq!(
            statement.to_cypher(),
            "UNWIND $rows AS row MERGE (n:Gene {gene: row.gene}) SET n.symbol = row.symbol RETURN count(*) AS total"
        );
        assert_eq!(statement.bound_columns(), vec!["gene", "symbol"]);
    }

    #[test]
    fn test_merge_anchor_cypher() {
        let statement = Statement::merge_anchor("SearchTerm", "label").unwrap();
        assert_eq!(
            statement.to_cypher(),
            "UNWIND $rows AS row MERGE (n:SearchTerm {label: row.label}) RETURN count(*) AS total"
        );
    }

    #[test]
    fn test_merge_relations_cypher() {
        let statement = Statement::merge_relations(&gene_meta(), "Gene", "UMLS", "CONTAINS").unwrap();
        assert_eq!(
            statement.to_cypher(),
            "UNWIND $rows AS row MATCH (a:UMLS {CUI: row.source}), (b:Gene {gene: row.gene}) \
             MERGE (a)-[:CONTAINS]->(b) RETURN count(*) AS total"
        );
        assert_eq!(statement.bound_columns(), vec!["source", "gene"]);
    }

    #[test]
    fn test_undeclared_labels_are_refused() {
        assert!(Statement::merge_nodes(&gene_meta(), "Protein").is_err());
        assert!(Statement::merge_relations(&gene_meta(), "Gene", "Paper", "CONTAINS").is_err());

        let unanchored = NodeTableMeta::new("Gene", Labels::single("Gene"), "gene");
        assert!(Statement::merge_relations(&unanchored, "Gene", "UMLS", "CONTAINS").is_err());
    }

    #[test]
    fn test_injection_is_refused() {
        assert!(Statement::merge_anchor("SearchTerm}) DETACH DELETE n //", "label").is_err());
        assert!(Statement::merge_relations(&gene_meta(), "Gene", "UMLS", "CONTAINS]->(x").is_err());

        let mut meta = gene_meta();
        meta.attribute_cols = vec!["x = 1, n.y".to_string()];
        assert!(Statement::merge_nodes(&meta, "Gene").is_err());
    }

    #[test]
    fn test_delete_all() {
        assert!(Statement::DeleteAll.bound_columns().is_empty());
        assert!(Statement::DeleteAll.to_cypher().contains("DETACH DELETE"));
    }
}
