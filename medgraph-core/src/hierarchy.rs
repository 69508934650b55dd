//! Stage dependency hierarchy.
//!
//! Stages declare the stage they depend on; the hierarchy turns those
//! declarations into a directed graph (predecessor → stage), orders it, and
//! checks requested stage sets against it.
//!
//! The check is adjacency only: a requested stage needs its immediate
//! predecessor requested too. A gap two levels back is reported by whichever
//! requested stage sits nearest to it.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

use crate::error::{Error, Result};

/// Stage names of the default biomedical pipeline, in dependency order.
pub const PIPE_HIERARCHY: [&str; 4] = ["pubmed", "ner", "medGen", "uniProt"];

#[derive(Debug, Clone)]
pub struct StageHierarchy {
    graph: DiGraph<String, ()>,
    index: HashMap<String, NodeIndex>,
    order: Vec<String>,
}

impl StageHierarchy {
    /// Build from `(stage, depends_on)` declarations.
    ///
    /// Fails if a stage names an undeclared predecessor or the declarations
    /// form a cycle.
    pub fn from_declarations<'a, I>(declarations: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        let declarations: Vec<(&str, Option<&str>)> = declarations.into_iter().collect();
        let mut graph = DiGraph::new();
        let mut index = HashMap::with_capacity(declarations.len());

        for (stage, _) in &declarations {
            if index.contains_key(*stage) {
                return Err(Error::ContractViolation(format!(
                    "pipe '{}' is declared twice",
                    stage
                )));
            }
            let idx = graph.add_node(stage.to_string());
            index.insert(stage.to_string(), idx);
        }

        for (stage, predecessor) in &declarations {
            if let Some(predecessor) = predecessor {
                let Some(&from) = index.get(*predecessor) else {
                    return Err(Error::ContractViolation(format!(
                        "pipe '{}' depends on undeclared pipe '{}'",
                        stage, predecessor
                    )));
                };
                graph.add_edge(from, index[*stage], ());
            }
        }

        let order = toposort(&graph, None)
            .map_err(|cycle| {
                Error::ContractViolation(format!(
                    "pipe dependencies form a cycle through '{}'",
                    graph[cycle.node_id()]
                ))
            })?
            .into_iter()
            .map(|idx| graph[idx].clone())
            .collect();

        Ok(Self {
            graph,
            index,
            order,
        })
    }

    /// A chain where every stage depends on the one before it.
    pub fn linear(stages: &[&str]) -> Self {
        let mut graph = DiGraph::new();
        let mut index = HashMap::with_capacity(stages.len());
        let mut previous: Option<NodeIndex> = None;
        for stage in stages {
            let idx = graph.add_node(stage.to_string());
            index.insert(stage.to_string(), idx);
            if let Some(prev) = previous {
                graph.add_edge(prev, idx, ());
            }
            previous = Some(idx);
        }
        Self {
            graph,
            index,
            order: stages.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Stages in dependency order.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn contains(&self, stage: &str) -> bool {
        self.index.contains_key(stage)
    }

    /// The stage `stage` directly depends on.
    pub fn predecessor(&self, stage: &str) -> Option<&str> {
        let idx = *self.index.get(stage)?;
        self.graph
            .neighbors_directed(idx, petgraph::Direction::Incoming)
            .next()
            .map(|p| self.graph[p].as_str())
    }

    /// Check that no requested stage is missing its immediate predecessor.
    ///
    /// Walks the stages from the last one back, so the reported gap is the one
    /// nearest the end of the hierarchy.
    pub fn check<S: AsRef<str>>(&self, requested: &[S]) -> Result<()> {
        let requested: Vec<&str> = requested.iter().map(AsRef::as_ref).collect();
        if let Some(unknown) = requested.iter().find(|s| !self.contains(s)) {
            return Err(Error::UnknownStage(unknown.to_string()));
        }

        for stage in self.order.iter().rev() {
            if !requested.contains(&stage.as_str()) {
                continue;
            }
            if let Some(predecessor) = self.predecessor(stage) {
                if !requested.contains(&predecessor) {
                    return Err(Error::MissingDependency {
                        stage: stage.clone(),
                        predecessor: predecessor.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl Default for StageHierarchy {
    fn default() -> Self {
        Self::linear(&PIPE_HIERARCHY)
    }
}
