use serde::{Deserialize, Serialize};

use crate::common::errors::Result;
use crate::graph::factor_graph::FactorGraph;
use crate::graph::models::Node;

/// Posterior of one variable at the time the table was taken.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarginalEntry {
    pub variable: String,
    pub observed: bool,
    /// Set when the unnormalized belief fell below the normalization floor.
    pub degenerate: bool,
    pub posterior: Vec<f64>,
}

/// Snapshot of every variable's posterior, in declaration order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MarginalTable {
    entries: Vec<MarginalEntry>,
}

impl MarginalTable {
    pub fn from_graph(graph: &FactorGraph) -> Self {
        let entries = graph
            .variables()
            .iter()
            .map(|variable| MarginalEntry {
                variable: variable.name().to_string(),
                observed: variable.is_observed(),
                degenerate: variable.is_degenerate(),
                posterior: variable.posterior().to_vec(),
            })
            .collect();
        MarginalTable { entries }
    }

    pub fn get(&self, variable: &str) -> Option<&[f64]> {
        self.entry(variable).map(|entry| entry.posterior.as_slice())
    }

    pub fn entry(&self, variable: &str) -> Option<&MarginalEntry> {
        self.entries.iter().find(|entry| entry.variable == variable)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MarginalEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
