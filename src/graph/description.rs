use anyhow::{Context, Result as AnyResult};
use ndarray::IxDyn;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::builder::FactorGraphBuilder;
use super::factor_graph::FactorGraph;
use super::models::Potential;
use crate::common::errors::{InferenceError, Result};
use crate::common::setup::PropagationConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariableDescription {
    pub name: String,
    /// Number of states in the variable's domain.
    pub states: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactorDescription {
    pub name: String,
    /// Variable names in axis order.
    pub variables: Vec<String>,
    /// Potential values in row-major order (last variable varies fastest).
    pub table: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvidenceDescription {
    pub variable: String,
    pub likelihood: Vec<f64>,
}

/// Serializable description of a network: topology, potentials, optional
/// evidence and optional propagation settings.
///
/// ```
/// # use beliefprop::graph::description::NetworkDescription;
/// let description = NetworkDescription::from_json_str(r#"{
///     "variables": [{"name": "rain", "states": 2}],
///     "factors": [{"name": "prior", "variables": ["rain"], "table": [0.3, 0.7]}]
/// }"#).unwrap();
/// let graph = description.build().unwrap();
/// assert_eq!(graph.variables().len(), 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkDescription {
    pub variables: Vec<VariableDescription>,
    pub factors: Vec<FactorDescription>,
    #[serde(default)]
    pub evidence: Vec<EvidenceDescription>,
    #[serde(default)]
    pub config: Option<PropagationConfig>,
}

impl NetworkDescription {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> AnyResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read network description {}", path.display()))?;
        let description = Self::from_json_str(&text)
            .with_context(|| format!("Failed to parse network description {}", path.display()))?;
        Ok(description)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Builds the graph without applying evidence. Evidence is applied by
    /// `BayesianNetwork::from_description` after the initial propagation.
    pub fn build(&self) -> Result<FactorGraph> {
        let mut builder = FactorGraphBuilder::new();
        for variable in &self.variables {
            builder.add_variable(&variable.name, variable.states)?;
        }
        for factor in &self.factors {
            let scope = factor
                .variables
                .iter()
                .map(|name| builder.variable_id(name))
                .collect::<Result<Vec<_>>>()?;
            let shape = scope
                .iter()
                .map(|&id| builder.domain_size(id))
                .collect::<Result<Vec<_>>>()?;
            let expected: usize = shape.iter().product();
            if factor.table.len() != expected {
                return Err(InferenceError::TableSize {
                    name: factor.name.clone(),
                    expected,
                    found: factor.table.len(),
                });
            }
            let potential = Potential::from_shape_vec(IxDyn(&shape), factor.table.clone())
                .map_err(|_| InferenceError::TableSize {
                    name: factor.name.clone(),
                    expected,
                    found: factor.table.len(),
                })?;
            builder.add_factor(&factor.name, &scope, potential)?;
        }
        builder.build()
    }
}
