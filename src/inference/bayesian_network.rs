use anyhow::{Context, Result as AnyResult};
use log::{info, warn};
use std::path::Path;

use super::propagation::{PropagationReport, Propagator};
use super::table::MarginalTable;
use crate::common::errors::Result;
use crate::common::setup::PropagationConfig;
use crate::graph::description::NetworkDescription;
use crate::graph::factor_graph::FactorGraph;
use crate::graph::models::{Message, Node};

/// BayesianNetwork provides a simplified interface over a factor graph and its propagator.
/// Names are used instead of ids, and the initial sweep runs on demand.
pub struct BayesianNetwork {
    /// The graph holding every node and message
    graph: FactorGraph,
    /// The worklist scheduler driving message updates
    propagator: Propagator,
    /// Whether the initial sweep from every degree-one node has run
    initialized: bool,
}

impl BayesianNetwork {
    pub fn new(graph: FactorGraph, config: PropagationConfig) -> Result<Self> {
        let propagator = Propagator::new(config)?;
        Ok(BayesianNetwork {
            graph,
            propagator,
            initialized: false,
        })
    }

    /// Builds the described graph, runs the initial sweep, then applies the
    /// described evidence in order.
    pub fn from_description(description: &NetworkDescription) -> Result<Self> {
        let graph = description.build()?;
        let config = description.config.clone().unwrap_or_default();
        let mut network = BayesianNetwork::new(graph, config)?;
        network.run_inference()?;
        for evidence in &description.evidence {
            network.observe(&evidence.variable, &evidence.likelihood)?;
        }
        Ok(network)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> AnyResult<Self> {
        let path = path.as_ref();
        let description = NetworkDescription::from_file(path)?;
        let network = Self::from_description(&description)
            .with_context(|| format!("Failed to build network from {}", path.display()))?;
        Ok(network)
    }

    /// Runs a full sweep from every degree-one node.
    pub fn run_inference(&mut self) -> Result<PropagationReport> {
        info!(
            "Running inference over {} variables and {} factors",
            self.graph.variables().len(),
            self.graph.factors().len()
        );
        let report = self.propagator.propagate(&mut self.graph)?;
        self.initialized = true;
        Ok(report)
    }

    /// Attaches a likelihood vector to `variable` and propagates it.
    pub fn observe(&mut self, variable: &str, likelihood: &[f64]) -> Result<PropagationReport> {
        let id = self.graph.variable_id(variable)?;
        self.ensure_initialized()?;
        info!("Observing '{}' with likelihood {:?}", variable, likelihood);
        let report = self
            .propagator
            .observe(&mut self.graph, id, Message::from(likelihood.to_vec()))?;
        self.warn_degenerate();
        Ok(report)
    }

    /// Observes `variable` to be in exactly `state`.
    pub fn observe_state(&mut self, variable: &str, state: usize) -> Result<PropagationReport> {
        let id = self.graph.variable_id(variable)?;
        self.ensure_initialized()?;
        info!("Observing '{}' in state {}", variable, state);
        let report = self.propagator.observe_state(&mut self.graph, id, state)?;
        self.warn_degenerate();
        Ok(report)
    }

    /// Normalized posterior of `variable`.
    pub fn posterior(&self, variable: &str) -> Result<Message> {
        let id = self.graph.variable_id(variable)?;
        Ok(self.graph.variable(id)?.posterior())
    }

    /// Latest message from each factor connected to `variable`, keyed by factor name.
    pub fn incoming_messages(&self, variable: &str) -> Result<Vec<(String, Message)>> {
        let id = self.graph.variable_id(variable)?;
        self.graph
            .variable(id)?
            .incoming_messages()
            .into_iter()
            .map(|(factor, message)| {
                let name = self.graph.factor(factor)?.name().to_string();
                Ok((name, message.clone()))
            })
            .collect()
    }

    pub fn is_observed(&self, variable: &str) -> Result<bool> {
        let id = self.graph.variable_id(variable)?;
        Ok(self.graph.variable(id)?.is_observed())
    }

    pub fn marginals(&self) -> MarginalTable {
        MarginalTable::from_graph(&self.graph)
    }

    pub fn graph(&self) -> &FactorGraph {
        &self.graph
    }

    pub fn config(&self) -> &PropagationConfig {
        self.propagator.config()
    }

    fn ensure_initialized(&mut self) -> Result<()> {
        if !self.initialized {
            self.run_inference()?;
        }
        Ok(())
    }

    fn warn_degenerate(&self) {
        for variable in self.graph.variables() {
            if variable.is_degenerate() {
                warn!(
                    "Posterior of '{}' is degenerate; the evidence is probably contradictory",
                    variable.name()
                );
            }
        }
    }
}
