use log::debug;

use super::propagation::{PropagationReport, Propagator};
use crate::common::errors::{InferenceError, Result};
use crate::graph::builder::check_entries;
use crate::graph::factor_graph::FactorGraph;
use crate::graph::models::{FactorId, FactorKind, Message, Node, NodeRef, VariableId};

/// Indicator vector for `state` out of `domain_size` states of `variable`.
pub fn one_hot(variable: &str, domain_size: usize, state: usize) -> Result<Message> {
    if state >= domain_size {
        return Err(InferenceError::StateOutOfRange {
            variable: variable.to_string(),
            state,
            domain_size,
        });
    }
    let mut message = Message::zeros(domain_size);
    message[state] = 1.0;
    Ok(message)
}

/// Wires a new evidence factor with potential `likelihood` onto `variable`
/// and marks the variable observed. Nothing is propagated.
pub fn attach_evidence(
    graph: &mut FactorGraph,
    variable: VariableId,
    likelihood: Message,
) -> Result<FactorId> {
    let node = graph.variable(variable)?;
    let name = node.name().to_string();
    if likelihood.len() != node.domain_size() {
        return Err(InferenceError::EvidenceMismatch {
            variable: name,
            expected: node.domain_size(),
            found: likelihood.len(),
        });
    }
    check_entries(&name, likelihood.iter())?;

    let factor = graph.insert_factor(
        &format!("evidence({})", name),
        &[variable],
        likelihood.clone().into_dyn(),
        FactorKind::Evidence,
    )?;
    graph
        .variable_mut(variable)?
        .record_observation(factor, &likelihood);
    debug!("Attached evidence {} to '{}'", likelihood, name);
    Ok(factor)
}

impl Propagator {
    /// Attaches evidence to `variable` and cascades it from the new evidence
    /// factor's initial ding.
    pub fn observe(
        &mut self,
        graph: &mut FactorGraph,
        variable: VariableId,
        likelihood: Message,
    ) -> Result<PropagationReport> {
        let factor = attach_evidence(graph, variable, likelihood)?;
        self.reset(graph);
        self.initial_ding(graph, NodeRef::Factor(factor))?;
        self.run(graph)
    }

    /// Observes `variable` to be in exactly `state`.
    pub fn observe_state(
        &mut self,
        graph: &mut FactorGraph,
        variable: VariableId,
        state: usize,
    ) -> Result<PropagationReport> {
        let node = graph.variable(variable)?;
        let likelihood = one_hot(node.name(), node.domain_size(), state)?;
        self.observe(graph, variable, likelihood)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::setup::PropagationConfig;
    use crate::graph::builder::FactorGraphBuilder;
    use crate::graph::models::VariableState;
    use ndarray::array;

    fn single() -> (FactorGraph, VariableId) {
        let mut builder = FactorGraphBuilder::new();
        let x = builder.add_variable("x", 3).unwrap();
        builder
            .add_factor("prior", &[x], array![0.2, 0.3, 0.5].into_dyn())
            .unwrap();
        (builder.build().unwrap(), x)
    }

    #[test]
    fn test_one_hot() {
        assert_eq!(one_hot("x", 3, 1).unwrap(), array![0.0, 1.0, 0.0]);
        assert!(matches!(
            one_hot("x", 3, 3),
            Err(InferenceError::StateOutOfRange { state: 3, domain_size: 3, .. })
        ));
    }

    #[test]
    fn test_attach_evidence_wires_degree_one_factor() {
        let (mut graph, x) = single();
        let factor = attach_evidence(&mut graph, x, array![1.0, 0.5, 0.0]).unwrap();

        let evidence = graph.factor(factor).unwrap();
        assert_eq!(evidence.kind(), FactorKind::Evidence);
        assert_eq!(evidence.scope(), vec![x]);
        assert_eq!(evidence.potential(), &array![1.0, 0.5, 0.0].into_dyn());

        let node = graph.variable(x).unwrap();
        assert_eq!(node.degree(), 2);
        assert!(matches!(node.state(), VariableState::Observed { evidence, .. } if evidence == &vec![factor]));
    }

    #[test]
    fn test_attach_evidence_validates_likelihood() {
        let (mut graph, x) = single();
        assert!(matches!(
            attach_evidence(&mut graph, x, array![1.0, 0.0]),
            Err(InferenceError::EvidenceMismatch { expected: 3, found: 2, .. })
        ));
        assert!(matches!(
            attach_evidence(&mut graph, x, array![1.0, -1.0, 0.0]),
            Err(InferenceError::InvalidPotential { .. })
        ));
        // A rejected observation leaves the graph untouched
        assert_eq!(graph.factors().len(), 1);
        assert!(!graph.variable(x).unwrap().is_observed());
    }

    #[test]
    fn test_observe_state_pins_posterior() {
        let (mut graph, x) = single();
        let mut propagator = Propagator::new(PropagationConfig::default()).unwrap();
        propagator.propagate(&mut graph).unwrap();

        let report = propagator.observe_state(&mut graph, x, 2).unwrap();
        assert!(report.converged);
        assert_eq!(graph.variable(x).unwrap().posterior(), array![0.0, 0.0, 1.0]);

        assert!(matches!(
            propagator.observe_state(&mut graph, x, 3),
            Err(InferenceError::StateOutOfRange { .. })
        ));
    }
}
