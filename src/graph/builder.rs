use log::debug;
use std::collections::{HashMap, HashSet};

use super::factor_graph::FactorGraph;
use super::models::{FactorId, FactorKind, Potential, VariableId};
use crate::common::errors::{InferenceError, Result};

struct PendingFactor {
    name: String,
    scope: Vec<VariableId>,
    potential: Potential,
}

/// Collects variable and factor declarations, validates each factor as it is
/// added, and wires the whole graph in [`FactorGraphBuilder::build`].
///
/// Variables must be declared before the factors that use them.
#[derive(Default)]
pub struct FactorGraphBuilder {
    variables: Vec<(String, usize)>,
    names: HashMap<String, VariableId>,
    factors: Vec<PendingFactor>,
}

impl FactorGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_variable(&mut self, name: &str, domain_size: usize) -> Result<VariableId> {
        if domain_size == 0 {
            return Err(InferenceError::EmptyDomain(name.to_string()));
        }
        if self.names.contains_key(name) {
            return Err(InferenceError::DuplicateVariable(name.to_string()));
        }
        let id = VariableId(self.variables.len());
        self.variables.push((name.to_string(), domain_size));
        self.names.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn variable_id(&self, name: &str) -> Result<VariableId> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| InferenceError::UnknownVariable(name.to_string()))
    }

    pub fn domain_size(&self, id: VariableId) -> Result<usize> {
        self.variables
            .get(id.0)
            .map(|(_, size)| *size)
            .ok_or(InferenceError::UnknownVariableId(id.0))
    }

    /// Declares a factor over `scope`. Axis `i` of `potential` must have
    /// extent equal to the domain size of `scope[i]`.
    pub fn add_factor(
        &mut self,
        name: &str,
        scope: &[VariableId],
        potential: Potential,
    ) -> Result<FactorId> {
        if scope.is_empty() {
            return Err(InferenceError::EmptyScope(name.to_string()));
        }
        let extents = scope
            .iter()
            .map(|&id| self.domain_size(id))
            .collect::<Result<Vec<_>>>()?;
        let mut seen = HashSet::new();
        for &variable in scope {
            if !seen.insert(variable) {
                let (variable_name, _) = &self.variables[variable.0];
                return Err(InferenceError::RepeatedVariable {
                    factor: name.to_string(),
                    variable: variable_name.clone(),
                });
            }
        }
        check_potential(name, &potential, &extents)?;

        let id = FactorId(self.factors.len());
        self.factors.push(PendingFactor {
            name: name.to_string(),
            scope: scope.to_vec(),
            potential,
        });
        Ok(id)
    }

    /// Wires every declared factor to its variables. Ids handed out by the
    /// builder stay valid in the returned graph.
    pub fn build(self) -> Result<FactorGraph> {
        let mut graph = FactorGraph::new();
        for (name, domain_size) in &self.variables {
            graph.insert_variable(name, *domain_size)?;
        }
        for factor in self.factors {
            graph.insert_factor(&factor.name, &factor.scope, factor.potential, FactorKind::Potential)?;
        }
        debug!(
            "Built factor graph with {} variables and {} factors",
            graph.variables().len(),
            graph.factors().len()
        );
        Ok(graph)
    }
}

/// Checks rank, axis extents and entries of a potential. Entries must be
/// finite and non-negative.
pub(crate) fn check_potential(name: &str, potential: &Potential, extents: &[usize]) -> Result<()> {
    if potential.ndim() != extents.len() {
        return Err(InferenceError::RankMismatch {
            factor: name.to_string(),
            expected: extents.len(),
            found: potential.ndim(),
        });
    }
    for (axis, (&found, &expected)) in potential.shape().iter().zip(extents).enumerate() {
        if found != expected {
            return Err(InferenceError::ShapeMismatch {
                factor: name.to_string(),
                axis,
                expected,
                found,
            });
        }
    }
    check_entries(name, potential.iter())
}

pub(crate) fn check_entries<'a>(name: &str, values: impl Iterator<Item = &'a f64>) -> Result<()> {
    for &value in values {
        if !value.is_finite() || value < 0.0 {
            return Err(InferenceError::InvalidPotential {
                name: name.to_string(),
                reason: format!("entries must be finite and non-negative, found {}", value),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::models::{Node, NodeRef};
    use ndarray::{Array, array};

    fn two_binary() -> (FactorGraphBuilder, VariableId, VariableId) {
        let mut builder = FactorGraphBuilder::new();
        let a = builder.add_variable("a", 2).unwrap();
        let b = builder.add_variable("b", 3).unwrap();
        (builder, a, b)
    }

    #[test]
    fn test_shape_mismatch_fails_construction() {
        let (mut builder, a, b) = two_binary();
        let wrong = Array::ones((2, 2)).into_dyn();
        let err = builder.add_factor("ab", &[a, b], wrong).unwrap_err();
        assert!(matches!(
            err,
            InferenceError::ShapeMismatch { axis: 1, expected: 3, found: 2, .. }
        ));
    }

    #[test]
    fn test_rank_mismatch_fails_construction() {
        let (mut builder, a, b) = two_binary();
        let err = builder
            .add_factor("ab", &[a, b], array![0.5, 0.5].into_dyn())
            .unwrap_err();
        assert!(matches!(
            err,
            InferenceError::RankMismatch { expected: 2, found: 1, .. }
        ));
    }

    #[test]
    fn test_rejects_bad_declarations() {
        let (mut builder, a, _) = two_binary();
        assert!(matches!(
            builder.add_variable("a", 4),
            Err(InferenceError::DuplicateVariable(_))
        ));
        assert!(matches!(
            builder.add_variable("empty", 0),
            Err(InferenceError::EmptyDomain(_))
        ));
        assert!(matches!(
            builder.add_factor("none", &[], array![1.0].into_dyn()),
            Err(InferenceError::EmptyScope(_))
        ));
        assert!(matches!(
            builder.add_factor("aa", &[a, a], Array::ones((2, 2)).into_dyn()),
            Err(InferenceError::RepeatedVariable { .. })
        ));
        assert!(matches!(
            builder.add_factor("neg", &[a], array![0.5, -0.5].into_dyn()),
            Err(InferenceError::InvalidPotential { .. })
        ));
        assert!(matches!(
            builder.add_factor("nan", &[a], array![f64::NAN, 1.0].into_dyn()),
            Err(InferenceError::InvalidPotential { .. })
        ));
        assert!(matches!(
            builder.add_factor("ghost", &[VariableId(9)], array![1.0].into_dyn()),
            Err(InferenceError::UnknownVariableId(9))
        ));
    }

    #[test]
    fn test_build_wires_both_directions() {
        let (mut builder, a, b) = two_binary();
        let prior = builder.add_factor("A", &[a], array![0.3, 0.7].into_dyn()).unwrap();
        let pair = builder
            .add_factor("AB", &[a, b], Array::ones((2, 3)).into_dyn())
            .unwrap();
        let graph = builder.build().unwrap();

        let var_a = graph.variable(a).unwrap();
        assert_eq!(var_a.name(), "a");
        let slots: Vec<FactorId> = var_a.edges().iter().map(|e| e.neighbor()).collect();
        assert_eq!(slots, vec![prior, pair]);
        assert!(var_a.edges().iter().all(|e| e.message() == &array![1.0, 1.0]));

        let factor = graph.factor(pair).unwrap();
        assert_eq!(factor.scope(), vec![a, b]);
        assert_eq!(factor.edges()[1].message().len(), 3);
        assert_eq!(factor.kind(), FactorKind::Potential);

        assert_eq!(graph.variable_id("b").unwrap(), b);
        assert_eq!(graph.degree(NodeRef::Variable(a)).unwrap(), 2);
        assert_eq!(graph.degree(NodeRef::Factor(pair)).unwrap(), 2);
        assert_eq!(graph.leaves(), vec![NodeRef::Variable(b), NodeRef::Factor(prior)]);
        assert!(graph.is_forest());
    }

    #[test]
    fn test_cycle_is_not_a_forest() {
        let (mut builder, a, b) = two_binary();
        builder.add_factor("AB1", &[a, b], Array::ones((2, 3)).into_dyn()).unwrap();
        builder.add_factor("AB2", &[a, b], Array::ones((2, 3)).into_dyn()).unwrap();
        assert!(!builder.build().unwrap().is_forest());
    }
}
