//! Exact marginals by brute-force enumeration of the joint state space.
//!
//! Exponential in the number of variables, so only useful for small graphs:
//! checking propagation results, or getting exact answers on small graphs
//! with cycles where sum-product is only approximate.

use ndarray::IxDyn;

use super::messages::normalize;
use crate::common::errors::{InferenceError, Result};
use crate::graph::factor_graph::FactorGraph;
use crate::graph::models::Message;

/// Largest joint state space `joint_marginals` will walk.
pub const MAX_ENUMERATION_STATES: usize = 1 << 22;

/// Normalized marginal of every variable (indexed like `graph.variables()`)
/// under the product of all factors, evidence factors included.
pub fn joint_marginals(graph: &FactorGraph) -> Result<Vec<Message>> {
    let sizes: Vec<usize> = graph.variables().iter().map(|v| v.domain_size()).collect();
    let states = sizes
        .iter()
        .try_fold(1usize, |acc, &size| acc.checked_mul(size))
        .unwrap_or(usize::MAX);
    if states > MAX_ENUMERATION_STATES {
        return Err(InferenceError::EnumerationTooLarge {
            states,
            limit: MAX_ENUMERATION_STATES,
        });
    }

    let scopes: Vec<Vec<usize>> = graph
        .factors()
        .iter()
        .map(|factor| factor.scope().iter().map(|id| id.0).collect())
        .collect();

    let mut marginals: Vec<Message> = sizes.iter().map(|&size| Message::zeros(size)).collect();
    let mut assignment = vec![0usize; sizes.len()];
    let mut index = Vec::new();
    for _ in 0..states {
        let mut weight = 1.0;
        for (factor, scope) in graph.factors().iter().zip(&scopes) {
            index.clear();
            index.extend(scope.iter().map(|&variable| assignment[variable]));
            weight *= factor.potential()[IxDyn(&index)];
        }
        for (variable, &state) in assignment.iter().enumerate() {
            marginals[variable][state] += weight;
        }

        // Odometer increment, first variable fastest
        for (slot, &size) in assignment.iter_mut().zip(&sizes) {
            *slot += 1;
            if *slot < size {
                break;
            }
            *slot = 0;
        }
    }

    Ok(marginals.iter().map(normalize).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::builder::FactorGraphBuilder;
    use ndarray::array;

    #[test]
    fn test_two_variable_joint() {
        let mut builder = FactorGraphBuilder::new();
        let a = builder.add_variable("a", 2).unwrap();
        let b = builder.add_variable("b", 2).unwrap();
        builder.add_factor("prior", &[a], array![0.25, 0.75].into_dyn()).unwrap();
        builder
            .add_factor("pair", &[a, b], array![[0.9, 0.1], [0.2, 0.8]].into_dyn())
            .unwrap();
        let graph = builder.build().unwrap();

        let marginals = joint_marginals(&graph).unwrap();
        assert!((marginals[0][0] - 0.25).abs() < 1e-12);
        assert!((marginals[1][0] - 0.375).abs() < 1e-12);
        assert!((marginals[1][1] - 0.625).abs() < 1e-12);
    }

    #[test]
    fn test_refuses_huge_state_space() {
        let mut builder = FactorGraphBuilder::new();
        for i in 0..30 {
            builder.add_variable(&format!("x{}", i), 2).unwrap();
        }
        let graph = builder.build().unwrap();
        assert!(matches!(
            joint_marginals(&graph),
            Err(InferenceError::EnumerationTooLarge { .. })
        ));
    }
}
