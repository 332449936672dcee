use std::collections::HashMap;

use super::models::{
    FactorId, FactorKind, FactorNode, Node, NodeRef, Potential, VariableId, VariableNode,
};
use crate::common::errors::{InferenceError, Result};

/// Owns every node of a factor graph. Nodes refer to their neighbors by id,
/// so wiring happens here rather than inside the nodes themselves.
#[derive(Debug, Clone, Default)]
pub struct FactorGraph {
    variables: Vec<VariableNode>,
    factors: Vec<FactorNode>,
    names: HashMap<String, VariableId>,
}

impl FactorGraph {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub fn variables(&self) -> &[VariableNode] {
        &self.variables
    }

    pub fn factors(&self) -> &[FactorNode] {
        &self.factors
    }

    pub fn variable_ids(&self) -> impl Iterator<Item = VariableId> + '_ {
        (0..self.variables.len()).map(VariableId)
    }

    pub fn factor_ids(&self) -> impl Iterator<Item = FactorId> + '_ {
        (0..self.factors.len()).map(FactorId)
    }

    pub fn variable(&self, id: VariableId) -> Result<&VariableNode> {
        self.variables
            .get(id.0)
            .ok_or(InferenceError::UnknownVariableId(id.0))
    }

    pub fn factor(&self, id: FactorId) -> Result<&FactorNode> {
        self.factors
            .get(id.0)
            .ok_or(InferenceError::UnknownFactorId(id.0))
    }

    pub(crate) fn variable_mut(&mut self, id: VariableId) -> Result<&mut VariableNode> {
        self.variables
            .get_mut(id.0)
            .ok_or(InferenceError::UnknownVariableId(id.0))
    }

    pub(crate) fn factor_mut(&mut self, id: FactorId) -> Result<&mut FactorNode> {
        self.factors
            .get_mut(id.0)
            .ok_or(InferenceError::UnknownFactorId(id.0))
    }

    /// Looks a variable up by the name it was declared with.
    pub fn variable_id(&self, name: &str) -> Result<VariableId> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| InferenceError::UnknownVariable(name.to_string()))
    }

    pub fn node_name(&self, node: NodeRef) -> Result<&str> {
        match node {
            NodeRef::Variable(id) => Ok(self.variable(id)?.name()),
            NodeRef::Factor(id) => Ok(self.factor(id)?.name()),
        }
    }

    pub fn degree(&self, node: NodeRef) -> Result<usize> {
        match node {
            NodeRef::Variable(id) => Ok(self.variable(id)?.degree()),
            NodeRef::Factor(id) => Ok(self.factor(id)?.degree()),
        }
    }

    /// Degree-one nodes, variables first, each in insertion order.
    pub fn leaves(&self) -> Vec<NodeRef> {
        let variables = self
            .variable_ids()
            .filter(|id| self.variables[id.0].degree() == 1)
            .map(NodeRef::Variable);
        let factors = self
            .factor_ids()
            .filter(|id| self.factors[id.0].degree() == 1)
            .map(NodeRef::Factor);
        variables.chain(factors).collect()
    }

    /// True when the graph has no cycles, i.e. every connected component is a
    /// tree. Sum-product marginals are exact only in that case.
    pub fn is_forest(&self) -> bool {
        // Union-find over variables followed by factors
        let offset = self.variables.len();
        let mut parent: Vec<usize> = (0..offset + self.factors.len()).collect();

        fn root(parent: &mut [usize], mut node: usize) -> usize {
            while parent[node] != node {
                parent[node] = parent[parent[node]];
                node = parent[node];
            }
            node
        }

        for (f, factor) in self.factors.iter().enumerate() {
            for variable in factor.scope() {
                let a = root(&mut parent, offset + f);
                let b = root(&mut parent, variable.0);
                if a == b {
                    return false;
                }
                parent[a] = b;
            }
        }
        true
    }

    pub(crate) fn insert_variable(&mut self, name: &str, domain_size: usize) -> Result<VariableId> {
        if domain_size == 0 {
            return Err(InferenceError::EmptyDomain(name.to_string()));
        }
        if self.names.contains_key(name) {
            return Err(InferenceError::DuplicateVariable(name.to_string()));
        }
        let id = VariableId(self.variables.len());
        self.variables.push(VariableNode::new(name, domain_size));
        self.names.insert(name.to_string(), id);
        Ok(id)
    }

    /// Adds a factor and wires it to `scope` in both directions. The
    /// potential must already have been checked against the scope.
    pub(crate) fn insert_factor(
        &mut self,
        name: &str,
        scope: &[VariableId],
        potential: Potential,
        kind: FactorKind,
    ) -> Result<FactorId> {
        for &variable in scope {
            self.variable(variable)?;
        }
        let id = FactorId(self.factors.len());
        let mut factor = FactorNode::new(name, potential, kind);
        for &variable in scope {
            let node = self.variable_mut(variable)?;
            node.connect(id);
            factor.connect(variable, node.domain_size());
        }
        self.factors.push(factor);
        Ok(id)
    }
}
