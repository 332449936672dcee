use ndarray::{Array1, ArrayD};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::inference::messages::{contract_excluding, normalize, product_excluding, relative_delta};

/// A message: one non-negative weight per state of the receiving or sending variable.
pub type Message = Array1<f64>;

/// A factor's potential table, one axis per connected variable.
pub type Potential = ArrayD<f64>;

/// Posteriors divide by `max(NORMALIZATION_FLOOR, sum)` so that contradictory
/// evidence yields a near-zero vector instead of NaNs.
pub const NORMALIZATION_FLOOR: f64 = 1e-5;

/// Index of a variable node inside its `FactorGraph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariableId(pub usize);

/// Index of a factor node inside its `FactorGraph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FactorId(pub usize);

/// Either kind of node, used to address deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Variable(VariableId),
    Factor(FactorId),
}

impl From<VariableId> for NodeRef {
    fn from(id: VariableId) -> Self {
        NodeRef::Variable(id)
    }
}

impl From<FactorId> for NodeRef {
    fn from(id: FactorId) -> Self {
        NodeRef::Factor(id)
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Variable(id) => write!(f, "v{}", id.0),
            NodeRef::Factor(id) => write!(f, "f{}", id.0),
        }
    }
}

/// One slot of a node: the neighbor on the other side and the latest
/// message received from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge<N> {
    neighbor: N,
    message: Message,
    received: bool,
}

impl<N: Copy> Edge<N> {
    /// Placeholder slot holding the uniform message of ones.
    pub(crate) fn new(neighbor: N, domain_size: usize) -> Self {
        Self {
            neighbor,
            message: Message::ones(domain_size),
            received: false,
        }
    }

    pub fn neighbor(&self) -> N {
        self.neighbor
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Whether the neighbor has delivered anything yet, as opposed to the
    /// slot still holding its placeholder.
    pub fn has_received(&self) -> bool {
        self.received
    }

    /// Overwrites the stored message and returns how far it moved, compared
    /// after scaling both to sum to one. The first delivery into a slot always
    /// counts as an infinite change.
    pub(crate) fn receive(&mut self, message: Message) -> f64 {
        let delta = if self.received {
            relative_delta(&self.message, &message)
        } else {
            f64::INFINITY
        };
        self.message = message;
        self.received = true;
        delta
    }
}

/// Common capability of variable and factor nodes.
pub trait Node {
    type Neighbor: Copy + Eq + Into<NodeRef>;

    fn name(&self) -> &str;

    fn edges(&self) -> &[Edge<Self::Neighbor>];

    /// Message this node sends through slot `exclude`, built from every other slot.
    fn calc_message(&self, exclude: usize) -> Message;

    fn degree(&self) -> usize {
        self.edges().len()
    }

    fn slot_of(&self, neighbor: Self::Neighbor) -> Option<usize> {
        self.edges().iter().position(|edge| edge.neighbor == neighbor)
    }
}

/// Write access to a node's slots, reserved for the propagation protocol.
pub(crate) trait Receive: Node {
    fn edge_mut(&mut self, slot: usize) -> &mut Edge<Self::Neighbor>;
}

/// Whether evidence has been applied to a variable.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableState {
    Latent,
    Observed {
        /// Elementwise product of every likelihood attached so far.
        likelihood: Message,
        /// Evidence factors wired onto the variable, in attach order.
        evidence: Vec<FactorId>,
    },
}

/// A discrete random variable. Combines incoming messages by pointwise product.
#[derive(Debug, Clone)]
pub struct VariableNode {
    name: String,
    domain_size: usize,
    edges: Vec<Edge<FactorId>>,
    state: VariableState,
}

impl VariableNode {
    pub(crate) fn new(name: &str, domain_size: usize) -> Self {
        Self {
            name: name.to_string(),
            domain_size,
            edges: Vec::new(),
            state: VariableState::Latent,
        }
    }

    pub fn domain_size(&self) -> usize {
        self.domain_size
    }

    pub fn state(&self) -> &VariableState {
        &self.state
    }

    pub fn is_observed(&self) -> bool {
        matches!(self.state, VariableState::Observed { .. })
    }

    /// Product of all incoming messages, before normalization.
    pub fn belief(&self) -> Message {
        product_excluding(&self.edges, self.domain_size, None)
    }

    /// Normalized product of all incoming messages.
    pub fn posterior(&self) -> Message {
        normalize(&self.belief())
    }

    /// Latest message from each connected factor, in slot order.
    pub fn incoming_messages(&self) -> Vec<(FactorId, &Message)> {
        self.edges
            .iter()
            .map(|edge| (edge.neighbor, &edge.message))
            .collect()
    }

    /// True when the unnormalized belief sums below the normalization floor,
    /// which usually means contradictory evidence.
    pub fn is_degenerate(&self) -> bool {
        self.belief().sum() < NORMALIZATION_FLOOR
    }

    pub(crate) fn connect(&mut self, factor: FactorId) {
        self.edges.push(Edge::new(factor, self.domain_size));
    }

    pub(crate) fn record_observation(&mut self, factor: FactorId, likelihood: &Message) {
        match &mut self.state {
            VariableState::Latent => {
                self.state = VariableState::Observed {
                    likelihood: likelihood.clone(),
                    evidence: vec![factor],
                };
            }
            VariableState::Observed {
                likelihood: combined,
                evidence,
            } => {
                *combined *= likelihood;
                evidence.push(factor);
            }
        }
    }
}

impl Node for VariableNode {
    type Neighbor = FactorId;

    fn name(&self) -> &str {
        &self.name
    }

    fn edges(&self) -> &[Edge<FactorId>] {
        &self.edges
    }

    fn calc_message(&self, exclude: usize) -> Message {
        product_excluding(&self.edges, self.domain_size, Some(exclude))
    }
}

impl Receive for VariableNode {
    fn edge_mut(&mut self, slot: usize) -> &mut Edge<FactorId> {
        &mut self.edges[slot]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FactorKind {
    /// A potential declared as part of the model.
    Potential,
    /// A degree-one factor pinning a variable to an observed likelihood.
    Evidence,
}

/// A potential over a tuple of variables. Combines incoming messages by
/// contracting its tensor.
#[derive(Debug, Clone)]
pub struct FactorNode {
    name: String,
    potential: Potential,
    kind: FactorKind,
    edges: Vec<Edge<VariableId>>,
}

impl FactorNode {
    pub(crate) fn new(name: &str, potential: Potential, kind: FactorKind) -> Self {
        Self {
            name: name.to_string(),
            potential,
            kind,
            edges: Vec::new(),
        }
    }

    pub fn potential(&self) -> &Potential {
        &self.potential
    }

    pub fn kind(&self) -> FactorKind {
        self.kind
    }

    /// Connected variables in axis order.
    pub fn scope(&self) -> Vec<VariableId> {
        self.edges.iter().map(|edge| edge.neighbor).collect()
    }

    pub(crate) fn connect(&mut self, variable: VariableId, domain_size: usize) {
        self.edges.push(Edge::new(variable, domain_size));
    }
}

impl Node for FactorNode {
    type Neighbor = VariableId;

    fn name(&self) -> &str {
        &self.name
    }

    fn edges(&self) -> &[Edge<VariableId>] {
        &self.edges
    }

    fn calc_message(&self, exclude: usize) -> Message {
        contract_excluding(&self.potential, &self.edges, exclude)
    }
}

impl Receive for FactorNode {
    fn edge_mut(&mut self, slot: usize) -> &mut Edge<VariableId> {
        &mut self.edges[slot]
    }
}
