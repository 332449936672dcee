//! The notify/respond protocol that floods messages through a factor graph.
//!
//! A node that receives a message stores it, recomputes the message for
//! every other neighbor and notifies them in turn. Deliveries wait in a FIFO
//! worklist, so a cascade proceeds breadth-first on an explicit queue rather
//! than on the call stack.
//!
//! On a tree the cascade ends by itself at the degree-one nodes and leaves
//! every directed edge holding its exact sum-product message. On a graph with
//! cycles it ends when every delivery stops changing its slot by more than
//! `tolerance`, or when the hop limit or delivery budget runs out; the result
//! is then an approximation and is reported as such.

use log::{debug, trace, warn};
use serde::Serialize;
use std::collections::VecDeque;

use super::messages::rescale;
use crate::common::errors::{InferenceError, Result};
use crate::common::setup::PropagationConfig;
use crate::graph::factor_graph::FactorGraph;
use crate::graph::models::{Message, Node, NodeRef, Receive};

/// A message in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub from: NodeRef,
    pub to: NodeRef,
    pub message: Message,
    /// Hops travelled since the initial ding, including this one.
    pub depth: usize,
}

/// Outcome of one propagation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PropagationReport {
    /// Deliveries taken off the worklist and stored.
    pub deliveries: usize,
    /// Deliveries stored without being forwarded because they did not change their slot.
    pub absorbed: usize,
    /// Notifications discarded at the hop limit.
    pub dropped: usize,
    /// Deepest delivery processed.
    pub max_depth: usize,
    /// False when the hop limit or delivery budget cut the run short.
    pub converged: bool,
    /// Whether the graph had no cycles when the run started.
    pub forest: bool,
}

pub struct Propagator {
    config: PropagationConfig,
    queue: VecDeque<Delivery>,
    report: PropagationReport,
}

impl Propagator {
    pub fn new(config: PropagationConfig) -> Result<Self> {
        Ok(Propagator {
            config: config.validate()?,
            queue: VecDeque::new(),
            report: PropagationReport::default(),
        })
    }

    pub fn config(&self) -> &PropagationConfig {
        &self.config
    }

    /// Deliveries waiting to be processed.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Clears the worklist and starts a fresh report for `graph`.
    pub fn reset(&mut self, graph: &FactorGraph) {
        self.queue.clear();
        self.report = PropagationReport {
            forest: graph.is_forest(),
            ..PropagationReport::default()
        };
        if !self.report.forest {
            warn!("Factor graph contains cycles; posteriors are approximate");
            if !self.config.normalize_messages {
                warn!("Messages are not normalized and may underflow around cycles");
            }
        }
    }

    /// Queues `message` from `from` to `to`. A notification at or past the
    /// hop limit is dropped without error.
    pub fn notify(&mut self, from: NodeRef, to: NodeRef, message: Message, depth: usize) {
        if let Some(limit) = self.config.max_hops {
            if depth >= limit {
                trace!("Dropping {} -> {} at hop limit {}", from, to, limit);
                self.report.dropped += 1;
                return;
            }
        }
        let message = if self.config.normalize_messages {
            rescale(message)
        } else {
            message
        };
        self.queue.push_back(Delivery {
            from,
            to,
            message,
            depth: depth + 1,
        });
    }

    /// Stores the delivered message in the receiving node and notifies every
    /// other neighbor with a freshly computed message.
    pub fn respond(&mut self, graph: &mut FactorGraph, delivery: Delivery) -> Result<()> {
        let Delivery {
            from,
            to,
            message,
            depth,
        } = delivery;
        trace!("{} -> {} at depth {}: {}", from, to, depth, message);
        self.report.deliveries += 1;
        self.report.max_depth = self.report.max_depth.max(depth);

        let slot = match (from, to) {
            (NodeRef::Factor(f), NodeRef::Variable(v)) => graph.variable(v)?.slot_of(f),
            (NodeRef::Variable(v), NodeRef::Factor(f)) => graph.factor(f)?.slot_of(v),
            _ => None,
        };
        let slot = match slot {
            Some(slot) => slot,
            None => {
                return Err(InferenceError::NotNeighbor {
                    from: graph.node_name(from)?.to_string(),
                    to: graph.node_name(to)?.to_string(),
                });
            }
        };

        // Trees settle by themselves, so only an unchanged message stops there
        let tolerance = if self.report.forest {
            0.0
        } else {
            self.config.tolerance
        };
        let outgoing = match to {
            NodeRef::Variable(v) => receive(graph.variable_mut(v)?, slot, message, tolerance),
            NodeRef::Factor(f) => receive(graph.factor_mut(f)?, slot, message, tolerance),
        };

        match outgoing {
            Some(outgoing) => {
                for (neighbor, message) in outgoing {
                    self.notify(to, neighbor, message, depth);
                }
            }
            None => self.report.absorbed += 1,
        }
        Ok(())
    }

    /// Sends a degree-one node's message to its only neighbor: ones from a
    /// variable, the potential itself from a factor. Returns false, sending
    /// nothing, for nodes of any other degree.
    pub fn initial_ding(&mut self, graph: &FactorGraph, node: NodeRef) -> Result<bool> {
        let (neighbor, message) = match node {
            NodeRef::Variable(id) => match leaf_message(graph.variable(id)?) {
                Some(outgoing) => outgoing,
                None => return Ok(false),
            },
            NodeRef::Factor(id) => match leaf_message(graph.factor(id)?) {
                Some(outgoing) => outgoing,
                None => return Ok(false),
            },
        };
        debug!(
            "Initial ding from {} to {}",
            graph.node_name(node)?,
            graph.node_name(neighbor)?
        );
        self.notify(node, neighbor, message, 0);
        Ok(true)
    }

    /// Processes the worklist until it is empty or the delivery budget is spent.
    pub fn run(&mut self, graph: &mut FactorGraph) -> Result<PropagationReport> {
        let mut processed = 0;
        let mut exhausted = false;
        while let Some(delivery) = self.queue.pop_front() {
            if processed == self.config.max_deliveries {
                warn!(
                    "Stopping after {} deliveries with {} still pending",
                    processed,
                    self.queue.len() + 1
                );
                self.queue.clear();
                exhausted = true;
                break;
            }
            processed += 1;
            self.respond(graph, delivery)?;
        }

        self.report.converged = !exhausted && self.report.dropped == 0;
        if self.report.dropped > 0 {
            warn!(
                "{} deliveries dropped at hop limit {:?}; some messages are stale",
                self.report.dropped, self.config.max_hops
            );
        }
        debug!("Propagation finished: {:?}", self.report);
        Ok(self.report.clone())
    }

    /// Full sweep: every degree-one node dings its neighbor, then the
    /// worklist is drained.
    pub fn propagate(&mut self, graph: &mut FactorGraph) -> Result<PropagationReport> {
        self.reset(graph);
        for leaf in graph.leaves() {
            self.initial_ding(graph, leaf)?;
        }
        self.run(graph)
    }
}

fn leaf_message<N: Node>(node: &N) -> Option<(NodeRef, Message)> {
    if node.degree() != 1 {
        return None;
    }
    let neighbor = node.edges()[0].neighbor().into();
    Some((neighbor, node.calc_message(0)))
}

/// Stores `message` in `slot`. Returns the messages for every other neighbor,
/// or `None` when the slot's relative change is no more than `tolerance`.
fn receive<N: Receive>(
    node: &mut N,
    slot: usize,
    message: Message,
    tolerance: f64,
) -> Option<Vec<(NodeRef, Message)>> {
    let delta = node.edge_mut(slot).receive(message);
    if delta <= tolerance {
        return None;
    }
    let outgoing = (0..node.degree())
        .filter(|&other| other != slot)
        .map(|other| (node.edges()[other].neighbor().into(), node.calc_message(other)))
        .collect();
    Some(outgoing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::builder::FactorGraphBuilder;
    use crate::graph::models::{FactorId, VariableId};
    use ndarray::array;

    /// prior(a) - a - pair(a, b) - b
    fn chain() -> FactorGraph {
        let mut builder = FactorGraphBuilder::new();
        let a = builder.add_variable("a", 2).unwrap();
        let b = builder.add_variable("b", 2).unwrap();
        builder.add_factor("prior", &[a], array![0.25, 0.75].into_dyn()).unwrap();
        builder
            .add_factor("pair", &[a, b], array![[0.9, 0.1], [0.2, 0.8]].into_dyn())
            .unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_notify_respects_hop_limit() {
        let graph = chain();
        let mut propagator = Propagator::new(PropagationConfig::with_hop_limit(2)).unwrap();
        propagator.reset(&graph);

        let (from, to) = (NodeRef::Factor(FactorId(0)), NodeRef::Variable(VariableId(0)));
        propagator.notify(from, to, array![1.0, 1.0], 1);
        assert_eq!(propagator.pending(), 1);
        propagator.notify(from, to, array![1.0, 1.0], 2);
        assert_eq!(propagator.pending(), 1);
        assert_eq!(propagator.report.dropped, 1);
    }

    #[test]
    fn test_initial_ding_only_from_leaves() {
        let graph = chain();
        let mut propagator = Propagator::new(PropagationConfig::default()).unwrap();
        propagator.reset(&graph);

        // a has two edges, b has one
        assert!(!propagator.initial_ding(&graph, NodeRef::Variable(VariableId(0))).unwrap());
        assert!(propagator.initial_ding(&graph, NodeRef::Variable(VariableId(1))).unwrap());
        assert!(propagator.initial_ding(&graph, NodeRef::Factor(FactorId(0))).unwrap());

        let first = propagator.queue.pop_front().unwrap();
        assert_eq!(first.to, NodeRef::Factor(FactorId(1)));
        assert_eq!(first.message, array![1.0, 1.0]);
        assert_eq!(first.depth, 1);
        let second = propagator.queue.pop_front().unwrap();
        assert_eq!(second.to, NodeRef::Variable(VariableId(0)));
        assert_eq!(second.message, array![0.25, 0.75]);
    }

    #[test]
    fn test_respond_forwards_to_other_neighbors() {
        let mut graph = chain();
        let mut propagator = Propagator::new(PropagationConfig::default()).unwrap();
        propagator.reset(&graph);

        let delivery = Delivery {
            from: NodeRef::Factor(FactorId(0)),
            to: NodeRef::Variable(VariableId(0)),
            message: array![0.25, 0.75],
            depth: 1,
        };
        propagator.respond(&mut graph, delivery.clone()).unwrap();

        let a = graph.variable(VariableId(0)).unwrap();
        assert_eq!(a.edges()[0].message(), &array![0.25, 0.75]);
        assert_eq!(propagator.pending(), 1);
        let forwarded = propagator.queue.front().unwrap();
        assert_eq!(forwarded.to, NodeRef::Factor(FactorId(1)));
        assert_eq!(forwarded.message, array![0.25, 0.75]);
        assert_eq!(forwarded.depth, 2);

        // The same message again changes nothing and goes no further
        propagator.queue.clear();
        propagator.respond(&mut graph, delivery).unwrap();
        assert_eq!(propagator.pending(), 0);
        assert_eq!(propagator.report.absorbed, 1);
    }

    #[test]
    fn test_respond_rejects_non_neighbors() {
        let mut graph = chain();
        let mut propagator = Propagator::new(PropagationConfig::default()).unwrap();
        let stray = Delivery {
            from: NodeRef::Factor(FactorId(0)),
            to: NodeRef::Variable(VariableId(1)),
            message: array![1.0, 1.0],
            depth: 1,
        };
        assert!(matches!(
            propagator.respond(&mut graph, stray),
            Err(InferenceError::NotNeighbor { .. })
        ));
    }

    #[test]
    fn test_propagate_chain() {
        let mut graph = chain();
        let mut propagator = Propagator::new(PropagationConfig::default()).unwrap();
        let report = propagator.propagate(&mut graph).unwrap();

        assert!(report.converged);
        assert!(report.forest);
        assert_eq!(report.dropped, 0);

        let a = graph.variable(VariableId(0)).unwrap().posterior();
        assert!((a[0] - 0.25).abs() < 1e-12);
        // P(b) = 0.25 * [0.9, 0.1] + 0.75 * [0.2, 0.8]
        let b = graph.variable(VariableId(1)).unwrap().posterior();
        assert!((b[0] - 0.375).abs() < 1e-12);
        assert!((b[1] - 0.625).abs() < 1e-12);
    }

    #[test]
    fn test_delivery_budget_stops_run() {
        let mut graph = chain();
        let config = PropagationConfig {
            max_deliveries: 1,
            ..PropagationConfig::default()
        };
        let mut propagator = Propagator::new(config).unwrap();
        let report = propagator.propagate(&mut graph).unwrap();
        assert_eq!(report.deliveries, 1);
        assert!(!report.converged);
        assert_eq!(propagator.pending(), 0);
    }
}
