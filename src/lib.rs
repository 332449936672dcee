//! Exact marginal inference on discrete factor graphs by sum-product
//! message passing.
//!
//! Build a graph with [`FactorGraphBuilder`], then either drive a
//! [`Propagator`] directly or wrap both in a [`BayesianNetwork`] and work
//! with variable names. Posteriors are exact when the graph is a tree.

pub mod common;
pub mod graph;
pub mod inference;

pub use common::{InferenceError, PropagationConfig};
pub use graph::{FactorGraph, FactorGraphBuilder, NetworkDescription};
pub use inference::{BayesianNetwork, MarginalTable, PropagationReport, Propagator};
