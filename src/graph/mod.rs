pub mod builder;
pub mod description;
pub mod factor_graph;
pub mod models;

pub use builder::FactorGraphBuilder;
pub use description::NetworkDescription;
pub use factor_graph::FactorGraph;
pub use models::{
    Edge, FactorId, FactorKind, FactorNode, Message, Node, NodeRef, Potential, VariableId,
    VariableNode, VariableState, NORMALIZATION_FLOOR,
};
