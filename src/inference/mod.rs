pub mod bayesian_network;
pub mod enumeration;
pub mod evidence;
pub mod messages;
pub mod propagation;
pub mod table;

// Re-export the BayesianNetwork for easy access
pub use bayesian_network::BayesianNetwork;
pub use enumeration::joint_marginals;
pub use evidence::{attach_evidence, one_hot};
pub use propagation::{Delivery, PropagationReport, Propagator};
pub use table::{MarginalEntry, MarginalTable};
