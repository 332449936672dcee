use thiserror::Error;

/// Errors raised while building a factor graph, attaching evidence or
/// running propagation.
///
/// Propagation on graphs with cycles is not an error: a run that stops
/// before settling is reported through `PropagationReport::converged`.
/// Likewise a posterior whose unnormalized mass is near zero is divided by
/// the normalization floor instead of failing.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("factor '{factor}': potential axis {axis} has extent {found} but variable domain size is {expected}")]
    ShapeMismatch {
        factor: String,
        axis: usize,
        expected: usize,
        found: usize,
    },

    #[error("factor '{factor}': potential has rank {found} but the factor connects {expected} variables")]
    RankMismatch {
        factor: String,
        expected: usize,
        found: usize,
    },

    #[error("factor '{name}': table holds {found} values but the declared shape needs {expected}")]
    TableSize {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("evidence for '{variable}' has length {found} but the domain size is {expected}")]
    EvidenceMismatch {
        variable: String,
        expected: usize,
        found: usize,
    },

    #[error("invalid potential for '{name}': {reason}")]
    InvalidPotential { name: String, reason: String },

    #[error("variable '{0}' must have at least one state")]
    EmptyDomain(String),

    #[error("factor '{0}' must connect at least one variable")]
    EmptyScope(String),

    #[error("variable '{0}' is declared more than once")]
    DuplicateVariable(String),

    #[error("factor '{factor}' lists variable '{variable}' more than once")]
    RepeatedVariable { factor: String, variable: String },

    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("no variable with id {0}")]
    UnknownVariableId(usize),

    #[error("no factor with id {0}")]
    UnknownFactorId(usize),

    #[error("'{from}' is not a neighbor of '{to}'")]
    NotNeighbor { from: String, to: String },

    #[error("state {state} is out of range for '{variable}' with {domain_size} states")]
    StateOutOfRange {
        variable: String,
        state: usize,
        domain_size: usize,
    },

    #[error("joint state space of {states} assignments exceeds the enumeration limit of {limit}")]
    EnumerationTooLarge { states: usize, limit: usize },

    #[error("invalid propagation config: {0}")]
    InvalidConfig(String),

    #[error("malformed network description: {0}")]
    Description(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, InferenceError>;
