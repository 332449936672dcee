use serde::{Deserialize, Serialize};

use super::errors::{InferenceError, Result};

/// Hop limit of the bounded recursive cascade. Every ding chain stopped
/// after this many hops regardless of topology.
pub const LEGACY_HOP_LIMIT: usize = 10;

/// These options control how the propagator drains its worklist.
/// Every field has a default so partial JSON documents deserialize cleanly.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PropagationConfig {
    /// Deliveries that have already travelled this many hops are dropped.
    /// `None` lets trees complete on their own.
    pub max_hops: Option<usize>,

    /// On graphs with cycles, a delivery that changes a slot by no more than
    /// this is stored but not forwarded, once that slot has been written at
    /// least once. The change is the max absolute component difference after
    /// scaling both messages to sum to one. On trees only an identical
    /// message is absorbed.
    pub tolerance: f64,

    /// Upper bound on deliveries processed in a single run. Only reached on
    /// graphs with cycles that do not settle.
    pub max_deliveries: usize,

    /// Rescale every outgoing message to sum to one. Posteriors are
    /// unaffected; on graphs with cycles it keeps repeated products from
    /// drifting toward zero or infinity.
    pub normalize_messages: bool,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        PropagationConfig {
            max_hops: None,
            tolerance: 1e-12,
            max_deliveries: 1_000_000,
            normalize_messages: false,
        }
    }
}

impl PropagationConfig {
    /// Default config with a hop limit. `with_hop_limit(LEGACY_HOP_LIMIT)`
    /// reproduces the bounded ding cascade.
    pub fn with_hop_limit(max_hops: usize) -> Self {
        PropagationConfig {
            max_hops: Some(max_hops),
            ..PropagationConfig::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PropagationConfig = serde_json::from_str(json)?;
        config.validate()
    }

    pub fn validate(self) -> Result<Self> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(InferenceError::InvalidConfig(format!(
                "tolerance must be finite and >= 0, got {}",
                self.tolerance
            )));
        }
        if self.max_deliveries == 0 {
            return Err(InferenceError::InvalidConfig(
                "max_deliveries must be > 0".into(),
            ));
        }
        if self.max_hops == Some(0) {
            return Err(InferenceError::InvalidConfig(
                "max_hops must be > 0 when set".into(),
            ));
        }
        Ok(self)
    }
}
