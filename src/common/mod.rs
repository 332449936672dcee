pub mod errors;
pub mod logging;
pub mod setup;

// Re-export key types
pub use errors::{InferenceError, Result};
pub use logging::{init_logging, try_init_logging};
pub use setup::{PropagationConfig, LEGACY_HOP_LIMIT};
