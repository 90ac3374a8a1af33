//! Shared utilities: environment access, logging setup, error helpers

pub mod env;
pub mod error;
pub mod logging;

// Re-export commonly used items
pub use env::{env_bool, env_list, env_opt, env_or_else};
pub use error::with_default;
pub use logging::{init_logging, init_logging_from_config};
#[cfg(feature = "json-logging")]
pub use logging::init_json_logging;
