//! Logging initialization
//!
//! Logs go to stderr so that stdout stays clean for `--emit-shell` output
//! and JSON listings.
//!
//! Filter precedence:
//! - `RUST_LOG` when set
//! - the filter from config (or `debug` when `SENTINEL_DEBUG_MODULES` is on)
//! - `warn`
//!
//! # Usage
//! ```rust
//! use sentinel_modules::utils::init_logging;
//!
//! init_logging(None); // Uses RUST_LOG or defaults to "warn"
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::SentinelConfig;

/// Filter used when neither RUST_LOG nor config provides one
pub const DEFAULT_FILTER: &str = "warn";

fn build_filter(filter: Option<&str>) -> EnvFilter {
    // RUST_LOG always takes precedence
    if std::env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }
    EnvFilter::new(filter.unwrap_or(DEFAULT_FILTER))
}

/// Initialize human-readable logging on stderr
///
/// Safe to call more than once; later calls are ignored.
///
/// # Arguments
/// * `filter` - Optional log filter from config (e.g. "info",
///   "sentinel_modules::module=debug"). RUST_LOG still takes precedence.
pub fn init_logging(filter: Option<&str>) {
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(std::env::var("NO_COLOR").is_err()), // Respect NO_COLOR standard
        )
        .with(build_filter(filter))
        .try_init();
}

/// Initialize logging with JSON output
///
/// Useful when logs need to be parsed by log aggregation systems.
#[cfg(feature = "json-logging")]
pub fn init_json_logging(filter: Option<&str>) {
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_current_span(true)
                .with_span_list(true),
        )
        .with(build_filter(filter))
        .try_init();
}

/// Initialize logging from the loaded configuration
///
/// # Example
/// ```rust
/// use sentinel_modules::config::SentinelConfig;
/// use sentinel_modules::utils::init_logging_from_config;
///
/// let config = SentinelConfig::default();
/// init_logging_from_config(&config);
/// ```
pub fn init_logging_from_config(config: &SentinelConfig) {
    let filter = config.log_filter();

    if config.logging.json_format {
        #[cfg(feature = "json-logging")]
        {
            init_json_logging(filter);
        }
        #[cfg(not(feature = "json-logging"))]
        {
            // Fall back to regular logging if json-logging feature not enabled
            init_logging(filter);
        }
    } else {
        init_logging(filter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_initialization_is_harmless() {
        init_logging(Some("debug"));
        init_logging(None);
        tracing::debug!("logging initialized twice");
    }
}
