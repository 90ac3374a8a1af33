//! Fallback helper for non-critical reads
//!
//! Listings must keep working when one module file or the enabled list
//! cannot be read; the failure is logged and a default is used instead.

use tracing::debug;

/// Run `operation`, returning `default` (and logging at debug) on error
pub fn with_default<F, T, E>(operation: F, default: T, context: &str) -> T
where
    F: FnOnce() -> Result<T, E>,
    E: std::fmt::Display,
{
    match operation() {
        Ok(value) => value,
        Err(e) => {
            debug!("{}: {}, using default", context, e);
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_default() {
        assert_eq!(with_default(|| "7".parse::<u8>(), 0, "ctx"), 7);
        assert_eq!(with_default(|| "x".parse::<u8>(), 0, "ctx"), 0);
    }
}
