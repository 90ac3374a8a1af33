//! Module system traits and interfaces
//!
//! Defines the plugin interface modules implement, their per-session
//! lifecycle state and the error type shared by the module components.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::module::context::SessionContext;

/// Module lifecycle state within one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleState {
    /// Never requested in this session
    #[default]
    Unloaded,
    /// Body is being executed (dependencies may still be resolving)
    Loading,
    /// Load was attempted; terminal for the session
    Loaded,
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModuleState::Unloaded => "unloaded",
            ModuleState::Loading => "loading",
            ModuleState::Loaded => "loaded",
        };
        f.write_str(s)
    }
}

/// Result of executing a module body
///
/// Both variants leave the module in [`ModuleState::Loaded`]; the outcome is
/// kept so repeated failures stay visible in status listings without
/// triggering retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "reason", rename_all = "lowercase")]
pub enum LoadOutcome {
    Succeeded,
    Failed(String),
}

impl LoadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LoadOutcome::Succeeded)
    }
}

/// Module trait that compiled modules implement
///
/// A module contributes to the caller's session by registering variables,
/// aliases and commands into the [`SessionContext`]. Whatever it registers
/// stays visible after `register` returns, even when it returns an error.
pub trait Module: Send + Sync {
    /// Register this module's contributions into the session
    fn register(&self, ctx: &mut SessionContext) -> Result<(), ModuleError>;
}

impl<F> Module for F
where
    F: Fn(&mut SessionContext) -> Result<(), ModuleError> + Send + Sync,
{
    fn register(&self, ctx: &mut SessionContext) -> Result<(), ModuleError> {
        self(ctx)
    }
}

/// Module system errors
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("Invalid module name: {0:?}")]
    InvalidName(String),

    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Syntax error at line {line}: {message}")]
    Script { line: usize, message: String },

    #[error("Module returned non-zero status {0}")]
    Exit(i32),

    #[error("Module execution failed: {0}")]
    Execution(String),

    #[error("Signature error: {0}")]
    Signature(String),
}

impl ModuleError {
    /// Wrap an I/O error with the path it occurred on
    pub fn io<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        ModuleError::Io {
            path: path.into(),
            source,
        }
    }
}
