//! Load reports and user-visible warnings
//!
//! Every component of the load pipeline degrades failures into
//! [`ModuleWarning`]s instead of errors; a [`LoadReport`] carries the
//! warnings collected for one top-level request.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// Prefix for warnings printed on stderr
pub const WARNING_PREFIX: &str = "sentinel: warning:";

/// Non-fatal problems found while loading modules
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModuleWarning {
    #[error("invalid module name {name:?} (allowed: letters, digits, '_' and '-')")]
    InvalidName { name: String },

    #[error("module '{name}' not found{}", format_suggestions(.suggestions))]
    NotFound {
        name: String,
        suggestions: Vec<String>,
    },

    #[error("insecure permissions {mode:03o} on {} (allowed: {allowed})", .path.display())]
    PermissionViolation {
        path: PathBuf,
        mode: u32,
        allowed: String,
    },

    #[error("no signature found for {}", .path.display())]
    SignatureMissing { path: PathBuf },

    #[error("signature verification failed for {}: {reason}", .path.display())]
    SignatureMismatch { path: PathBuf, reason: String },

    #[error("suspicious content in {} line {line}: {pattern}", .path.display())]
    SuspiciousContent {
        path: PathBuf,
        pattern: String,
        line: usize,
    },

    #[error("module '{name}' failed to load: {reason}")]
    ExecutionFailure { name: String, reason: String },

    #[error("possible circular dependency: '{module}' -> '{dependency}' (depth {depth}, limit {limit})")]
    CircularDependency {
        module: String,
        dependency: String,
        depth: usize,
        limit: usize,
    },

    #[error("dependency '{dependency}' of '{module}' is being loaded elsewhere; continuing without it")]
    DependencyInProgress { module: String, dependency: String },

    #[error("enabled module list: {reason}")]
    Persistence { reason: String },
}

fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean: {}?)", suggestions.join(", "))
    }
}

/// Print a warning on stderr with the standard prefix
pub fn emit_warning(warning: &ModuleWarning, quiet: bool) {
    debug!("module warning: {}", warning);
    if !quiet {
        eprintln!("{} {}", WARNING_PREFIX, warning);
    }
}

/// Final status of one load request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    /// Body executed successfully
    Loaded,
    /// Already loaded earlier in this session; nothing executed
    AlreadyLoaded,
    /// Re-entrant request for a module that is currently loading
    InProgress,
    /// No backing file under any search root
    NotFound,
    /// Name failed validation
    Rejected,
    /// Integrity verification refused the file
    Blocked,
    /// Body executed but failed; the module is still marked loaded
    Failed,
}

impl LoadStatus {
    /// Whether the module is usable (or about to be) after this request
    pub fn is_success(self) -> bool {
        matches!(
            self,
            LoadStatus::Loaded | LoadStatus::AlreadyLoaded | LoadStatus::InProgress
        )
    }
}

/// Outcome of a top-level load request, including its dependencies' warnings
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub name: String,
    pub status: LoadStatus,
    pub warnings: Vec<ModuleWarning>,
}

impl LoadReport {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Whether any warning of the circular-dependency kind was recorded
    pub fn has_cycle_warning(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, ModuleWarning::CircularDependency { .. }))
    }
}

/// Reports for a session-start batch load
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionReport {
    /// One report per enabled module, in list order
    pub reports: Vec<LoadReport>,
    /// Warnings not tied to a single module (e.g. unreadable enabled list)
    pub warnings: Vec<ModuleWarning>,
}

impl SessionReport {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty() || self.reports.iter().any(LoadReport::has_warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_lists_suggestions() {
        let warning = ModuleWarning::NotFound {
            name: "fzf".to_string(),
            suggestions: vec!["fzf_helpers".to_string(), "fzf_git".to_string()],
        };
        assert_eq!(
            warning.to_string(),
            "module 'fzf' not found (did you mean: fzf_helpers, fzf_git?)"
        );

        let bare = ModuleWarning::NotFound {
            name: "nope".to_string(),
            suggestions: vec![],
        };
        assert_eq!(bare.to_string(), "module 'nope' not found");
    }

    #[test]
    fn test_permission_mode_is_octal() {
        let warning = ModuleWarning::PermissionViolation {
            path: PathBuf::from("/tmp/x.module"),
            mode: 0o666,
            allowed: "600, 640, 644".to_string(),
        };
        assert!(warning.to_string().contains("666"));
    }

    #[test]
    fn test_status_success_classes() {
        assert!(LoadStatus::Loaded.is_success());
        assert!(LoadStatus::AlreadyLoaded.is_success());
        assert!(LoadStatus::InProgress.is_success());
        assert!(!LoadStatus::Failed.is_success());
        assert!(!LoadStatus::Blocked.is_success());
        assert!(!LoadStatus::NotFound.is_success());
    }

    #[test]
    fn test_warning_json_is_tagged() {
        let warning = ModuleWarning::Persistence {
            reason: "disk full".to_string(),
        };
        let json = serde_json::to_value(&warning).unwrap();
        assert_eq!(json["kind"], "persistence");

        let busy = ModuleWarning::DependencyInProgress {
            module: "alpha".to_string(),
            dependency: "beta".to_string(),
        };
        let json = serde_json::to_value(&busy).unwrap();
        assert_eq!(json["kind"], "dependency_in_progress");
        assert!(!busy.to_string().contains("circular"));
    }
}
