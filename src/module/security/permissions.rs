//! File permission checks for module files
//!
//! A module file whose mode is outside the allow-list is reported; whether
//! that also blocks the load depends on the enforcement policy.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::module::report::ModuleWarning;

/// Modes accepted by default: owner-writable only
pub const DEFAULT_ALLOWED_MODES: [u32; 3] = [0o600, 0o640, 0o644];

/// How a failed check affects the load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnforcementPolicy {
    /// Warn and refuse the module
    Strict,
    /// Warn and continue
    #[default]
    Permissive,
}

impl EnforcementPolicy {
    pub fn blocks(self) -> bool {
        matches!(self, EnforcementPolicy::Strict)
    }
}

/// Permission checker for module files
#[derive(Debug, Clone)]
pub struct PermissionChecker {
    allowed_modes: Vec<u32>,
    policy: EnforcementPolicy,
}

impl PermissionChecker {
    pub fn new(allowed_modes: Vec<u32>, policy: EnforcementPolicy) -> Self {
        Self {
            allowed_modes,
            policy,
        }
    }

    pub fn policy(&self) -> EnforcementPolicy {
        self.policy
    }

    /// Check a file's mode bits against the allow-list
    ///
    /// Returns a warning on violation. Unreadable metadata is not a
    /// violation; the subsequent read reports it.
    #[cfg(unix)]
    pub fn check(&self, path: &Path) -> Option<ModuleWarning> {
        use std::os::unix::fs::PermissionsExt;

        let mode = match std::fs::metadata(path) {
            Ok(meta) => meta.permissions().mode() & 0o777,
            Err(e) => {
                debug!("Cannot stat {:?}: {}", path, e);
                return None;
            }
        };

        if self.allowed_modes.contains(&mode) {
            return None;
        }
        Some(ModuleWarning::PermissionViolation {
            path: path.to_path_buf(),
            mode,
            allowed: self.describe_allowed(),
        })
    }

    #[cfg(not(unix))]
    pub fn check(&self, path: &Path) -> Option<ModuleWarning> {
        debug!("Skipping permission check for {:?} on this platform", path);
        None
    }

    fn describe_allowed(&self) -> String {
        self.allowed_modes
            .iter()
            .map(|m| format!("{:03o}", m))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for PermissionChecker {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_MODES.to_vec(), EnforcementPolicy::default())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn file_with_mode(dir: &TempDir, mode: u32) -> std::path::PathBuf {
        let path = dir.path().join(format!("m{:o}.module", mode));
        fs::write(&path, "X=1\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[test]
    fn test_allowed_modes_pass() {
        let dir = TempDir::new().unwrap();
        let checker = PermissionChecker::default();
        for mode in DEFAULT_ALLOWED_MODES {
            assert!(checker.check(&file_with_mode(&dir, mode)).is_none());
        }
    }

    #[test]
    fn test_world_writable_is_reported() {
        let dir = TempDir::new().unwrap();
        let checker = PermissionChecker::default();
        match checker.check(&file_with_mode(&dir, 0o666)) {
            Some(ModuleWarning::PermissionViolation { mode, allowed, .. }) => {
                assert_eq!(mode, 0o666);
                assert_eq!(allowed, "600, 640, 644");
            }
            other => panic!("expected permission violation, got {:?}", other),
        }
    }

    #[test]
    fn test_policy_blocks() {
        assert!(EnforcementPolicy::Strict.blocks());
        assert!(!EnforcementPolicy::Permissive.blocks());
        assert_eq!(EnforcementPolicy::default(), EnforcementPolicy::Permissive);
    }
}
