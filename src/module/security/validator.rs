//! Integrity verification for module files
//!
//! Combines the permission, signature and content checks into a single
//! verdict. Verification never fails: problems become warnings, and only the
//! configured policies decide whether a warning refuses the module.

use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::config::SecurityConfig;
use crate::module::report::ModuleWarning;
use crate::module::security::content::ContentScanner;
use crate::module::security::permissions::{EnforcementPolicy, PermissionChecker};
use crate::module::security::signature::{verify_signature, HmacKey, SignatureStatus};
use crate::module::traits::ModuleError;

/// Result of verifying one module file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub allowed: bool,
    pub warnings: Vec<ModuleWarning>,
}

impl Verdict {
    fn allow() -> Self {
        Self {
            allowed: true,
            warnings: Vec::new(),
        }
    }

    fn record(&mut self, warning: ModuleWarning, blocks: bool) {
        if blocks {
            self.allowed = false;
        }
        self.warnings.push(warning);
    }
}

/// Signature requirements
#[derive(Debug, Clone, Copy, Default)]
struct SignaturePolicy {
    enabled: bool,
    require_present: bool,
    require_valid: bool,
}

/// Module integrity verifier
#[derive(Debug, Clone)]
pub struct IntegrityVerifier {
    permissions: PermissionChecker,
    signatures: SignaturePolicy,
    key: HmacKey,
    scanner: Option<(ContentScanner, EnforcementPolicy)>,
}

impl IntegrityVerifier {
    pub fn from_config(config: &SecurityConfig) -> Self {
        let signatures = SignaturePolicy {
            enabled: config.verify_signatures
                || config.require_signature
                || config.require_valid_signature,
            require_present: config.require_signature,
            require_valid: config.require_valid_signature,
        };
        Self {
            permissions: PermissionChecker::new(
                config.allowed_modes.clone(),
                config.permission_policy,
            ),
            signatures,
            key: config.resolve_key(),
            scanner: config
                .scan_content
                .then(|| (ContentScanner::new(), config.content_policy)),
        }
    }

    /// Key used for signature checks
    pub fn key(&self) -> &HmacKey {
        &self.key
    }

    /// Verify a module given its path and the bytes read from it
    pub fn verify_bytes(&self, path: &Path, bytes: &[u8]) -> Verdict {
        let mut verdict = Verdict::allow();

        if let Some(warning) = self.permissions.check(path) {
            verdict.record(warning, self.permissions.policy().blocks());
        }

        if self.signatures.enabled {
            match verify_signature(&self.key, path, bytes) {
                SignatureStatus::Valid => debug!("Signature valid for {:?}", path),
                SignatureStatus::Missing => verdict.record(
                    ModuleWarning::SignatureMissing {
                        path: path.to_path_buf(),
                    },
                    self.signatures.require_present,
                ),
                SignatureStatus::Mismatch(reason) => verdict.record(
                    ModuleWarning::SignatureMismatch {
                        path: path.to_path_buf(),
                        reason,
                    },
                    self.signatures.require_valid,
                ),
            }
        }

        if let Some((scanner, policy)) = &self.scanner {
            let source = String::from_utf8_lossy(bytes);
            for hit in scanner.scan(&source) {
                verdict.record(
                    ModuleWarning::SuspiciousContent {
                        path: path.to_path_buf(),
                        pattern: hit.pattern.to_string(),
                        line: hit.line,
                    },
                    policy.blocks(),
                );
            }
        }

        if !verdict.allowed {
            warn!("Refusing module file {:?}", path);
        }
        verdict
    }

    /// Read and verify a module file
    pub fn verify(&self, path: &Path) -> Result<Verdict, ModuleError> {
        let bytes = fs::read(path).map_err(|e| ModuleError::io(path, e))?;
        Ok(self.verify_bytes(path, &bytes))
    }
}
