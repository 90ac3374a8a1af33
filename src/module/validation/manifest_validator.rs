//! Manifest validation framework
//!
//! Validates the metadata extracted from a module file before it is loaded.

use tracing::{debug, warn};

use crate::module::registry::manifest::ModuleManifest;

/// Maximum accepted length of a module name
///
/// A file name is at most 255 bytes on common filesystems and the longest
/// module extension is `.module`.
pub const MAX_MODULE_NAME_LEN: usize = 255 - ".module".len();

/// Maximum accepted length of a module description
pub const MAX_DESCRIPTION_LEN: usize = 512;

/// Validation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Manifest is valid
    Valid,
    /// Manifest is invalid with specific errors
    Invalid(Vec<String>),
}

/// Check a module name against `[A-Za-z0-9_-]+`
///
/// Names are used to build file paths, so anything outside this set
/// (separators, dots, NUL) is rejected.
#[inline]
pub fn is_valid_module_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_MODULE_NAME_LEN {
        return false;
    }

    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Manifest validator
#[derive(Debug)]
pub struct ManifestValidator {
    max_description_len: usize,
}

impl ManifestValidator {
    /// Create a new manifest validator
    pub fn new() -> Self {
        Self {
            max_description_len: MAX_DESCRIPTION_LEN,
        }
    }

    /// Validate a module manifest
    pub fn validate(&self, manifest: &ModuleManifest) -> ValidationResult {
        let mut errors = Vec::new();

        if !is_valid_module_name(&manifest.name) {
            errors.push(format!("Invalid module name: {:?}", manifest.name));
        }

        if let Some(description) = &manifest.description {
            if description.len() > self.max_description_len {
                errors.push(format!(
                    "Description too long: {} bytes (max {})",
                    description.len(),
                    self.max_description_len
                ));
            }
        }

        if let Err(dep_errors) = self.validate_dependencies(manifest) {
            errors.extend(dep_errors);
        }

        if errors.is_empty() {
            debug!("Manifest validation passed for module: {}", manifest.name);
            ValidationResult::Valid
        } else {
            warn!(
                "Manifest validation failed for module {}: {:?}",
                manifest.name, errors
            );
            ValidationResult::Invalid(errors)
        }
    }

    /// Validate declared dependencies
    fn validate_dependencies(&self, manifest: &ModuleManifest) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for dep in &manifest.dependencies {
            if !is_valid_module_name(dep) {
                errors.push(format!("Invalid dependency name: {:?}", dep));
            } else if dep == &manifest.name {
                errors.push(format!("Module {} depends on itself", dep));
            } else if !seen.insert(dep.as_str()) {
                errors.push(format!("Duplicate dependency: {}", dep));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Default for ManifestValidator {
    fn default() -> Self {
        Self::new()
    }
}
