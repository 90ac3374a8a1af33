//! Module validation framework
//!
//! Provides module name validation and manifest checks run before a module
//! body is trusted.

pub mod manifest_validator;

pub use manifest_validator::{is_valid_module_name, ManifestValidator, ValidationResult};
