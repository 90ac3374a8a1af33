//! Integrity enforcement for module files
//!
//! Provides permission checking, HMAC signatures and suspicious content
//! scanning, combined by the [`IntegrityVerifier`].

pub mod content;
pub mod permissions;
pub mod signature;
pub mod validator;

pub use content::{ContentMatch, ContentScanner};
pub use permissions::{EnforcementPolicy, PermissionChecker, DEFAULT_ALLOWED_MODES};
pub use signature::{signature_path, HmacKey, KeySource, SignatureStatus};
pub use validator::{IntegrityVerifier, Verdict};
