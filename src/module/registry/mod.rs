//! Module registry and discovery
//!
//! Handles module discovery, manifest extraction, dependency classification,
//! the per-session state registry and the persisted enabled-module list.

pub mod dependencies;
pub mod discovery;
pub mod enabled;
pub mod manifest;
pub mod state;

pub use dependencies::{DependencyStep, ModuleDependencies, MAX_DEPENDENCY_DEPTH};
pub use discovery::{DiscoveredModule, ModuleDiscovery};
pub use enabled::EnabledModules;
pub use manifest::ModuleManifest;
pub use state::{ModuleRegistry, RegistryEntry};
