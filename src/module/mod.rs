//! Module system
//!
//! Loads shell extension modules into an interactive session.
//!
//! ## Architecture
//!
//! - **Discovery**: modules are `<name>.module` / `<name>.sh` files under an
//!   ordered list of search roots
//! - **Integrity**: file permissions, HMAC-SHA256 sidecars and a suspicious
//!   content scan gate every file before it runs
//! - **Dependencies**: declared in the file text, resolved before the module
//!   body runs, bounded in depth
//! - **Crash Containment**: module errors and panics become warnings; the
//!   session always survives
//! - **Session State**: a per-session registry makes loads idempotent and
//!   breaks re-entrant cycles

pub mod context;
pub mod loader;
pub mod manager;
pub mod registry;
pub mod report;
pub mod security;
pub mod traits;
pub mod validation;

pub use context::{ModuleCommand, SessionContext};
pub use loader::{ModuleCatalog, ModuleLoader, ScriptModule};
pub use manager::{LoadOptions, ModuleManager, ModuleStatus, ModuleSummary};
pub use registry::{EnabledModules, ModuleDiscovery, ModuleRegistry};
pub use report::{LoadReport, LoadStatus, ModuleWarning, SessionReport};
pub use security::{EnforcementPolicy, IntegrityVerifier, Verdict};
pub use traits::{LoadOutcome, Module, ModuleError, ModuleState};
