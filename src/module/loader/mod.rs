//! Module loading system
//!
//! Executes module bodies, either compiled plugins from the catalog or
//! interpreted script files.

pub mod catalog;
pub mod loader;
pub mod script;

pub use catalog::ModuleCatalog;
pub use loader::ModuleLoader;
pub use script::ScriptModule;
