//! SENTINEL Modules - module subsystem for an interactive shell framework
//!
//! Finds shell extension modules on disk, verifies them, resolves their
//! declared dependencies and loads them into a session without letting a
//! broken module take the session down.
//!
//! ## Components
//!
//! 1. Discovery (`module::registry::discovery`) ← resolves names to files
//! 2. Integrity verification (`module::security`) ← permissions, HMAC, content
//! 3. Dependency resolution (`module::registry::dependencies`) ← depth-bounded
//! 4. Safe loading (`module::loader`) ← errors and panics contained
//! 5. Session registry and enabled list (`module::registry`)
//!
//! ## Design Principles
//!
//! 1. **Degrade, never abort**: every failure becomes a warning
//! 2. **Text before execution**: metadata is read without running the module
//! 3. **Injected state**: the session registry is shared explicitly, never global
//!
//! ## Example
//!
//! ```no_run
//! use sentinel_modules::config::SentinelConfig;
//! use sentinel_modules::module::{ModuleManager, SessionContext};
//!
//! let config = SentinelConfig::load(None)?;
//! let manager = ModuleManager::new(&config);
//! let mut ctx = SessionContext::from_env();
//! let report = manager.load_enabled(&mut ctx);
//! print!("{}", ctx.render_shell());
//! # let _ = report;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod config;
pub mod module;
pub mod utils;

pub use config::SentinelConfig;
pub use module::{LoadOptions, ModuleManager, SessionContext};
