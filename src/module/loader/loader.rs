//! Module loader implementation
//!
//! Executes a verified module body against the caller's session. Failures
//! and panics inside a module never escape: they come back as a failed
//! [`LoadOutcome`].

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::module::context::SessionContext;
use crate::module::loader::catalog::ModuleCatalog;
use crate::module::loader::script::ScriptModule;
use crate::module::traits::{LoadOutcome, Module, ModuleError};

/// Module loader for executing module bodies
#[derive(Debug, Clone, Default)]
pub struct ModuleLoader {
    catalog: ModuleCatalog,
}

impl ModuleLoader {
    pub fn new(catalog: ModuleCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &ModuleCatalog {
        &self.catalog
    }

    /// Execute one module
    ///
    /// A compiled module registered under `name` is preferred; otherwise
    /// `source` (the verified file contents) is interpreted. Whatever the
    /// module registered before failing stays in `ctx`.
    pub fn execute(
        &self,
        name: &str,
        path: &Path,
        source: &str,
        ctx: &mut SessionContext,
    ) -> LoadOutcome {
        debug!("Executing module {} from {:?}", name, path);
        let previous = ctx.enter_module(name);

        let result = panic::catch_unwind(AssertUnwindSafe(|| -> Result<(), ModuleError> {
            match self.catalog.get(name) {
                Some(module) => module.register(ctx),
                None => ScriptModule::parse(name, source)?.register(ctx),
            }
        }));

        ctx.leave_module(previous);

        match result {
            Ok(Ok(())) => {
                info!("Loaded module {}", name);
                LoadOutcome::Succeeded
            }
            Ok(Err(e)) => {
                warn!("Module {} failed: {}", name, e);
                LoadOutcome::Failed(e.to_string())
            }
            Err(payload) => {
                let reason = format!("panicked: {}", panic_message(payload.as_ref()));
                warn!("Module {} {}", name, reason);
                LoadOutcome::Failed(reason)
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
