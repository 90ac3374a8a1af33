//! Compiled module catalog
//!
//! Maps module names to in-process [`Module`] implementations. A catalog
//! entry takes precedence over interpreting the module file; the file is
//! still discovered and verified first.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::module::traits::Module;

/// Registered compiled modules
#[derive(Clone, Default)]
pub struct ModuleCatalog {
    modules: HashMap<String, Arc<dyn Module>>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a compiled module, replacing any previous one of that name
    pub fn register<M: Module + 'static>(&mut self, name: &str, module: M) {
        debug!("Registering compiled module {}", name);
        self.modules.insert(name.to_string(), Arc::new(module));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Module>> {
        self.modules.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.modules.keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for ModuleCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleCatalog")
            .field("modules", &self.names())
            .finish()
    }
}
