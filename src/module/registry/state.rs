//! Per-session module state registry
//!
//! Single source of truth for which modules are unloaded, loading or loaded.
//! A registry is one session: it is shared by `Arc` between the components
//! of a loading context and a fresh registry starts a fresh session.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::trace;

use crate::module::traits::{LoadOutcome, ModuleState};

/// Registry record for one module
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryEntry {
    pub state: ModuleState,
    /// Outcome of the most recent execution, once there has been one
    pub outcome: Option<LoadOutcome>,
}

/// Module name -> state map, serialized behind a mutex
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    entries: Mutex<HashMap<String, RegistryEntry>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RegistryEntry>> {
        // A panic while holding the lock cannot leave an entry half-written
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state of a module; the entry is created on first lookup
    pub fn get(&self, name: &str) -> ModuleState {
        self.lock().entry(name.to_string()).or_default().state
    }

    /// Full record of a module
    pub fn entry(&self, name: &str) -> RegistryEntry {
        self.lock().entry(name.to_string()).or_default().clone()
    }

    pub fn set(&self, name: &str, state: ModuleState) {
        trace!("Module {} -> {}", name, state);
        self.lock().entry(name.to_string()).or_default().state = state;
    }

    /// Atomically move a module into `loading`
    ///
    /// Succeeds from `unloaded`, or from `loaded` when `force` is set.
    /// Returns false when the module is already loading, or loaded without
    /// `force`.
    pub fn begin_loading(&self, name: &str, force: bool) -> bool {
        let mut entries = self.lock();
        let entry = entries.entry(name.to_string()).or_default();
        let proceed = match entry.state {
            ModuleState::Unloaded => true,
            ModuleState::Loading => false,
            ModuleState::Loaded => force,
        };
        if proceed {
            trace!("Module {} -> loading", name);
            entry.state = ModuleState::Loading;
        }
        proceed
    }

    /// Record the end of an execution; the module becomes `loaded`
    pub fn finish(&self, name: &str, outcome: LoadOutcome) {
        trace!("Module {} -> loaded ({:?})", name, outcome);
        let mut entries = self.lock();
        let entry = entries.entry(name.to_string()).or_default();
        entry.state = ModuleState::Loaded;
        entry.outcome = Some(outcome);
    }

    /// Snapshot of every entry, sorted by module name
    pub fn all(&self) -> Vec<(String, RegistryEntry)> {
        let mut all: Vec<_> = self
            .lock()
            .iter()
            .map(|(name, entry)| (name.clone(), entry.clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Names of modules in state `loaded`, sorted
    pub fn loaded(&self) -> Vec<String> {
        self.all()
            .into_iter()
            .filter(|(_, entry)| entry.state == ModuleState::Loaded)
            .map(|(name, _)| name)
            .collect()
    }
}
