//! Module dependency resolution
//!
//! Decides, one dependency at a time, whether it still needs loading. The
//! recursion itself lives in the manager's load pipeline so that each
//! dependency goes through discovery and verification like any other module.

use std::collections::HashSet;
use tracing::debug;

use crate::module::registry::manifest::ModuleManifest;
use crate::module::traits::ModuleState;
use crate::module::validation::is_valid_module_name;

/// Maximum dependency nesting before a chain is treated as circular
pub const MAX_DEPENDENCY_DEPTH: usize = 5;

/// What to do with one declared dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyStep {
    /// Already loaded in this session
    Satisfied,
    /// Must be loaded (at `depth + 1`) before the dependent
    Load,
    /// Currently loading further up the chain: a cycle
    Cycle,
    /// Being loaded by another caller sharing the registry
    Busy,
    /// Loading it would exceed the depth bound
    TooDeep,
}

/// Dependency resolver
pub struct ModuleDependencies;

impl ModuleDependencies {
    /// Dependencies of a manifest that can be looked up, in declared order
    ///
    /// Invalid names and repeats are dropped.
    pub fn loadable(manifest: &ModuleManifest) -> Vec<String> {
        let mut seen = HashSet::new();
        manifest
            .dependencies
            .iter()
            .filter(|dep| {
                if !is_valid_module_name(dep) {
                    debug!("Skipping invalid dependency {:?} of {}", dep, manifest.name);
                    return false;
                }
                seen.insert(dep.as_str())
            })
            .cloned()
            .collect()
    }

    /// Classify a dependency of a module loading at `depth`
    ///
    /// `on_chain` tells whether the dependency is one of the modules the
    /// current load is already inside of.
    pub fn classify(
        dependency_state: ModuleState,
        on_chain: bool,
        depth: usize,
        max_depth: usize,
    ) -> DependencyStep {
        match dependency_state {
            ModuleState::Loaded => DependencyStep::Satisfied,
            ModuleState::Loading if on_chain => DependencyStep::Cycle,
            ModuleState::Loading => DependencyStep::Busy,
            ModuleState::Unloaded if depth + 1 > max_depth => DependencyStep::TooDeep,
            ModuleState::Unloaded => DependencyStep::Load,
        }
    }
}
