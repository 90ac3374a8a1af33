//! Module manager for orchestrating module loading
//!
//! Runs the load pipeline: name validation, registry lookup, discovery,
//! integrity verification, dependency resolution, execution and persistence
//! to the enabled list. Every failure along the way becomes a warning in the
//! returned report; nothing here panics or aborts the caller's session.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, trace};

use crate::config::SentinelConfig;
use crate::module::context::SessionContext;
use crate::module::loader::{ModuleCatalog, ModuleLoader};
use crate::module::registry::{
    DependencyStep, EnabledModules, ModuleDependencies, ModuleDiscovery, ModuleManifest,
    ModuleRegistry,
};
use crate::module::report::{emit_warning, LoadReport, LoadStatus, ModuleWarning, SessionReport};
use crate::module::security::signature::sign_file;
use crate::module::security::{IntegrityVerifier, Verdict};
use crate::module::traits::{LoadOutcome, ModuleError, ModuleState};
use crate::module::validation::{is_valid_module_name, ManifestValidator, ValidationResult};
use crate::utils::with_default;

/// Options for a top-level load request
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    /// Re-execute a module already loaded in this session
    pub force: bool,
    /// Append the module to the enabled list once loaded
    pub persist: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            force: false,
            persist: true,
        }
    }
}

/// Why a module is being loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Direct,
    Dependency,
}

/// Module listing entry
#[derive(Debug, Clone, Serialize)]
pub struct ModuleSummary {
    pub name: String,
    pub path: PathBuf,
    pub description: Option<String>,
    pub dependencies: Vec<String>,
    pub enabled: bool,
    pub state: ModuleState,
}

/// Registry state of one module
#[derive(Debug, Clone, Serialize)]
pub struct ModuleStatus {
    pub name: String,
    pub state: ModuleState,
    pub outcome: Option<LoadOutcome>,
}

/// Module manager coordinates discovery, verification and loading
#[derive(Debug)]
pub struct ModuleManager {
    discovery: ModuleDiscovery,
    verifier: IntegrityVerifier,
    loader: ModuleLoader,
    registry: Arc<ModuleRegistry>,
    enabled: EnabledModules,
    validator: ManifestValidator,
    quiet: bool,
    max_depth: usize,
}

impl ModuleManager {
    /// Create a manager with a fresh session registry
    pub fn new(config: &SentinelConfig) -> Self {
        Self::with_registry(config, Arc::new(ModuleRegistry::new()))
    }

    /// Create a manager sharing an existing session registry
    pub fn with_registry(config: &SentinelConfig, registry: Arc<ModuleRegistry>) -> Self {
        Self {
            discovery: ModuleDiscovery::new(&config.modules.search_paths),
            verifier: IntegrityVerifier::from_config(&config.security),
            loader: ModuleLoader::default(),
            registry,
            enabled: EnabledModules::new(&config.modules.enabled_file),
            validator: ManifestValidator::new(),
            quiet: config.modules.quiet,
            max_depth: config.modules.max_dependency_depth,
        }
    }

    /// Use compiled modules from `catalog` in place of their script files
    pub fn with_catalog(mut self, catalog: ModuleCatalog) -> Self {
        self.loader = ModuleLoader::new(catalog);
        self
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    pub fn discovery(&self) -> &ModuleDiscovery {
        &self.discovery
    }

    pub fn enabled(&self) -> &EnabledModules {
        &self.enabled
    }

    /// Load a module and its dependencies into `ctx`
    pub fn load_module(&self, name: &str, ctx: &mut SessionContext, options: LoadOptions) -> LoadReport {
        let mut warnings = Vec::new();
        let mut chain = Vec::new();
        let status = self.load_at_depth(
            name,
            ctx,
            &mut chain,
            Origin::Direct,
            options,
            &mut warnings,
        );

        for warning in &warnings {
            emit_warning(warning, self.quiet);
        }
        debug!("Load of {} finished: {:?}", name, status);

        LoadReport {
            name: name.to_string(),
            status,
            warnings,
        }
    }

    /// Load every module on the enabled list, in list order
    ///
    /// Modules loaded here are already on the list, so nothing is persisted.
    pub fn load_enabled(&self, ctx: &mut SessionContext) -> SessionReport {
        let mut report = SessionReport::default();

        let names = match self.enabled.list() {
            Ok(names) => names,
            Err(e) => {
                let warning = ModuleWarning::Persistence {
                    reason: e.to_string(),
                };
                emit_warning(&warning, self.quiet);
                report.warnings.push(warning);
                return report;
            }
        };

        info!("Loading {} enabled modules", names.len());
        let options = LoadOptions {
            force: false,
            persist: false,
        };
        for name in names {
            report.reports.push(self.load_module(&name, ctx, options));
        }
        report
    }

    /// `chain` holds the modules this load is nested in, outermost first;
    /// its length is the dependency depth of `name`.
    fn load_at_depth(
        &self,
        name: &str,
        ctx: &mut SessionContext,
        chain: &mut Vec<String>,
        origin: Origin,
        options: LoadOptions,
        warnings: &mut Vec<ModuleWarning>,
    ) -> LoadStatus {
        if !is_valid_module_name(name) {
            warnings.push(ModuleWarning::InvalidName {
                name: name.to_string(),
            });
            return LoadStatus::Rejected;
        }

        match self.registry.get(name) {
            ModuleState::Loading => {
                trace!("Module {} is already loading", name);
                return LoadStatus::InProgress;
            }
            ModuleState::Loaded if !options.force => {
                trace!("Module {} already loaded", name);
                return LoadStatus::AlreadyLoaded;
            }
            _ => {}
        }

        let path = match self.discovery.resolve(name) {
            Some(path) => path,
            None => {
                warnings.push(ModuleWarning::NotFound {
                    name: name.to_string(),
                    suggestions: self.discovery.suggest(name),
                });
                return LoadStatus::NotFound;
            }
        };

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warnings.push(ModuleWarning::ExecutionFailure {
                    name: name.to_string(),
                    reason: ModuleError::io(&path, e).to_string(),
                });
                return LoadStatus::Failed;
            }
        };

        let verdict = self.verifier.verify_bytes(&path, &bytes);
        warnings.extend(verdict.warnings);
        if !verdict.allowed {
            return LoadStatus::Blocked;
        }

        let source = String::from_utf8_lossy(&bytes).into_owned();
        let manifest = ModuleManifest::from_source(name, &path, &source);
        if let ValidationResult::Invalid(errors) = self.validator.validate(&manifest) {
            debug!("Module {} manifest problems: {:?}", name, errors);
        }

        if !self.registry.begin_loading(name, options.force) {
            return LoadStatus::InProgress;
        }

        chain.push(name.to_string());
        self.resolve_dependencies(&manifest, ctx, chain, warnings);
        chain.pop();

        let outcome = self.loader.execute(name, &path, &source, ctx);
        self.registry.finish(name, outcome.clone());

        let status = match outcome {
            LoadOutcome::Succeeded => LoadStatus::Loaded,
            LoadOutcome::Failed(reason) => {
                warnings.push(ModuleWarning::ExecutionFailure {
                    name: name.to_string(),
                    reason,
                });
                LoadStatus::Failed
            }
        };

        if origin == Origin::Direct && options.persist {
            match self.enabled.enable(name) {
                Ok(true) => debug!("Added {} to the enabled module list", name),
                Ok(false) => {}
                Err(e) => warnings.push(ModuleWarning::Persistence {
                    reason: e.to_string(),
                }),
            }
        }

        status
    }

    fn resolve_dependencies(
        &self,
        manifest: &ModuleManifest,
        ctx: &mut SessionContext,
        chain: &mut Vec<String>,
        warnings: &mut Vec<ModuleWarning>,
    ) {
        let depth = chain.len().saturating_sub(1);
        let dependency_options = LoadOptions {
            force: false,
            persist: false,
        };

        for dep in ModuleDependencies::loadable(manifest) {
            let state = self.registry.get(&dep);
            let on_chain = chain.contains(&dep);
            match ModuleDependencies::classify(state, on_chain, depth, self.max_depth) {
                DependencyStep::Satisfied => trace!("Dependency {} already loaded", dep),
                DependencyStep::Busy => {
                    warnings.push(ModuleWarning::DependencyInProgress {
                        module: manifest.name.clone(),
                        dependency: dep,
                    });
                }
                step @ (DependencyStep::Cycle | DependencyStep::TooDeep) => {
                    warnings.push(ModuleWarning::CircularDependency {
                        module: manifest.name.clone(),
                        dependency: dep,
                        depth: depth + 1,
                        limit: self.max_depth,
                    });
                    // Past the depth bound the rest of this branch is abandoned
                    if step == DependencyStep::TooDeep {
                        break;
                    }
                }
                DependencyStep::Load => {
                    debug!("Loading dependency {} of {}", dep, manifest.name);
                    let status = self.load_at_depth(
                        &dep,
                        ctx,
                        chain,
                        Origin::Dependency,
                        dependency_options,
                        warnings,
                    );
                    if !status.is_success() {
                        debug!(
                            "Dependency {} of {} ended as {:?}; continuing",
                            dep, manifest.name, status
                        );
                    }
                }
            }
        }
    }

    /// Add a module to the enabled list without loading it
    pub fn enable(&self, name: &str) -> Result<bool, ModuleError> {
        if !is_valid_module_name(name) {
            return Err(ModuleError::InvalidName(name.to_string()));
        }
        if self.discovery.resolve(name).is_none() {
            return Err(ModuleError::ModuleNotFound(name.to_string()));
        }
        self.enabled.enable(name)
    }

    /// Remove a module from the enabled list
    ///
    /// Takes effect at the next session; the current one keeps it loaded.
    pub fn disable(&self, name: &str) -> Result<bool, ModuleError> {
        self.enabled.disable(name)
    }

    pub fn list_enabled(&self) -> Result<Vec<String>, ModuleError> {
        self.enabled.list()
    }

    /// Every discoverable module with its metadata
    pub fn available(&self) -> Vec<ModuleSummary> {
        let enabled = with_default(|| self.enabled.list(), Vec::new(), "Failed to read enabled list");

        self.discovery
            .discover()
            .into_iter()
            .map(|found| {
                let manifest = with_default(
                    || ModuleManifest::from_file(&found.name, &found.path),
                    ModuleManifest::from_source(&found.name, &found.path, ""),
                    "Failed to read module manifest",
                );
                ModuleSummary {
                    enabled: enabled.contains(&found.name),
                    state: self.registry.entry(&found.name).state,
                    name: found.name,
                    path: found.path,
                    description: manifest.description,
                    dependencies: manifest.dependencies,
                }
            })
            .collect()
    }

    fn locate(&self, name: &str) -> Result<PathBuf, ModuleError> {
        if !is_valid_module_name(name) {
            return Err(ModuleError::InvalidName(name.to_string()));
        }
        self.discovery
            .resolve(name)
            .ok_or_else(|| ModuleError::ModuleNotFound(name.to_string()))
    }

    /// Write the `.hmac` sidecar for a module, returning its path
    pub fn sign(&self, name: &str) -> Result<PathBuf, ModuleError> {
        let path = self.locate(name)?;
        sign_file(self.verifier.key(), &path)
    }

    /// Verify a module without loading it
    pub fn verify(&self, name: &str) -> Result<Verdict, ModuleError> {
        let path = self.locate(name)?;
        self.verifier.verify(&path)
    }

    /// Registry state of every module seen this session
    pub fn status(&self) -> Vec<ModuleStatus> {
        self.registry
            .all()
            .into_iter()
            .map(|(name, entry)| ModuleStatus {
                name,
                state: entry.state,
                outcome: entry.outcome,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ModuleManager) {
        let dir = TempDir::new().unwrap();
        let modules = dir.path().join("modules");
        fs::create_dir_all(&modules).unwrap();

        let mut config = SentinelConfig::default();
        config.modules.search_paths = vec![modules];
        config.modules.enabled_file = dir.path().join("enabled");
        config.modules.quiet = true;
        config.security.hmac_key = Some("unit-test".to_string());
        let manager = ModuleManager::new(&config);
        (dir, manager)
    }

    fn write(dir: &TempDir, name: &str, body: &str) {
        let path = dir.path().join("modules").join(format!("{}.module", name));
        fs::write(&path, body).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        }
    }

    #[test]
    fn test_invalid_name_touches_nothing() {
        let (_dir, manager) = setup();
        let mut ctx = SessionContext::new();
        let report = manager.load_module("../etc", &mut ctx, LoadOptions::default());
        assert_eq!(report.status, LoadStatus::Rejected);
        assert!(manager.registry().all().is_empty());
    }

    #[test]
    fn test_direct_load_persists_dependency_does_not() {
        let (dir, manager) = setup();
        write(&dir, "base", "BASE=1\n");
        write(&dir, "top", "SENTINEL_MODULE_DEPENDENCIES=\"base\"\nTOP=1\n");

        let mut ctx = SessionContext::new();
        let report = manager.load_module("top", &mut ctx, LoadOptions::default());
        assert_eq!(report.status, LoadStatus::Loaded);
        assert!(!report.has_warnings());
        assert_eq!(manager.list_enabled().unwrap(), vec!["top"]);
        assert_eq!(ctx.executed(), ["base".to_string(), "top".to_string()]);
    }

    #[test]
    fn test_forced_reload_executes_again() {
        let (dir, manager) = setup();
        write(&dir, "counter", "RUNS=\"${RUNS}x\"\n");

        let mut ctx = SessionContext::new();
        manager.load_module("counter", &mut ctx, LoadOptions::default());
        let again = manager.load_module("counter", &mut ctx, LoadOptions::default());
        assert_eq!(again.status, LoadStatus::AlreadyLoaded);
        assert_eq!(ctx.var("RUNS"), Some("x"));

        let forced = manager.load_module(
            "counter",
            &mut ctx,
            LoadOptions {
                force: true,
                persist: true,
            },
        );
        assert_eq!(forced.status, LoadStatus::Loaded);
        assert_eq!(ctx.var("RUNS"), Some("xx"));
    }

    #[test]
    fn test_status_reports_failed_outcome() {
        let (dir, manager) = setup();
        write(&dir, "broken", "exit 4\n");

        let mut ctx = SessionContext::new();
        let report = manager.load_module("broken", &mut ctx, LoadOptions::default());
        assert_eq!(report.status, LoadStatus::Failed);

        let status = manager.status();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].state, ModuleState::Loaded);
        assert!(matches!(status[0].outcome, Some(LoadOutcome::Failed(_))));
    }

    #[test]
    fn test_enable_requires_existing_module() {
        let (dir, manager) = setup();
        write(&dir, "real", "X=1\n");
        assert!(manager.enable("real").unwrap());
        assert!(matches!(
            manager.enable("ghost"),
            Err(ModuleError::ModuleNotFound(_))
        ));
    }

    #[test]
    fn test_available_lists_metadata() {
        let (dir, manager) = setup();
        write(&dir, "fzf", "SENTINEL_MODULE_DESCRIPTION=\"Fuzzy finder\"\n");
        write(&dir, "git", "SENTINEL_MODULE_DEPENDENCIES=\"fzf\"\n");
        manager.enable("git").unwrap();

        let available = manager.available();
        assert_eq!(available.len(), 2);
        assert_eq!(available[0].name, "fzf");
        assert_eq!(available[0].description.as_deref(), Some("Fuzzy finder"));
        assert!(!available[0].enabled);
        assert_eq!(available[1].dependencies, vec!["fzf"]);
        assert!(available[1].enabled);
    }

    #[test]
    fn test_sign_and_verify_by_name() {
        let (dir, manager) = setup();
        write(&dir, "signed", "X=1\n");
        let sidecar = manager.sign("signed").unwrap();
        assert!(sidecar.ends_with("signed.module.hmac"));
        assert!(manager.verify("signed").unwrap().allowed);
        assert!(manager.verify("missing").is_err());
    }
}
