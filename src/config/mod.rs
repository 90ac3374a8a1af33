//! Configuration
//!
//! Settings come from an optional TOML file, then `SENTINEL_*` environment
//! variables, which always win.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::module::registry::MAX_DEPENDENCY_DEPTH;
use crate::module::security::{EnforcementPolicy, HmacKey, DEFAULT_ALLOWED_MODES};
use crate::utils::{env_bool, env_list, env_opt, env_or_else};

/// Module discovery and loading configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Directories searched for modules, highest precedence first
    #[serde(default = "default_search_paths")]
    pub search_paths: Vec<PathBuf>,

    /// File listing the modules loaded at session start
    #[serde(default = "default_enabled_file")]
    pub enabled_file: PathBuf,

    /// Dependency nesting bound
    #[serde(default = "default_max_dependency_depth")]
    pub max_dependency_depth: usize,

    /// Suppress warnings on stderr (they are still logged)
    #[serde(default)]
    pub quiet: bool,
}

fn home_dir() -> PathBuf {
    PathBuf::from(env_or_else("HOME", || ".".to_string()))
}

fn default_search_paths() -> Vec<PathBuf> {
    vec![home_dir().join(".bash_modules.d")]
}

fn default_enabled_file() -> PathBuf {
    home_dir().join(".bash_modules")
}

fn default_max_dependency_depth() -> usize {
    MAX_DEPENDENCY_DEPTH
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            search_paths: default_search_paths(),
            enabled_file: default_enabled_file(),
            max_dependency_depth: default_max_dependency_depth(),
            quiet: false,
        }
    }
}

/// Integrity verification configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub permission_policy: EnforcementPolicy,

    /// Accepted file modes (permission bits only)
    #[serde(default = "default_allowed_modes")]
    pub allowed_modes: Vec<u32>,

    /// Check `.hmac` sidecars
    #[serde(default)]
    pub verify_signatures: bool,

    /// Refuse modules without a sidecar
    #[serde(default)]
    pub require_signature: bool,

    /// Refuse modules whose sidecar does not match
    #[serde(default)]
    pub require_valid_signature: bool,

    /// Scan module source for suspicious constructs
    #[serde(default)]
    pub scan_content: bool,

    #[serde(default)]
    pub content_policy: EnforcementPolicy,

    /// HMAC key; derived from the machine id when unset
    #[serde(default)]
    pub hmac_key: Option<String>,

    #[serde(default = "default_machine_id_path")]
    pub machine_id_path: PathBuf,
}

fn default_allowed_modes() -> Vec<u32> {
    DEFAULT_ALLOWED_MODES.to_vec()
}

fn default_machine_id_path() -> PathBuf {
    PathBuf::from("/etc/machine-id")
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            permission_policy: EnforcementPolicy::default(),
            allowed_modes: default_allowed_modes(),
            verify_signatures: false,
            require_signature: false,
            require_valid_signature: false,
            scan_content: false,
            content_policy: EnforcementPolicy::default(),
            hmac_key: None,
            machine_id_path: default_machine_id_path(),
        }
    }
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("permission_policy", &self.permission_policy)
            .field("allowed_modes", &self.allowed_modes)
            .field("verify_signatures", &self.verify_signatures)
            .field("require_signature", &self.require_signature)
            .field("require_valid_signature", &self.require_valid_signature)
            .field("scan_content", &self.scan_content)
            .field("content_policy", &self.content_policy)
            .field("hmac_key", &self.hmac_key.as_ref().map(|_| "<redacted>"))
            .field("machine_id_path", &self.machine_id_path)
            .finish()
    }
}

impl SecurityConfig {
    /// Key for signing and verifying module files
    pub fn resolve_key(&self) -> HmacKey {
        HmacKey::resolve(self.hmac_key.as_deref(), &self.machine_id_path)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive (e.g. "info", "sentinel_modules=debug")
    #[serde(default)]
    pub filter: Option<String>,

    /// Shorthand for a `debug` filter
    #[serde(default)]
    pub debug: bool,

    #[serde(default)]
    pub json_format: bool,
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SentinelConfig {
    #[serde(default)]
    pub modules: ModuleConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SentinelConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: SentinelConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_toml_file(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// File (if any), then environment overrides, then validation
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `SENTINEL_*` environment variables on top of current values
    pub fn apply_env_overrides(&mut self) {
        if let Some(dirs) = env_list("SENTINEL_MODULE_DIRS", ':') {
            debug!("Module search paths from environment: {:?}", dirs);
            self.modules.search_paths = dirs.into_iter().map(PathBuf::from).collect();
        }
        if let Some(file) = env_opt("SENTINEL_ENABLED_MODULES_FILE").filter(|f| !f.is_empty()) {
            self.modules.enabled_file = PathBuf::from(file);
        }
        if env_bool("SENTINEL_QUIET_MODULES") {
            self.modules.quiet = true;
        }
        if env_bool("SENTINEL_DEBUG_MODULES") {
            self.logging.debug = true;
        }

        let security = &mut self.security;
        if env_bool("SENTINEL_STRICT_PERMISSIONS") {
            security.permission_policy = EnforcementPolicy::Strict;
        }
        if env_bool("SENTINEL_VERIFY_MODULES") {
            security.verify_signatures = true;
        }
        if env_bool("SENTINEL_REQUIRE_HMAC") {
            security.require_signature = true;
        }
        if env_bool("SENTINEL_REQUIRE_VALID_HMAC") {
            security.require_valid_signature = true;
        }
        if env_bool("SENTINEL_CHECK_MODULES_CONTENT") {
            security.scan_content = true;
        }
        if env_bool("SENTINEL_BLOCK_SUSPICIOUS_MODULES") {
            security.scan_content = true;
            security.content_policy = EnforcementPolicy::Strict;
        }
        if let Some(key) = env_opt("SENTINEL_HMAC_KEY").filter(|k| !k.is_empty()) {
            security.hmac_key = Some(key);
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.modules.search_paths.is_empty() {
            bail!("modules.search_paths must name at least one directory");
        }
        if self.modules.max_dependency_depth == 0 {
            bail!("modules.max_dependency_depth must be at least 1");
        }
        if let Some(mode) = self.security.allowed_modes.iter().find(|m| **m > 0o777) {
            bail!("security.allowed_modes entry {:o} is not a permission mode", mode);
        }
        Ok(())
    }

    /// Effective log filter
    pub fn log_filter(&self) -> Option<&str> {
        if self.logging.debug {
            Some("debug")
        } else {
            self.logging.filter.as_deref()
        }
    }
}
