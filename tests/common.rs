//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use sentinel_modules::config::SentinelConfig;
use sentinel_modules::module::ModuleManager;

/// Isolated module root, enabled list and config
pub struct ModuleFixture {
    pub temp_dir: TempDir,
    pub modules_dir: PathBuf,
    pub config: SentinelConfig,
}

impl ModuleFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let modules_dir = temp_dir.path().join("modules.d");
        fs::create_dir_all(&modules_dir).unwrap();

        let mut config = SentinelConfig::default();
        config.modules.search_paths = vec![modules_dir.clone()];
        config.modules.enabled_file = temp_dir.path().join("enabled_modules");
        config.modules.quiet = true;
        config.security.hmac_key = Some("integration-test-key".to_string());
        config.security.machine_id_path = temp_dir.path().join("machine-id");

        Self {
            temp_dir,
            modules_dir,
            config,
        }
    }

    pub fn enabled_file(&self) -> &Path {
        &self.config.modules.enabled_file
    }

    /// Write `<name>.module` with mode 0644
    pub fn write_module(&self, name: &str, body: &str) -> PathBuf {
        self.write_module_with_mode(name, body, 0o644)
    }

    pub fn write_module_with_mode(&self, name: &str, body: &str, mode: u32) -> PathBuf {
        let path = self.modules_dir.join(format!("{}.module", name));
        fs::write(&path, body).unwrap();
        set_mode(&path, mode);
        path
    }

    /// Module that exports a marker variable and depends on `deps`
    pub fn write_simple(&self, name: &str, deps: &[&str]) -> PathBuf {
        let body = format!(
            "SENTINEL_MODULE_DEPENDENCIES=\"{}\"\nexport LOADED_{}=1\n",
            deps.join(" "),
            name.to_uppercase()
        );
        self.write_module(name, &body)
    }

    pub fn write_enabled(&self, contents: &str) {
        fs::write(self.enabled_file(), contents).unwrap();
    }

    pub fn read_enabled(&self) -> String {
        fs::read_to_string(self.enabled_file()).unwrap_or_default()
    }

    pub fn manager(&self) -> ModuleManager {
        ModuleManager::new(&self.config)
    }
}

#[cfg(unix)]
pub fn set_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
}

#[cfg(not(unix))]
pub fn set_mode(_path: &Path, _mode: u32) {}
