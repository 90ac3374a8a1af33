//! Persisted list of modules enabled for every new session
//!
//! Plain text, one module name per line. `#` comments and blank lines are
//! ignored when reading and kept when the file is rewritten.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::module::traits::ModuleError;
use crate::module::validation::is_valid_module_name;

/// Enabled module list backed by a file
#[derive(Debug)]
pub struct EnabledModules {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl EnabledModules {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the list (and its parent directory) if it does not exist
    pub fn ensure_exists(&self) -> Result<(), ModuleError> {
        if self.path.exists() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ModuleError::io(parent, e))?;
        }
        fs::File::create(&self.path).map_err(|e| ModuleError::io(&self.path, e))?;
        debug!("Created empty enabled module list at {:?}", self.path);
        Ok(())
    }

    fn read_raw(&self) -> Result<String, ModuleError> {
        self.ensure_exists()?;
        fs::read_to_string(&self.path).map_err(|e| ModuleError::io(&self.path, e))
    }

    /// Enabled module names in file order, without duplicates
    pub fn list(&self) -> Result<Vec<String>, ModuleError> {
        Ok(parse_enabled_list(&self.read_raw()?))
    }

    pub fn contains(&self, name: &str) -> Result<bool, ModuleError> {
        Ok(self.list()?.iter().any(|n| n == name))
    }

    /// Append a module unless already present
    ///
    /// Returns whether the file changed.
    pub fn enable(&self, name: &str) -> Result<bool, ModuleError> {
        if !is_valid_module_name(name) {
            return Err(ModuleError::InvalidName(name.to_string()));
        }

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let contents = self.read_raw()?;
        if parse_enabled_list(&contents).iter().any(|n| n == name) {
            return Ok(false);
        }

        let mut updated = contents;
        if !updated.is_empty() && !updated.ends_with('\n') {
            updated.push('\n');
        }
        updated.push_str(name);
        updated.push('\n');
        self.write_atomic(&updated)?;
        info!("Enabled module {}", name);
        Ok(true)
    }

    /// Remove every line naming the module
    ///
    /// Returns whether the file changed; disabling an absent module is not
    /// an error.
    pub fn disable(&self, name: &str) -> Result<bool, ModuleError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let contents = self.read_raw()?;

        let kept: Vec<&str> = contents.lines().filter(|line| line.trim() != name).collect();
        if kept.len() == contents.lines().count() {
            return Ok(false);
        }

        let mut updated = kept.join("\n");
        if !updated.is_empty() {
            updated.push('\n');
        }
        self.write_atomic(&updated)?;
        info!("Disabled module {}", name);
        Ok(true)
    }

    /// Replace the file via a temporary file in the same directory
    fn write_atomic(&self, contents: &str) -> Result<(), ModuleError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ModuleError::io(dir, e))?;
        tmp.write_all(contents.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| ModuleError::io(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| ModuleError::io(&self.path, e.error))?;
        Ok(())
    }
}

/// Parse enabled-list contents: trimmed names, no comments, no blanks,
/// first occurrence kept
pub fn parse_enabled_list(contents: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if !names.iter().any(|n| n == line) {
            names.push(line.to_string());
        }
    }
    names
}
