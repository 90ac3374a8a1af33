//! Module manifest extraction
//!
//! Reads a module's metadata (`SENTINEL_MODULE_DEPENDENCIES`,
//! `SENTINEL_MODULE_DESCRIPTION`) by text search over its source. The file is
//! never executed to obtain the manifest.

use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::module::traits::ModuleError;

/// Variable holding the space-separated dependency list
pub const DEPENDENCIES_KEY: &str = "SENTINEL_MODULE_DEPENDENCIES";

/// Variable holding the human-readable description
pub const DESCRIPTION_KEY: &str = "SENTINEL_MODULE_DESCRIPTION";

/// Module manifest (metadata declared inside the module file)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleManifest {
    /// Module name
    pub name: String,
    /// Backing file
    pub path: PathBuf,
    /// Human-readable description
    pub description: Option<String>,
    /// Declared dependencies, as written
    pub dependencies: Vec<String>,
}

impl ModuleManifest {
    /// Build a manifest from already-read module source
    pub fn from_source<P: AsRef<Path>>(name: &str, path: P, source: &str) -> Self {
        let dependencies = extract_field(source, DEPENDENCIES_KEY)
            .map(|line| line.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let description = extract_field(source, DESCRIPTION_KEY)
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        Self {
            name: name.to_string(),
            path: path.as_ref().to_path_buf(),
            description,
            dependencies,
        }
    }

    /// Load manifest from a module file
    pub fn from_file<P: AsRef<Path>>(name: &str, path: P) -> Result<Self, ModuleError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| ModuleError::io(path, e))?;
        Ok(Self::from_source(name, path, &String::from_utf8_lossy(&bytes)))
    }
}

fn dependencies_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| field_pattern(DEPENDENCIES_KEY))
        .as_ref()
}

fn description_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| field_pattern(DESCRIPTION_KEY))
        .as_ref()
}

fn field_pattern(key: &str) -> Option<Regex> {
    // Optional declaration keyword, then KEY= with a double-quoted,
    // single-quoted or bare value.
    let pattern = format!(
        r#"(?m)^[ \t]*(?:(?:export|local|readonly|typeset|declare(?:[ \t]+-[A-Za-z]+)*)[ \t]+)?{}=(?:"([^"\n]*)"|'([^'\n]*)'|([^\s;#]*))"#,
        regex::escape(key)
    );
    match Regex::new(&pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::error!("Failed to compile manifest pattern for {}: {}", key, e);
            None
        }
    }
}

/// Extract the value of the first `KEY=value` line for a manifest key
pub fn extract_field<'a>(source: &'a str, key: &str) -> Option<&'a str> {
    let pattern = match key {
        DEPENDENCIES_KEY => dependencies_pattern()?,
        DESCRIPTION_KEY => description_pattern()?,
        _ => return None,
    };

    let captures = pattern.captures(source)?;
    (1..=3)
        .find_map(|i| captures.get(i))
        .map(|m| m.as_str())
}
