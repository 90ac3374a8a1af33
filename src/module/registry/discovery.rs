//! Module discovery
//!
//! Locates module files (`<name>.module` / `<name>.sh`) across an ordered
//! list of search roots.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::module::validation::is_valid_module_name;

/// Recognized module file extensions, in precedence order
pub const MODULE_EXTENSIONS: [&str; 2] = ["module", "sh"];

/// Discovered module information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredModule {
    /// Module name (file stem)
    pub name: String,
    /// Path to the module file
    pub path: PathBuf,
    /// Search root it was found under
    pub root: PathBuf,
}

/// Module discovery scanner
#[derive(Debug, Clone)]
pub struct ModuleDiscovery {
    /// Search roots, highest precedence first
    roots: Vec<PathBuf>,
}

impl ModuleDiscovery {
    /// Create a new module discovery scanner
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self {
            roots: roots.into_iter().map(|p| p.as_ref().to_path_buf()).collect(),
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Resolve a module name to its backing file
    ///
    /// Every root's top level is checked before any recursive search; within
    /// the recursive pass roots are walked in order, entries sorted by name.
    /// Returns `None` when no root has the module.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        if !is_valid_module_name(name) {
            return None;
        }

        for root in &self.roots {
            for ext in MODULE_EXTENSIONS {
                let candidate = root.join(format!("{}.{}", name, ext));
                if candidate.is_file() {
                    trace!("Found module {} at {:?}", name, candidate);
                    return Some(candidate);
                }
            }
        }

        for root in &self.roots {
            if let Some(path) = self.walk(root).find(|path| module_name_of(path).as_deref() == Some(name)) {
                debug!("Found module {} in subdirectory: {:?}", name, path);
                return Some(path);
            }
        }

        trace!("Module {} not found under {:?}", name, self.roots);
        None
    }

    /// Discover all modules under the search roots
    ///
    /// When a name exists more than once, the file `resolve` would pick wins.
    /// The result is sorted by module name.
    pub fn discover(&self) -> Vec<DiscoveredModule> {
        let mut seen = HashSet::new();
        let mut modules = Vec::new();

        for root in &self.roots {
            for ext in MODULE_EXTENSIONS {
                for path in self.top_level(root) {
                    if path.extension().and_then(|e| e.to_str()) != Some(ext) {
                        continue;
                    }
                    if let Some(name) = module_name_of(&path) {
                        if seen.insert(name.clone()) {
                            modules.push(DiscoveredModule {
                                name,
                                path,
                                root: root.clone(),
                            });
                        }
                    }
                }
            }
        }

        for root in &self.roots {
            for path in self.walk(root) {
                if let Some(name) = module_name_of(&path) {
                    if seen.insert(name.clone()) {
                        modules.push(DiscoveredModule {
                            name,
                            path,
                            root: root.clone(),
                        });
                    }
                }
            }
        }

        modules.sort_by(|a, b| a.name.cmp(&b.name));
        debug!("Discovered {} modules", modules.len());
        modules
    }

    /// Names of discoverable modules similar to `name`
    ///
    /// A candidate matches when either name contains the other,
    /// case-insensitively.
    pub fn suggest(&self, name: &str) -> Vec<String> {
        let query = name.to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }

        self.discover()
            .into_iter()
            .map(|m| m.name)
            .filter(|candidate| {
                let candidate = candidate.to_lowercase();
                candidate != query && (candidate.contains(&query) || query.contains(&candidate))
            })
            .collect()
    }

    /// Regular files directly under a root, sorted by file name
    ///
    /// Both passes follow symlinks, so a link to a module file counts as the
    /// file wherever it sits.
    fn top_level(&self, root: &Path) -> Vec<PathBuf> {
        WalkDir::new(root)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .collect()
    }

    /// Regular files in subdirectories of a root, lexicographic traversal
    fn walk<'a>(&self, root: &'a Path) -> impl Iterator<Item = PathBuf> + 'a {
        WalkDir::new(root)
            .min_depth(2)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(move |entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!("Skipping unreadable entry under {:?}: {}", root, e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
    }
}

/// Module name for a path, if it names a module file
pub fn module_name_of(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?;
    if !MODULE_EXTENSIONS.contains(&ext) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    is_valid_module_name(stem).then(|| stem.to_string())
}
