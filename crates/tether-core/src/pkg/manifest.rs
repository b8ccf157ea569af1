//! Project manifest (`tether.json`).
//!
//! ```json
//! {
//!   "package": "github.com/me/project",
//!   "imports": [{ "package": "github.com/org/lib", "version": "v1.2.0" }],
//!   "dev_imports": [],
//!   "ignore": ["github.com/me/project/internal"]
//! }
//! ```

use super::dependency::Dependency;
use super::error::PkgError;
use super::lockfile::{Lockfile, LOCKFILE_NAME};
use super::name::normalize_name;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{info, warn};

/// Manifest filename.
pub const MANIFEST_NAME: &str = "tether.json";

/// A project's declared dependencies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// The project's own import path (its repository root).
    #[serde(default, rename = "package")]
    pub name: String,
    #[serde(default)]
    pub imports: Vec<Dependency>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dev_imports: Vec<Dependency>,
    /// Import paths (or path prefixes) never fetched or pinned.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore: Vec<String>,
}

impl Manifest {
    /// Load the manifest at `path`.
    ///
    /// # Errors
    /// `PKG_MANIFEST_NOT_FOUND` if absent, `PKG_MANIFEST_INVALID` if unreadable
    /// or not valid JSON.
    pub fn load(path: &Path) -> Result<Self, PkgError> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(PkgError::manifest_not_found(path))
            }
            Err(e) => {
                return Err(PkgError::manifest_invalid(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )))
            }
        };

        serde_json::from_str(&content).map_err(|e| {
            PkgError::manifest_invalid(format!("Invalid JSON in {}: {e}", path.display()))
        })
    }

    /// Whether `name` is ignored, exactly or as a nested path of an entry.
    #[must_use]
    pub fn has_ignore(&self, name: &str) -> bool {
        self.ignore.iter().any(|ig| {
            let ig = ig.trim_end_matches('/');
            name == ig
                || name
                    .strip_prefix(ig)
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    /// Whether `name` is a declared import or dev import.
    #[must_use]
    pub fn has_dependency(&self, name: &str) -> bool {
        self.imports
            .iter()
            .chain(&self.dev_imports)
            .any(|d| d.name == name)
    }

    /// Write the manifest atomically as pretty-printed JSON.
    ///
    /// # Errors
    /// `PKG_MANIFEST_INVALID` if serialization or the write fails.
    pub fn write_to(&self, path: &Path) -> Result<(), PkgError> {
        let mut content = serde_json::to_string_pretty(self)?;
        content.push('\n');
        tether_util::fs::atomic_write(path, content.as_bytes()).map_err(|e| {
            PkgError::manifest_invalid(format!("Failed to write {}: {e}", path.display()))
        })
    }

    /// Add import paths to the manifest as repository roots.
    ///
    /// Each name may carry a reference as `name#reference`. A root already
    /// declared gains the name's subpackage instead of a second record; a
    /// root only declared as a dev import moves to `imports` unless `dev` is
    /// set. Ignored roots are skipped. Returns how many records or
    /// subpackages were added.
    ///
    /// # Errors
    /// `PKG_NAME_INVALID` when a name has no repository root.
    pub fn add_packages<S: AsRef<str>>(&mut self, names: &[S], dev: bool) -> Result<usize, PkgError> {
        let mut added = 0;

        for name in names {
            let name = name.as_ref();
            let (path, reference) = name.split_once('#').unwrap_or((name, ""));
            let (root, sub) = normalize_name(path);
            if root.is_empty() {
                return Err(PkgError::name_invalid(name));
            }

            if self.has_dependency(&root) {
                let moved = !dev && self.promote(&root);
                let list = if dev && !self.imports.iter().any(|d| d.name == root) {
                    &mut self.dev_imports
                } else {
                    &mut self.imports
                };
                let Some(dep) = list.iter_mut().find(|d| d.name == root) else {
                    continue;
                };

                if !sub.is_empty() && !dep.subpackages.contains(&sub) {
                    info!(package = %root, subpackage = %sub, "Adding subpackage to existing import");
                    dep.add_subpackage(&sub);
                    added += 1;
                } else if moved {
                    added += 1;
                } else {
                    warn!(package = %name, "Already in {MANIFEST_NAME}, skipping");
                }
                continue;
            }

            if self.has_ignore(&root) {
                warn!(package = %root, "Set to be ignored in {MANIFEST_NAME}, skipping");
                continue;
            }

            let mut dep = Dependency::new(root).with_reference(reference);
            dep.add_subpackage(&sub);
            info!(package = %dep.name, reference = %dep.reference, dev, "Adding to manifest");
            if dev {
                self.dev_imports.push(dep);
            } else {
                self.imports.push(dep);
            }
            added += 1;
        }

        Ok(added)
    }

    /// Move `root` from dev imports to imports, returning whether it moved.
    fn promote(&mut self, root: &str) -> bool {
        if self.imports.iter().any(|d| d.name == root) {
            return false;
        }
        let Some(i) = self.dev_imports.iter().position(|d| d.name == root) else {
            return false;
        };
        info!(package = %root, "Moving from dev imports to imports");
        let dep = self.dev_imports.remove(i);
        self.imports.push(dep);
        true
    }

    /// Normalize every entry to its repository root and merge duplicates.
    ///
    /// An entry naming a subpackage (`github.com/org/repo/sub`) becomes the
    /// root with `sub` recorded as a subpackage. Order of first appearance
    /// is kept.
    pub fn dedupe(&mut self) {
        self.imports = dedupe_dependencies(std::mem::take(&mut self.imports));
        self.dev_imports = dedupe_dependencies(std::mem::take(&mut self.dev_imports));
    }
}

fn dedupe_dependencies(deps: Vec<Dependency>) -> Vec<Dependency> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(deps.len());
    let mut out: Vec<Dependency> = Vec::with_capacity(deps.len());

    for mut dep in deps {
        let (root, sub) = normalize_name(&dep.name);
        if root != dep.name {
            dep.name.clone_from(&root);
            let existing = std::mem::take(&mut dep.subpackages);
            dep.add_subpackage(&sub);
            for sp in &existing {
                dep.add_subpackage(sp);
            }
        }

        match index.get(&root) {
            Some(&i) => out[i].merge(&dep),
            None => {
                index.insert(root, out.len());
                out.push(dep);
            }
        }
    }

    out
}

/// Requirements a vendored package declares for itself.
///
/// Prefers the package's lockfile (exact versions) over its manifest.
/// Returns `Ok(None)` when the package declares nothing.
///
/// # Errors
/// Returns the read/parse error of whichever file was present.
pub fn read_declared(dir: &Path) -> Result<Option<Vec<Dependency>>, PkgError> {
    if let Some(lock) = Lockfile::read_from(&dir.join(LOCKFILE_NAME))? {
        let deps = lock
            .imports
            .iter()
            .map(super::lockfile::LockedDependency::to_dependency)
            .collect();
        return Ok(Some(deps));
    }

    let manifest_path = dir.join(MANIFEST_NAME);
    if !manifest_path.exists() {
        return Ok(None);
    }
    let mut manifest = Manifest::load(&manifest_path)?;
    manifest.dedupe();
    Ok(Some(manifest.imports))
}
