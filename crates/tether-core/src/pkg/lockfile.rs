//! Lockfile types for reproducible vendoring.
//!
//! The lockfile records the exact revision of every repository in the
//! resolved dependency set so `tether install` can recreate the vendor
//! directory without re-walking the import graph.
//!
//! ## File Format
//!
//! A JSON file named `tether.lock`:
//!
//! ```json
//! {
//!   "lockfile_version": 1,
//!   "hash": "<blake3 of tether.json>",
//!   "updated": "2024-01-01T00:00:00+00:00",
//!   "imports": [{ "name": "github.com/org/repo", "version": "<rev>" }],
//!   "dev_imports": []
//! }
//! ```

use super::dependency::{Dependency, VcsKind};
use super::error::PkgError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// Schema version for the lockfile format.
pub const PKG_LOCK_SCHEMA_VERSION: u32 = 1;

/// Lockfile filename.
pub const LOCKFILE_NAME: &str = "tether.lock";

/// A locked repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedDependency {
    /// Repository root import path.
    pub name: String,
    /// Exact revision (or the requested reference when no pin was known).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, rename = "repo", skip_serializing_if = "String::is_empty")]
    pub repository: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vcs: Option<VcsKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subpackages: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub os: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arch: Vec<String>,
}

impl LockedDependency {
    /// Lock a dependency at its pin, falling back to the requested reference.
    #[must_use]
    pub fn from_dependency(dep: &Dependency) -> Self {
        let version = if dep.pin.is_empty() {
            dep.reference.clone()
        } else {
            dep.pin.clone()
        };
        Self {
            name: dep.name.clone(),
            version,
            repository: dep.repository.clone(),
            vcs: dep.vcs,
            subpackages: dep.subpackages.clone(),
            os: dep.os.clone(),
            arch: dep.arch.clone(),
        }
    }

    /// Dependency record requesting exactly the locked version.
    #[must_use]
    pub fn to_dependency(&self) -> Dependency {
        Dependency {
            name: self.name.clone(),
            reference: self.version.clone(),
            pin: String::new(),
            repository: self.repository.clone(),
            vcs: self.vcs,
            subpackages: self.subpackages.clone(),
            os: self.os.clone(),
            arch: self.arch.clone(),
        }
    }
}

/// The lockfile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lockfile {
    pub lockfile_version: u32,
    /// BLAKE3 of the manifest the lock was generated from.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
    /// When the lock was generated (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(default)]
    pub imports: Vec<LockedDependency>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dev_imports: Vec<LockedDependency>,
}

impl Default for Lockfile {
    fn default() -> Self {
        Self {
            lockfile_version: PKG_LOCK_SCHEMA_VERSION,
            hash: String::new(),
            updated: None,
            imports: Vec::new(),
            dev_imports: Vec::new(),
        }
    }
}

impl Lockfile {
    /// Build a lock from resolved dependency lists, stamped with the current time.
    #[must_use]
    pub fn from_dependencies(
        hash: impl Into<String>,
        imports: &[Dependency],
        dev_imports: &[Dependency],
    ) -> Self {
        Self {
            lockfile_version: PKG_LOCK_SCHEMA_VERSION,
            hash: hash.into(),
            updated: Some(chrono::Utc::now().to_rfc3339()),
            imports: imports.iter().map(LockedDependency::from_dependency).collect(),
            dev_imports: dev_imports
                .iter()
                .map(LockedDependency::from_dependency)
                .collect(),
        }
    }

    /// Read a lockfile, returning `None` if it does not exist.
    ///
    /// # Errors
    /// Returns `PKG_LOCK_INVALID` if the file cannot be read, parsed, or has
    /// an unsupported schema version.
    pub fn read_from(path: &Path) -> Result<Option<Self>, PkgError> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(PkgError::lock_invalid(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )))
            }
        };

        let lockfile: Self = serde_json::from_str(&content).map_err(|e| {
            PkgError::lock_invalid(format!("Invalid lockfile JSON in {}: {e}", path.display()))
        })?;

        if lockfile.lockfile_version != PKG_LOCK_SCHEMA_VERSION {
            return Err(PkgError::lock_invalid(format!(
                "Lockfile version {} not supported (expected {})",
                lockfile.lockfile_version, PKG_LOCK_SCHEMA_VERSION
            )));
        }

        Ok(Some(lockfile))
    }

    /// Write the lockfile atomically.
    ///
    /// # Errors
    /// Returns `PKG_LOCK_WRITE_FAILED` if serialization or the write fails.
    pub fn write_to(&self, path: &Path) -> Result<(), PkgError> {
        let mut content = serde_json::to_string_pretty(self)
            .map_err(|e| PkgError::lock_write_failed(format!("Failed to serialize lockfile: {e}")))?;
        content.push('\n');

        tether_util::fs::atomic_write(path, content.as_bytes())
            .map_err(|e| PkgError::lock_write_failed(format!("Failed to write lockfile: {e}")))
    }

    /// Whether the lock was generated from a manifest with this hash.
    #[must_use]
    pub fn matches_hash(&self, hash: &str) -> bool {
        !self.hash.is_empty() && self.hash == hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_locks_pin_over_reference() {
        let mut dep = Dependency::new("github.com/org/repo").with_reference("master");
        assert_eq!(LockedDependency::from_dependency(&dep).version, "master");

        dep.pin = "3f2a9c1".to_string();
        let locked = LockedDependency::from_dependency(&dep);
        assert_eq!(locked.version, "3f2a9c1");

        // Installing from the lock requests the pinned revision
        assert_eq!(locked.to_dependency().reference, "3f2a9c1");
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(LOCKFILE_NAME);
        let mut dep = Dependency::new("github.com/org/repo").with_vcs(VcsKind::Git);
        dep.add_subpackage("sub");
        dep.pin = "abc123".to_string();

        let lock = Lockfile::from_dependencies("h1", &[dep], &[]);
        lock.write_to(&path).unwrap();

        let read = Lockfile::read_from(&path).unwrap().unwrap();
        assert_eq!(read, lock);
        assert!(read.matches_hash("h1"));
        assert!(!read.matches_hash("h2"));
    }

    #[test]
    fn test_read_missing_is_none() {
        let dir = tempdir().unwrap();
        assert!(Lockfile::read_from(&dir.path().join(LOCKFILE_NAME))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_read_rejects_bad_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(LOCKFILE_NAME);
        fs::write(&path, r#"{"lockfile_version": 99, "imports": []}"#).unwrap();

        let err = Lockfile::read_from(&path).unwrap_err();
        assert_eq!(err.code(), "PKG_LOCK_INVALID");
    }

    #[test]
    fn test_read_rejects_bad_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(LOCKFILE_NAME);
        fs::write(&path, "not json").unwrap();

        assert!(Lockfile::read_from(&path).is_err());
    }
}
