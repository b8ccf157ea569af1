//! Walker callbacks used during `update`.
//!
//! [`MissingPackageResolver`] fetches packages the walker could not find.
//! [`VersionReconciler`] pins every repository root to one revision the
//! first time it is seen, and reports conflicting requests for it later.

use super::dependency::Dependency;
use super::error::PkgError;
use super::manifest::{read_declared, Manifest};
use super::name::root_of;
use super::vcs::{GetOptions, Vcs};
use super::walker::{MissingPackageHandler, VersionHandler};
use crate::paths::find_local_source;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tether_util::fs::copy_dir;
use tracing::{debug, error, info, warn};

/// True when `pkg` belongs to the project itself or is ignored.
fn is_skipped(root_package: &str, manifest: &Manifest, root: &str, pkg: &str) -> bool {
    (!root_package.is_empty() && root == root_package)
        || manifest.has_ignore(root)
        || manifest.has_ignore(pkg)
}

/// Fetches missing packages into the vendor directory.
pub struct MissingPackageResolver<'a> {
    destination: PathBuf,
    root_package: String,
    manifest: &'a Manifest,
    vcs: &'a dyn Vcs,
    opts: GetOptions,
}

impl<'a> MissingPackageResolver<'a> {
    pub fn new(
        destination: &Path,
        root_package: &str,
        manifest: &'a Manifest,
        vcs: &'a dyn Vcs,
        opts: GetOptions,
    ) -> Self {
        Self {
            destination: destination.to_path_buf(),
            root_package: root_package.to_string(),
            manifest,
            vcs,
            opts,
        }
    }

    /// The manifest's own record for `root`, so its repository override is used.
    fn record_for(&self, root: &str) -> Dependency {
        self.manifest
            .imports
            .iter()
            .chain(&self.manifest.dev_imports)
            .find(|d| d.name == root)
            .cloned()
            .unwrap_or_else(|| Dependency::new(root))
    }
}

impl MissingPackageHandler for MissingPackageResolver<'_> {
    fn not_found(&mut self, pkg: &str) -> Result<bool, PkgError> {
        let root = root_of(pkg);
        if is_skipped(&self.root_package, self.manifest, &root, pkg) {
            return Ok(false);
        }

        let dest = self.destination.join(&root);
        // Another branch of the walk may have fetched it already
        if dest.exists() {
            debug!(package = pkg, "Already fetched");
            return Ok(true);
        }

        info!(package = pkg, destination = %self.destination.display(), "Fetching into vendor");
        let dep = self.record_for(&root);
        self.vcs
            .get(&dep, &dest, &self.opts)
            .map_err(|e| PkgError::fetch_failed(&root, e))?;
        Ok(true)
    }

    fn on_local_source(&mut self, pkg: &str) -> Result<bool, PkgError> {
        if !self.opts.use_local_source {
            return self.not_found(pkg);
        }

        let root = root_of(pkg);
        if is_skipped(&self.root_package, self.manifest, &root, pkg) {
            return Ok(false);
        }

        let Some(src) = find_local_source(&self.opts.source_roots, pkg) else {
            error!(
                package = pkg,
                "Could not locate package in any local source root, though it was found there before"
            );
            return Ok(false);
        };

        info!(package = pkg, source = %src.display(), "Copying from local source into vendor");
        let dest = self.destination.join(pkg);
        fs::create_dir_all(&dest).map_err(|e| PkgError::copy_failed(pkg, e))?;
        copy_dir(&src, &dest).map_err(|e| PkgError::copy_failed(pkg, e))?;
        Ok(true)
    }
}

/// Pins versions as the walk discovers packages.
///
/// - `pinned`: root to the record it was pinned with; never changes once set.
/// - `candidates`: root to the latest version some scanned package asked for.
/// - `scanned`: roots whose declared requirements have been read.
/// - `reported`: conflict messages already emitted.
pub struct VersionReconciler<'a> {
    destination: PathBuf,
    root_package: String,
    manifest: &'a Manifest,
    vcs: &'a dyn Vcs,
    pinned: HashMap<String, Dependency>,
    candidates: HashMap<String, Dependency>,
    scanned: HashSet<String>,
    reported: HashSet<String>,
    conflicts: Vec<String>,
}

impl<'a> VersionReconciler<'a> {
    pub fn new(
        destination: &Path,
        root_package: &str,
        manifest: &'a Manifest,
        vcs: &'a dyn Vcs,
    ) -> Self {
        Self {
            destination: destination.to_path_buf(),
            root_package: root_package.to_string(),
            manifest,
            vcs,
            pinned: HashMap::new(),
            candidates: HashMap::new(),
            scanned: HashSet::new(),
            reported: HashSet::new(),
            conflicts: Vec::new(),
        }
    }

    /// The record `root` was pinned with, if any.
    #[must_use]
    pub fn pinned(&self, root: &str) -> Option<&Dependency> {
        self.pinned.get(root)
    }

    /// Conflict messages in the order they were reported.
    #[must_use]
    pub fn conflicts(&self) -> &[String] {
        &self.conflicts
    }

    #[must_use]
    pub fn into_pinned(self) -> HashMap<String, Dependency> {
        self.pinned
    }

    /// Record what the package at `root` asks for.
    fn scan(&mut self, root: &str) -> Result<(), PkgError> {
        let Some(declared) = read_declared(&self.destination.join(root))? else {
            return Ok(());
        };
        for dep in declared {
            if dep.reference.is_empty() {
                continue;
            }
            self.candidates.insert(dep.name.clone(), dep);
        }
        Ok(())
    }

    fn check_conflict(&mut self, root: &str) {
        let (Some(pinned), Some(candidate)) = (self.pinned.get(root), self.candidates.get(root))
        else {
            return;
        };
        // Must differ from both the resolved revision and the requested reference
        if candidate.reference.is_empty()
            || candidate.reference == pinned.pin
            || candidate.reference == pinned.reference
        {
            return;
        }

        let msg = format!(
            "Conflict: {root} version is {}, but also asked for {}",
            pinned.pin, candidate.reference
        );
        if self.reported.insert(msg.clone()) {
            warn!("{msg}");
            self.conflicts.push(msg);
        }
    }
}

impl VersionHandler for VersionReconciler<'_> {
    fn set_version(&mut self, pkg: &str) -> Result<(), PkgError> {
        let root = root_of(pkg);
        if is_skipped(&self.root_package, self.manifest, &root, pkg) {
            return Ok(());
        }

        let mut result = Ok(());
        if self.scanned.insert(root.clone()) {
            if let Err(e) = self.scan(&root) {
                error!(package = %root, error = %e, "Unable to read declared requirements");
                result = Err(e);
            }
        }

        if self.pinned.contains_key(&root) {
            debug!(package = pkg, "Version already pinned");
            self.check_conflict(&root);
            return result;
        }

        let Some(mut dep) = self.candidates.get(&root).cloned() else {
            debug!(package = pkg, "No version requested");
            return result;
        };

        info!(package = %root, reference = %dep.reference, "Setting version");
        match self.vcs.set_version(&dep, &self.destination) {
            Ok(rev) => dep.pin = rev,
            Err(e) => {
                error!(package = %root, reference = %dep.reference, error = %e, "Failed to set version");
                result = Err(PkgError::set_version_failed(&root, &dep.reference, e));
            }
        }
        self.pinned.insert(root, dep);
        result
    }
}
