//! Import graph traversal.
//!
//! The walker discovers every package reachable from the direct dependency
//! set and calls back into two narrow handlers while doing so:
//!
//! - [`MissingPackageHandler`] when a package has no local copy yet,
//! - [`VersionHandler`] once per distinct package visited.
//!
//! [`ManifestWalker`] follows the requirements each vendored package
//! declares in its own manifest or lockfile; it never reads source files.

use super::dependency::Dependency;
use super::error::PkgError;
use super::manifest::{read_declared, Manifest};
use super::name::root_of;
use crate::paths::find_local_source;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Reacts to packages the walker cannot find locally.
pub trait MissingPackageHandler {
    /// `pkg` has no local copy. Returns whether it is now available.
    fn not_found(&mut self, pkg: &str) -> Result<bool, PkgError>;

    /// `pkg` has no vendored copy but a local source root holds it.
    fn on_local_source(&mut self, pkg: &str) -> Result<bool, PkgError>;
}

/// Decides the version of each package as it is discovered.
pub trait VersionHandler {
    /// Called at least once per distinct import path visited.
    fn set_version(&mut self, pkg: &str) -> Result<(), PkgError>;
}

/// Transitive import discovery.
pub trait ImportWalker {
    /// Every import path reachable from `deps`, the direct set included, in
    /// visit order.
    fn resolve_all(
        &mut self,
        deps: &[Dependency],
        missing: Option<&mut dyn MissingPackageHandler>,
        versions: &mut dyn VersionHandler,
    ) -> Result<Vec<String>, PkgError>;
}

impl<W: ImportWalker + ?Sized> ImportWalker for &mut W {
    fn resolve_all(
        &mut self,
        deps: &[Dependency],
        missing: Option<&mut dyn MissingPackageHandler>,
        versions: &mut dyn VersionHandler,
    ) -> Result<Vec<String>, PkgError> {
        (**self).resolve_all(deps, missing, versions)
    }
}

/// Import paths a dependency record stands for: the root and each subpackage.
#[must_use]
pub fn import_paths(dep: &Dependency) -> Vec<String> {
    std::iter::once(dep.name.clone())
        .chain(
            dep.subpackages
                .iter()
                .map(|sp| format!("{}/{}", dep.name, sp)),
        )
        .collect()
}

/// Walks declared requirements breadth-first through the vendor directory.
#[derive(Debug, Clone)]
pub struct ManifestWalker {
    vendor: PathBuf,
    /// Project name and ignore rules; imports are not consulted.
    rules: Manifest,
    source_roots: Vec<PathBuf>,
}

impl ManifestWalker {
    /// Create a walker rooted at the project directory `base`.
    ///
    /// # Errors
    /// `PKG_RESOLVER_INIT_FAILED` if `base` is not a directory.
    pub fn new(
        base: &Path,
        vendor: &Path,
        manifest: &Manifest,
        source_roots: Vec<PathBuf>,
    ) -> Result<Self, PkgError> {
        if !base.is_dir() {
            return Err(PkgError::resolver_init(format!(
                "Failed to create a resolver: {} is not a directory",
                base.display()
            )));
        }

        Ok(Self {
            vendor: vendor.to_path_buf(),
            rules: Manifest {
                name: manifest.name.clone(),
                ignore: manifest.ignore.clone(),
                ..Default::default()
            },
            source_roots,
        })
    }

    fn skips(&self, root: &str, pkg: &str) -> bool {
        (!self.rules.name.is_empty() && root == self.rules.name)
            || self.rules.has_ignore(root)
            || self.rules.has_ignore(pkg)
    }

    /// Make `pkg` available locally, returning whether it now is.
    fn ensure_local(
        &self,
        pkg: &str,
        missing: Option<&mut dyn MissingPackageHandler>,
    ) -> Result<bool, PkgError> {
        if self.vendor.join(pkg).exists() {
            return Ok(true);
        }
        let Some(handler) = missing else {
            // Listing only: a root fetched earlier still counts
            return Ok(self.vendor.join(root_of(pkg)).exists());
        };
        if find_local_source(&self.source_roots, pkg).is_some() {
            handler.on_local_source(pkg)
        } else {
            handler.not_found(pkg)
        }
    }
}

impl ImportWalker for ManifestWalker {
    fn resolve_all(
        &mut self,
        deps: &[Dependency],
        mut missing: Option<&mut dyn MissingPackageHandler>,
        versions: &mut dyn VersionHandler,
    ) -> Result<Vec<String>, PkgError> {
        let mut queue: VecDeque<String> = deps.iter().flat_map(import_paths).collect();
        let mut seen: HashSet<String> = HashSet::new();
        let mut scanned_roots: HashSet<String> = HashSet::new();
        let mut failures: Vec<PkgError> = Vec::new();
        let mut packages: Vec<String> = Vec::new();

        while let Some(pkg) = queue.pop_front() {
            if !seen.insert(pkg.clone()) {
                continue;
            }
            let root = root_of(&pkg);
            if root.is_empty() || self.skips(&root, &pkg) {
                continue;
            }

            let handler = match missing {
                Some(ref mut h) => Some(&mut **h as &mut dyn MissingPackageHandler),
                None => None,
            };
            match self.ensure_local(&pkg, handler) {
                Ok(true) => {}
                Ok(false) => {
                    debug!(package = %pkg, "Not available locally, skipping");
                    continue;
                }
                Err(e) => {
                    warn!(package = %pkg, error = %e, "Unable to fetch package");
                    failures.push(e);
                    continue;
                }
            }

            if let Err(e) = versions.set_version(&pkg) {
                warn!(package = %pkg, error = %e, "Version not set");
            }
            packages.push(pkg);

            if scanned_roots.insert(root.clone()) {
                match read_declared(&self.vendor.join(&root)) {
                    Ok(Some(declared)) => queue.extend(declared.iter().flat_map(import_paths)),
                    Ok(None) => {}
                    Err(e) => warn!(package = %root, error = %e, "Unable to read declared imports"),
                }
            }
        }

        if failures.is_empty() {
            Ok(packages)
        } else {
            Err(PkgError::walk_failed(format!(
                "Failed to retrieve {} packages: {}",
                failures.len(),
                failures
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ")
            ))
            .with_related(failures))
        }
    }
}
