//! High-level operations behind `install`, `checkout`, `update` and `list`.

use super::aggregate::dependencies_from_packages;
use super::dependency::Dependency;
use super::dispatch::concurrent_update;
use super::error::PkgError;
use super::handlers::{MissingPackageResolver, VersionReconciler};
use super::lockfile::{LockedDependency, Lockfile};
use super::manifest::Manifest;
use super::vcs::{CommandVcs, GetOptions, UpdateOptions, Vcs};
use super::walker::{ImportWalker, ManifestWalker, MissingPackageHandler, VersionHandler};
use crate::paths::{self, VENDOR_DIR};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Installs and updates a project's dependencies into its vendor directory.
pub struct Installer {
    /// Project directory the walk starts from.
    pub base: PathBuf,
    /// Explicit vendor directory; `<base>/vendor` when unset.
    pub vendor: Option<PathBuf>,
    /// Tether home, holding the repository cache.
    pub home: PathBuf,
    pub use_cache: bool,
    pub use_local_source: bool,
    pub cache_local_source: bool,
    pub update_vendored: bool,
    pub force: bool,
    /// Import path of the project itself; the manifest's name when empty.
    pub root_package: String,
    pub source_roots: Vec<PathBuf>,
    vcs: Arc<dyn Vcs>,
}

impl Installer {
    /// Installer for the project at `base`, using the VCS binaries on `PATH`
    /// and the home/source roots from the environment.
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            vendor: None,
            home: paths::home_dir(),
            use_cache: false,
            use_local_source: false,
            cache_local_source: false,
            update_vendored: false,
            force: false,
            root_package: String::new(),
            source_roots: paths::source_roots(),
            vcs: Arc::new(CommandVcs::new()),
        }
    }

    #[must_use]
    pub fn with_vcs(mut self, vcs: Arc<dyn Vcs>) -> Self {
        self.vcs = vcs;
        self
    }

    /// The vendor directory dependencies are placed in.
    #[must_use]
    pub fn vendor_path(&self) -> PathBuf {
        self.vendor
            .clone()
            .unwrap_or_else(|| self.base.join(VENDOR_DIR))
    }

    fn get_options(&self) -> GetOptions {
        GetOptions {
            home: self.home.clone(),
            use_cache: self.use_cache,
            cache_local_source: self.cache_local_source,
            use_local_source: self.use_local_source,
            source_roots: self.source_roots.clone(),
        }
    }

    fn update_options(&self) -> UpdateOptions {
        UpdateOptions {
            update_vendored: self.update_vendored,
            force: self.force,
            get: self.get_options(),
        }
    }

    fn root_package<'m>(&'m self, manifest: &'m Manifest) -> &'m str {
        if self.root_package.is_empty() {
            &manifest.name
        } else {
            &self.root_package
        }
    }

    /// Install exactly what `lock` records.
    ///
    /// On return the manifest's imports and dev imports are the locked
    /// records, even when some updates failed.
    ///
    /// # Errors
    /// The combined dispatch failure, after both lists were attempted.
    pub fn install(&self, lock: &Lockfile, manifest: &mut Manifest) -> Result<(), PkgError> {
        manifest.imports = lock.imports.iter().map(LockedDependency::to_dependency).collect();
        manifest.dev_imports = lock
            .dev_imports
            .iter()
            .map(LockedDependency::to_dependency)
            .collect();
        manifest.dedupe();

        if manifest.imports.is_empty() && manifest.dev_imports.is_empty() {
            info!("No dependencies found. Nothing installed.");
            return Ok(());
        }

        let vendor = self.vendor_path();
        let opts = self.update_options();
        info!(vendor = %vendor.display(), "Downloading dependencies");
        let failures: Vec<PkgError> = [&manifest.imports, &manifest.dev_imports]
            .into_iter()
            .filter_map(|deps| concurrent_update(deps, &vendor, self.vcs.as_ref(), &opts).err())
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PkgError::multiple(failures))
        }
    }

    /// Bring every declared dependency up to its declared reference.
    ///
    /// # Errors
    /// The first list's dispatch failure; dev imports are not attempted then.
    pub fn checkout(&self, manifest: &Manifest, use_dev: bool) -> Result<(), PkgError> {
        let vendor = self.vendor_path();
        let opts = self.update_options();
        info!(vendor = %vendor.display(), "Downloading dependencies");

        concurrent_update(&manifest.imports, &vendor, self.vcs.as_ref(), &opts)?;
        if use_dev {
            concurrent_update(&manifest.dev_imports, &vendor, self.vcs.as_ref(), &opts)?;
        }
        Ok(())
    }

    /// Resolve the full transitive set, fetch what is missing, reconcile
    /// versions and update every vendored repository.
    ///
    /// On return `manifest.imports` holds the resolved set, even when some
    /// updates failed.
    ///
    /// # Errors
    /// `PKG_RESOLVER_INIT_FAILED` when the walk cannot start, the walk's
    /// own failure, or the combined dispatch failure.
    pub fn update(&self, manifest: &mut Manifest) -> Result<(), PkgError> {
        let walker = ManifestWalker::new(
            &self.base,
            &self.vendor_path(),
            manifest,
            self.source_roots.clone(),
        )?;
        self.update_with(manifest, walker)
    }

    /// [`Installer::update`] with an explicit walker.
    pub fn update_with<W: ImportWalker>(
        &self,
        manifest: &mut Manifest,
        mut walker: W,
    ) -> Result<(), PkgError> {
        let vendor = self.vendor_path();
        let (packages, pinned) = {
            let conf: &Manifest = manifest;
            let root_package = self.root_package(conf);
            let mut missing = MissingPackageResolver::new(
                &vendor,
                root_package,
                conf,
                self.vcs.as_ref(),
                self.get_options(),
            );
            let mut versions = VersionReconciler::new(&vendor, root_package, conf, self.vcs.as_ref());

            info!("Resolving imports");
            let packages = all_packages(
                &conf.imports,
                &vendor,
                &mut walker,
                Some(&mut missing),
                &mut versions,
            )?;
            (packages, versions.into_pinned())
        };
        warn!("Dev imports are not resolved by update");

        let deps = merge_resolved(dependencies_from_packages(&packages), &manifest.imports, &pinned);

        info!(vendor = %vendor.display(), "Downloading dependencies");
        let result = concurrent_update(&deps, &vendor, self.vcs.as_ref(), &self.update_options());
        manifest.imports = deps;
        result
    }

    /// Resolve the full transitive set without fetching or updating anything.
    ///
    /// # Errors
    /// `PKG_RESOLVER_INIT_FAILED` when the walk cannot start, or the walk's
    /// own failure.
    pub fn list(&self, manifest: &mut Manifest) -> Result<Vec<Dependency>, PkgError> {
        let walker = ManifestWalker::new(
            &self.base,
            &self.vendor_path(),
            manifest,
            self.source_roots.clone(),
        )?;
        self.list_with(manifest, walker)
    }

    /// [`Installer::list`] with an explicit walker.
    pub fn list_with<W: ImportWalker>(
        &self,
        manifest: &mut Manifest,
        mut walker: W,
    ) -> Result<Vec<Dependency>, PkgError> {
        let vendor = self.vendor_path();
        let (packages, pinned) = {
            let conf: &Manifest = manifest;
            let mut versions =
                VersionReconciler::new(&vendor, self.root_package(conf), conf, self.vcs.as_ref());

            info!("Resolving imports");
            let packages = all_packages(&conf.imports, &vendor, &mut walker, None, &mut versions)?;
            (packages, versions.into_pinned())
        };

        let deps = merge_resolved(dependencies_from_packages(&packages), &manifest.imports, &pinned);
        manifest.imports.clone_from(&deps);
        Ok(deps)
    }

    /// Build a lockfile from resolved records.
    ///
    /// Records without a pin take the revision of their vendored checkout;
    /// when that cannot be read the reference is locked instead.
    #[must_use]
    pub fn lock_from(
        &self,
        hash: impl Into<String>,
        imports: &[Dependency],
        dev_imports: &[Dependency],
    ) -> Lockfile {
        let vendor = self.vendor_path();
        let pin = |deps: &[Dependency]| -> Vec<Dependency> {
            deps.iter()
                .map(|dep| {
                    let mut dep = dep.clone();
                    let dir = vendor.join(&dep.name);
                    if dep.pin.is_empty() && dir.is_dir() {
                        match self.vcs.revision(&dir) {
                            Ok(rev) => dep.pin = rev,
                            Err(e) => debug!(package = %dep.name, error = %e, "No revision to lock"),
                        }
                    }
                    dep
                })
                .collect()
        };
        Lockfile::from_dependencies(hash, &pin(imports), &pin(dev_imports))
    }
}

/// Run the walk and strip any vendor-directory prefix from its output.
fn all_packages(
    deps: &[Dependency],
    vendor: &Path,
    walker: &mut dyn ImportWalker,
    missing: Option<&mut dyn MissingPackageHandler>,
    versions: &mut dyn VersionHandler,
) -> Result<Vec<String>, PkgError> {
    if deps.is_empty() {
        return Ok(Vec::new());
    }

    let packages = walker.resolve_all(deps, missing, versions)?;
    Ok(packages
        .into_iter()
        .map(|pkg| match Path::new(&pkg).strip_prefix(vendor) {
            Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
            Err(_) => pkg,
        })
        .collect())
}

/// Fold declared and reconciled data into the records found by the walk.
///
/// A declared record replaces the discovered one (keeping the discovered
/// subpackages). The reconciler's pin always wins; its repository, VCS and
/// reference only fill empty fields.
fn merge_resolved(
    discovered: Vec<Dependency>,
    declared: &[Dependency],
    pinned: &HashMap<String, Dependency>,
) -> Vec<Dependency> {
    discovered
        .into_iter()
        .map(|found| {
            let mut dep = match declared.iter().find(|d| d.name == found.name) {
                Some(d) => {
                    let mut d = d.clone();
                    for sp in &found.subpackages {
                        d.add_subpackage(sp);
                    }
                    d
                }
                None => found,
            };

            if let Some(p) = pinned.get(&dep.name) {
                dep.pin.clone_from(&p.pin);
                if dep.repository.is_empty() {
                    dep.repository.clone_from(&p.repository);
                }
                if dep.vcs.is_none() {
                    dep.vcs = p.vcs;
                }
                if dep.reference.is_empty() {
                    dep.reference.clone_from(&p.reference);
                }
            }
            dep
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkg::manifest::MANIFEST_NAME;
    use crate::pkg::testing::{commit, git, git_available, RecordingVcs};
    use std::fs;
    use tempfile::tempdir;

    /// Returns a fixed package list, calling `set_version` on each.
    struct StaticWalker {
        packages: Vec<String>,
        /// Prepended to every returned path, as a walker reporting directories would.
        prefix: Option<PathBuf>,
        saw_missing_handler: Option<bool>,
    }

    impl StaticWalker {
        fn new(packages: &[&str]) -> Self {
            Self {
                packages: packages.iter().map(ToString::to_string).collect(),
                prefix: None,
                saw_missing_handler: None,
            }
        }
    }

    impl ImportWalker for StaticWalker {
        fn resolve_all(
            &mut self,
            _deps: &[Dependency],
            missing: Option<&mut dyn MissingPackageHandler>,
            versions: &mut dyn VersionHandler,
        ) -> Result<Vec<String>, PkgError> {
            self.saw_missing_handler = Some(missing.is_some());
            for pkg in &self.packages {
                let _ = versions.set_version(pkg);
            }
            Ok(self
                .packages
                .iter()
                .map(|pkg| match &self.prefix {
                    Some(prefix) => prefix.join(pkg).to_string_lossy().into_owned(),
                    None => pkg.clone(),
                })
                .collect())
        }
    }

    fn installer(base: &Path, vcs: &Arc<RecordingVcs>) -> Installer {
        let shared: Arc<dyn Vcs> = vcs.clone();
        Installer::new(base).with_vcs(shared)
    }

    fn declare(vendor: &Path, root: &str, imports: &str) {
        let dir = vendor.join(root);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(MANIFEST_NAME),
            format!(r#"{{"package": "{root}", "imports": [{imports}]}}"#),
        )
        .unwrap();
    }

    #[test]
    fn test_vendor_path_default_and_override() {
        let mut inst = Installer::new("/work/project");
        assert_eq!(inst.vendor_path(), PathBuf::from("/work/project/vendor"));
        inst.vendor = Some(PathBuf::from("/elsewhere"));
        assert_eq!(inst.vendor_path(), PathBuf::from("/elsewhere"));
    }

    #[test]
    fn test_install_empty_lock() {
        let project = tempdir().unwrap();
        let vcs = Arc::new(RecordingVcs::default());
        let inst = installer(project.path(), &vcs);

        let mut manifest = Manifest {
            imports: vec![Dependency::new("github.com/stale/repo")],
            ..Default::default()
        };
        inst.install(&Lockfile::default(), &mut manifest).unwrap();
        assert!(manifest.imports.is_empty());
        assert!(vcs.updated.lock().is_empty());
    }

    #[test]
    fn test_install_dispatches_locked() {
        let project = tempdir().unwrap();
        let vcs = Arc::new(RecordingVcs::default());
        let inst = installer(project.path(), &vcs);
        let lock = Lockfile::from_dependencies(
            "h",
            &[Dependency::new("github.com/a/a").with_reference("v1")],
            &[Dependency::new("github.com/t/t")],
        );

        let mut manifest = Manifest::default();
        inst.install(&lock, &mut manifest).unwrap();

        assert_eq!(manifest.imports[0].reference, "v1");
        let mut updated = vcs.updated.lock().clone();
        updated.sort();
        assert_eq!(updated, vec!["github.com/a/a", "github.com/t/t"]);
    }

    #[test]
    fn test_install_failure_keeps_locked_records() {
        let project = tempdir().unwrap();
        let vcs = Arc::new(RecordingVcs::failing(&["github.com/a/a"]));
        let inst = installer(project.path(), &vcs);
        let lock = Lockfile::from_dependencies(
            "h",
            &[
                Dependency::new("github.com/a/a").with_reference("v1"),
                Dependency::new("github.com/b/b").with_reference("v2"),
            ],
            &[Dependency::new("github.com/t/t")],
        );
        let mut manifest = Manifest::default();

        let err = inst.install(&lock, &mut manifest).unwrap_err();

        assert!(err.message().contains("github.com/a/a"));
        let names: Vec<&str> = manifest.imports.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["github.com/a/a", "github.com/b/b"]);
        assert_eq!(manifest.dev_imports[0].name, "github.com/t/t");
        assert_eq!(vcs.updated.lock().len(), 3);
    }

    #[test]
    fn test_checkout_skips_dev_unless_asked() {
        let project = tempdir().unwrap();
        let vcs = Arc::new(RecordingVcs::default());
        let inst = installer(project.path(), &vcs);
        let manifest = Manifest {
            imports: vec![Dependency::new("github.com/a/a")],
            dev_imports: vec![Dependency::new("github.com/t/t")],
            ..Default::default()
        };

        inst.checkout(&manifest, false).unwrap();
        assert_eq!(*vcs.updated.lock(), vec!["github.com/a/a"]);

        inst.checkout(&manifest, true).unwrap();
        assert_eq!(vcs.updated.lock().len(), 3);
    }

    #[test]
    fn test_update_merges_and_dispatches() {
        let project = tempdir().unwrap();
        let vcs = Arc::new(RecordingVcs::default());
        let inst = installer(project.path(), &vcs);
        declare(
            &inst.vendor_path(),
            "github.com/a/a",
            r#"{"package": "github.com/b/b", "version": "v2"}"#,
        );
        let mut manifest = Manifest {
            imports: vec![Dependency::new("github.com/a/a")
                .with_reference("v1")
                .with_repository("https://mirror/a")],
            ..Default::default()
        };
        let mut walker = StaticWalker::new(&[
            "github.com/a/a",
            "github.com/a/a/x",
            "github.com/b/b",
        ]);

        inst.update_with(&mut manifest, &mut walker).unwrap();

        assert_eq!(walker.saw_missing_handler, Some(true));
        assert_eq!(manifest.imports.len(), 2);
        let a = &manifest.imports[0];
        assert_eq!(a.repository, "https://mirror/a");
        assert_eq!(a.reference, "v1");
        assert_eq!(a.subpackages, vec!["x"]);
        let b = &manifest.imports[1];
        assert_eq!(b.name, "github.com/b/b");
        assert_eq!(b.reference, "v2");
        assert_eq!(b.pin, "rev-v2");

        let mut updated = vcs.updated.lock().clone();
        updated.sort();
        assert_eq!(updated, vec!["github.com/a/a", "github.com/b/b"]);
    }

    #[test]
    fn test_update_locks_the_vendored_head() {
        if !git_available() {
            return;
        }
        let remotes = tempdir().unwrap();
        let x_remote = remotes.path().join("x");
        let v1 = commit(&x_remote, &[("x.go", "one")]);
        git(&x_remote, &["tag", "v1"]);
        commit(&x_remote, &[("x.go", "two")]);
        let a_remote = remotes.path().join("a");
        commit(
            &a_remote,
            &[(
                MANIFEST_NAME,
                r#"{"package": "github.com/org/a", "imports": [{"package": "github.com/org/x", "version": "v1"}]}"#,
            )],
        );

        let project = tempdir().unwrap();
        let mut inst = Installer::new(project.path());
        inst.home = project.path().join(".tether-home");
        inst.source_roots = Vec::new();
        let mut manifest = Manifest {
            imports: vec![
                Dependency::new("github.com/org/a").with_repository(a_remote.to_string_lossy()),
                Dependency::new("github.com/org/x")
                    .with_reference("master")
                    .with_repository(x_remote.to_string_lossy()),
            ],
            ..Default::default()
        };

        inst.update(&mut manifest).unwrap();
        let lock = inst.lock_from("hash", &manifest.imports, &[]);

        let x = lock
            .imports
            .iter()
            .find(|d| d.name == "github.com/org/x")
            .unwrap();
        let head = git(&inst.vendor_path().join("github.com/org/x"), &["rev-parse", "HEAD"]);
        assert_eq!(x.version, v1);
        assert_eq!(x.version, head);
    }

    #[test]
    fn test_update_failure_still_assigns_imports() {
        let project = tempdir().unwrap();
        let vcs = Arc::new(RecordingVcs::failing(&["github.com/b/b"]));
        let inst = installer(project.path(), &vcs);
        let mut manifest = Manifest {
            imports: vec![Dependency::new("github.com/a/a")],
            ..Default::default()
        };
        let mut walker = StaticWalker::new(&["github.com/a/a", "github.com/b/b"]);

        let err = inst.update_with(&mut manifest, &mut walker).unwrap_err();

        assert!(err.message().contains("github.com/b/b"));
        assert_eq!(manifest.imports.len(), 2);
    }

    #[test]
    fn test_update_requires_project_dir() {
        let vcs = Arc::new(RecordingVcs::default());
        let inst = installer(Path::new("/nonexistent/tether/project"), &vcs);
        let mut manifest = Manifest {
            imports: vec![Dependency::new("github.com/a/a")],
            ..Default::default()
        };

        let err = inst.update(&mut manifest).unwrap_err();
        assert_eq!(err.code(), "PKG_RESOLVER_INIT_FAILED");
        assert!(vcs.updated.lock().is_empty());
    }

    #[test]
    fn test_list_does_not_dispatch() {
        let project = tempdir().unwrap();
        let vcs = Arc::new(RecordingVcs::default());
        let inst = installer(project.path(), &vcs);
        let mut manifest = Manifest {
            imports: vec![Dependency::new("github.com/a/a")],
            ..Default::default()
        };
        let mut walker = StaticWalker::new(&["github.com/a/a", "github.com/c/c/sub"]);
        walker.prefix = Some(inst.vendor_path());

        let deps = inst.list_with(&mut manifest, &mut walker).unwrap();

        assert_eq!(walker.saw_missing_handler, Some(false));
        let names: Vec<&str> = deps.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["github.com/a/a", "github.com/c/c"]);
        assert_eq!(deps[1].subpackages, vec!["sub"]);
        assert!(vcs.updated.lock().is_empty());
        assert!(vcs.fetched.lock().is_empty());
    }

    #[test]
    fn test_list_walks_vendored_manifests() {
        let project = tempdir().unwrap();
        let vcs = Arc::new(RecordingVcs::default());
        let inst = installer(project.path(), &vcs);
        declare(
            &inst.vendor_path(),
            "github.com/a/a",
            r#"{"package": "github.com/b/b"}"#,
        );
        fs::create_dir_all(inst.vendor_path().join("github.com/b/b")).unwrap();
        let mut manifest = Manifest {
            imports: vec![Dependency::new("github.com/a/a")],
            ..Default::default()
        };

        let deps = inst.list(&mut manifest).unwrap();

        let names: Vec<&str> = deps.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["github.com/a/a", "github.com/b/b"]);
        assert_eq!(manifest.imports, deps);
    }

    #[test]
    fn test_lock_from_pins_vendored() {
        let project = tempdir().unwrap();
        let vcs = Arc::new(RecordingVcs::default());
        let inst = installer(project.path(), &vcs);
        fs::create_dir_all(inst.vendor_path().join("github.com/b/b")).unwrap();

        let mut pinned = Dependency::new("github.com/a/a").with_reference("v1");
        pinned.pin = "abc123".to_string();
        let lock = inst.lock_from(
            "hash",
            &[
                pinned,
                Dependency::new("github.com/b/b").with_reference("master"),
                Dependency::new("github.com/c/c").with_reference("v3"),
            ],
            &[],
        );

        let versions: Vec<&str> = lock.imports.iter().map(|d| d.version.as_str()).collect();
        assert_eq!(versions, vec!["abc123", "head-b", "v3"]);
        assert_eq!(lock.hash, "hash");
    }
}
