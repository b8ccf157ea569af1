//! Version control operations on vendored repositories.
//!
//! [`Vcs`] is the contract the installer and the walker callbacks rely on.
//! [`CommandVcs`] implements it by running the `git`, `hg`, `svn` and `bzr`
//! binaries found on `PATH`.

use super::cache::RepoCache;
use super::dependency::{Dependency, VcsKind};
use super::error::PkgError;
use crate::paths::find_local_source;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tether_util::fs::copy_dir;
use tracing::{debug, info};

/// Options for a first-time fetch.
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    /// Tether home; the repository cache lives under it.
    pub home: PathBuf,
    /// Clone into the shared cache and copy into the destination.
    pub use_cache: bool,
    /// After fetching, also copy the checkout into the first local source root.
    pub cache_local_source: bool,
    /// Copy from a local source root instead of fetching when one has it.
    pub use_local_source: bool,
    /// Local source roots, searched in order.
    pub source_roots: Vec<PathBuf>,
}

/// Options for updating a vendored repository.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Replace vendored copies (no VCS metadata) with fresh checkouts.
    pub update_vendored: bool,
    /// Same as `update_vendored`, for any condition that would stop an update.
    pub force: bool,
    pub get: GetOptions,
}

/// Operations on one dependency's local checkout.
pub trait Vcs: Send + Sync {
    /// Make `<vendor>/<dep.name>` a checkout at [`Dependency::target_revision`]:
    /// fetch it if absent, otherwise pull and move it there. A pinned record
    /// stays at its pin; it is never fast-forwarded past it.
    fn update(&self, dep: &Dependency, vendor: &Path, opts: &UpdateOptions)
        -> Result<(), PkgError>;

    /// First-time fetch of `dep` into `dest`.
    fn get(&self, dep: &Dependency, dest: &Path, opts: &GetOptions) -> Result<(), PkgError>;

    /// Move the existing checkout at `<vendor>/<dep.name>` to `dep.reference`
    /// and return the concrete revision it now sits at.
    fn set_version(&self, dep: &Dependency, vendor: &Path) -> Result<String, PkgError>;

    /// Concrete revision of the checkout at `dir`.
    fn revision(&self, dir: &Path) -> Result<String, PkgError>;
}

/// Detect the VCS of an existing checkout from its metadata directory.
#[must_use]
pub fn detect_kind(dir: &Path) -> Option<VcsKind> {
    VcsKind::ALL
        .into_iter()
        .find(|kind| dir.join(kind.metadata_dir()).exists())
}

/// One VCS program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcsCommand {
    pub program: &'static str,
    pub args: Vec<String>,
}

impl VcsCommand {
    fn new(kind: VcsKind, args: &[&str]) -> Self {
        Self {
            program: kind.as_str(),
            args: args.iter().map(ToString::to_string).collect(),
        }
    }

    /// Initial clone of `remote` into `dest`.
    #[must_use]
    pub fn clone_into(kind: VcsKind, remote: &str, dest: &Path) -> Self {
        let dest = dest.to_string_lossy();
        let dest: &str = &dest;
        match kind {
            VcsKind::Git | VcsKind::Hg => Self::new(kind, &["clone", "--quiet", remote, dest]),
            VcsKind::Svn => Self::new(kind, &["checkout", "--quiet", remote, dest]),
            VcsKind::Bzr => Self::new(kind, &["branch", "--quiet", remote, dest]),
        }
    }

    /// Bring remote history into an existing checkout.
    #[must_use]
    pub fn fetch(kind: VcsKind) -> Self {
        match kind {
            VcsKind::Git => Self::new(kind, &["fetch", "--quiet", "--tags", "origin"]),
            VcsKind::Hg => Self::new(kind, &["pull", "--quiet"]),
            VcsKind::Svn => Self::new(kind, &["update", "--quiet"]),
            VcsKind::Bzr => Self::new(kind, &["pull", "--quiet"]),
        }
    }

    /// Move the working copy to `reference`; `None` when there is nothing to run.
    ///
    /// An empty reference means "latest": git fast-forwards separately,
    /// svn's fetch already updated the working copy.
    #[must_use]
    pub fn checkout(kind: VcsKind, reference: &str) -> Option<Self> {
        match (kind, reference.is_empty()) {
            (VcsKind::Git | VcsKind::Svn, true) => None,
            (VcsKind::Git, false) => Some(Self::new(kind, &["checkout", "--quiet", reference])),
            (VcsKind::Hg | VcsKind::Bzr, true) => Some(Self::new(kind, &["update", "--quiet"])),
            (_, false) => Some(Self::new(kind, &["update", "--quiet", "-r", reference])),
        }
    }

    /// Print the working copy's concrete revision.
    #[must_use]
    pub fn revision(kind: VcsKind) -> Self {
        match kind {
            VcsKind::Git => Self::new(kind, &["rev-parse", "HEAD"]),
            VcsKind::Hg => Self::new(kind, &["log", "-r", ".", "--template", "{node}"]),
            VcsKind::Svn => Self::new(kind, &["info", "--show-item", "revision"]),
            VcsKind::Bzr => Self::new(kind, &["revno"]),
        }
    }

    /// Run the command, returning trimmed stdout.
    ///
    /// # Errors
    /// `PKG_VCS_FAILED` if the program cannot be started or exits non-zero.
    pub fn run(&self, cwd: Option<&Path>) -> Result<String, PkgError> {
        let mut cmd = Command::new(self.program);
        cmd.args(&self.args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        if self.program == "git" {
            // Never block on a credential prompt inside a worker
            cmd.env("GIT_TERMINAL_PROMPT", "0");
        }

        debug!(command = %self, "running vcs command");
        let out = cmd
            .output()
            .map_err(|e| PkgError::vcs(format!("failed to execute {}: {e}", self.program)))?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(PkgError::vcs(format!("`{self}` failed: {}", stderr.trim())));
        }
        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }
}

impl fmt::Display for VcsCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.program, self.args.join(" "))
    }
}

/// [`Vcs`] backed by the VCS command-line tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandVcs;

impl CommandVcs {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Pull into an existing checkout and move it to `reference`.
    fn sync(kind: VcsKind, dir: &Path, reference: &str) -> Result<(), PkgError> {
        VcsCommand::fetch(kind).run(Some(dir))?;
        if let Some(cmd) = VcsCommand::checkout(kind, reference) {
            cmd.run(Some(dir))?;
        }
        if kind == VcsKind::Git && Self::git_tracks_upstream(dir) {
            VcsCommand::new(kind, &["merge", "--quiet", "--ff-only", "@{u}"]).run(Some(dir))?;
        }
        Ok(())
    }

    /// True when HEAD is a branch with an upstream (tags and detached revisions are not).
    fn git_tracks_upstream(dir: &Path) -> bool {
        VcsCommand::new(
            VcsKind::Git,
            &["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{u}"],
        )
        .run(Some(dir))
        .is_ok()
    }
}

impl Vcs for CommandVcs {
    fn update(
        &self,
        dep: &Dependency,
        vendor: &Path,
        opts: &UpdateOptions,
    ) -> Result<(), PkgError> {
        if !dep.matches_platform() {
            info!(package = %dep.name, "Skipping due to OS/architecture constraints");
            return Ok(());
        }

        let dest = vendor.join(&dep.name);
        if dest.exists() {
            match detect_kind(&dest) {
                Some(kind) => {
                    info!(package = %dep.name, revision = dep.target_revision(), "Updating");
                    return Self::sync(kind, &dest, dep.target_revision());
                }
                None if opts.update_vendored || opts.force => {
                    info!(package = %dep.name, "Replacing vendored copy with a checkout");
                    fs::remove_dir_all(&dest)?;
                }
                None => return Err(PkgError::vendored_copy(&dep.name)),
            }
        }

        info!(package = %dep.name, "Fetching");
        self.get(dep, &dest, &opts.get)?;

        // A copy from a local source root has no metadata to move
        if let Some(kind) = detect_kind(&dest) {
            if let Some(cmd) = VcsCommand::checkout(kind, dep.target_revision()) {
                cmd.run(Some(&dest))?;
            }
        }
        Ok(())
    }

    fn get(&self, dep: &Dependency, dest: &Path, opts: &GetOptions) -> Result<(), PkgError> {
        if opts.use_local_source {
            if let Some(src) = find_local_source(&opts.source_roots, &dep.name) {
                info!(package = %dep.name, source = %src.display(), "Copying from local source");
                return copy_dir(&src, dest).map_err(|e| PkgError::copy_failed(&dep.name, e));
            }
        }

        let remote = dep.remote();
        let kind = dep.vcs.unwrap_or(VcsKind::Git);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        if opts.use_cache {
            let cache = RepoCache::new(&opts.home);
            let mirror = cache.repo_dir(&remote);
            if cache.is_cached(&remote) {
                debug!(package = %dep.name, cache = %mirror.display(), "Refreshing cached repository");
                Self::sync(detect_kind(&mirror).unwrap_or(kind), &mirror, "")?;
            } else {
                fs::create_dir_all(cache.root()).map_err(|e| {
                    PkgError::cache_error(format!(
                        "Failed to create {}: {e}",
                        cache.root().display()
                    ))
                })?;
                VcsCommand::clone_into(kind, &remote, &mirror).run(None)?;
            }
            copy_dir(&mirror, dest).map_err(|e| PkgError::copy_failed(&dep.name, e))?;
        } else {
            VcsCommand::clone_into(kind, &remote, dest).run(None)?;
        }

        if opts.cache_local_source {
            if let Some(root) = opts.source_roots.first() {
                let target = root.join(&dep.name);
                if !target.exists() {
                    debug!(package = %dep.name, target = %target.display(), "Saving to local source");
                    copy_dir(dest, &target).map_err(|e| PkgError::copy_failed(&dep.name, e))?;
                }
            }
        }
        Ok(())
    }

    fn set_version(&self, dep: &Dependency, vendor: &Path) -> Result<String, PkgError> {
        let dir = vendor.join(&dep.name);
        let kind = detect_kind(&dir).or(dep.vcs).ok_or_else(|| {
            PkgError::vcs(format!("{} is not a VCS checkout", dir.display()))
        })?;

        if let Some(cmd) = VcsCommand::checkout(kind, &dep.reference) {
            cmd.run(Some(&dir))?;
        }
        VcsCommand::revision(kind).run(Some(&dir))
    }

    fn revision(&self, dir: &Path) -> Result<String, PkgError> {
        let kind = detect_kind(dir).ok_or_else(|| {
            PkgError::vcs(format!("{} is not a VCS checkout", dir.display()))
        })?;
        VcsCommand::revision(kind).run(Some(dir))
    }
}
