//! Test doubles and fixtures shared by unit tests.
//!
//! [`RecordingVcs`] stands in for the VCS binaries. The `git` helpers build
//! real throwaway repositories for the few tests that need them; those tests
//! return early when no `git` binary is installed.

use super::dependency::Dependency;
use super::error::PkgError;
use super::vcs::{GetOptions, UpdateOptions, Vcs};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::process::Command;

/// Records every call and materializes checkouts as plain directories.
#[derive(Default)]
pub(crate) struct RecordingVcs {
    /// Package names whose operations fail.
    pub fail: HashSet<String>,
    pub updated: Mutex<Vec<String>>,
    pub fetched: Mutex<Vec<String>>,
    pub versioned: Mutex<Vec<(String, String)>>,
}

impl RecordingVcs {
    pub fn failing(names: &[&str]) -> Self {
        Self {
            fail: names.iter().map(ToString::to_string).collect(),
            ..Default::default()
        }
    }

    fn check(&self, name: &str) -> Result<(), PkgError> {
        if self.fail.contains(name) {
            Err(PkgError::vcs(format!("simulated failure for {name}")))
        } else {
            Ok(())
        }
    }
}

impl Vcs for RecordingVcs {
    fn update(
        &self,
        dep: &Dependency,
        vendor: &Path,
        _opts: &UpdateOptions,
    ) -> Result<(), PkgError> {
        self.updated.lock().push(dep.name.clone());
        self.check(&dep.name)?;
        fs::create_dir_all(vendor.join(&dep.name))?;
        Ok(())
    }

    fn get(&self, dep: &Dependency, dest: &Path, _opts: &GetOptions) -> Result<(), PkgError> {
        self.fetched.lock().push(dep.name.clone());
        self.check(&dep.name)?;
        fs::create_dir_all(dest)?;
        Ok(())
    }

    fn set_version(&self, dep: &Dependency, _vendor: &Path) -> Result<String, PkgError> {
        self.versioned
            .lock()
            .push((dep.name.clone(), dep.reference.clone()));
        self.check(&dep.name)?;
        Ok(format!("rev-{}", dep.reference))
    }

    fn revision(&self, dir: &Path) -> Result<String, PkgError> {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(format!("head-{name}"))
    }
}

/// Whether a `git` binary can be run.
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|out| out.status.success())
}

/// Run git in `dir` with a throwaway identity, returning trimmed stdout.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args([
            "-c",
            "user.name=tether",
            "-c",
            "user.email=tether@example.com",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .unwrap();
    assert!(
        out.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

/// Commit `files` to the repository at `dir` on `master`, creating the
/// repository first. Returns the new HEAD.
pub fn commit(dir: &Path, files: &[(&str, &str)]) -> String {
    if !dir.join(".git").exists() {
        fs::create_dir_all(dir).unwrap();
        git(dir, &["init", "--quiet"]);
        git(dir, &["symbolic-ref", "HEAD", "refs/heads/master"]);
    }
    for (name, content) in files {
        fs::write(dir.join(name), content).unwrap();
    }
    git(dir, &["add", "--all"]);
    git(dir, &["commit", "--quiet", "-m", "change"]);
    git(dir, &["rev-parse", "HEAD"])
}
