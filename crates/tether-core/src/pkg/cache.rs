//! Repository cache management.
//!
//! Remote repositories fetched with caching enabled are cloned once into
//! the cache and copied into each project's vendor directory from there.

use crate::paths::cache_dir;
use std::path::{Path, PathBuf};
use tether_util::hash::short_digest;

/// Length of the hex key naming each cached repository.
const KEY_LEN: usize = 24;

/// Repository cache manager.
#[derive(Debug, Clone)]
pub struct RepoCache {
    /// Root directory holding one checkout per remote.
    root: PathBuf,
}

impl RepoCache {
    /// Create a repository cache under the given tether home.
    #[must_use]
    pub fn new(home: &Path) -> Self {
        Self {
            root: cache_dir(home).join("repos"),
        }
    }

    /// Get the cache root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the cached checkout of `remote`.
    ///
    /// Keyed by a digest of the URL so forks and mirrors of the same
    /// import path never share a checkout.
    #[must_use]
    pub fn repo_dir(&self, remote: &str) -> PathBuf {
        self.root.join(short_digest(remote.as_bytes(), KEY_LEN))
    }

    /// Check if `remote` already has a cached checkout.
    #[must_use]
    pub fn is_cached(&self, remote: &str) -> bool {
        self.repo_dir(remote).is_dir()
    }
}
