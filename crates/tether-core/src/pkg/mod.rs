//! Dependency management.
//!
//! Provides utilities for:
//! - Normalizing import paths to repository roots
//! - Folding discovered import paths into dependency records
//! - Reading manifests (`tether.json`) and lockfiles (`tether.lock`)
//! - Driving git/hg/svn/bzr checkouts, with a shared repository cache
//! - Fetching missing packages and pinning versions during the import walk
//! - Updating a dependency set in parallel
//! - The `install`, `checkout`, `update` and `list` operations

pub mod aggregate;
pub mod cache;
pub mod dependency;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod installer;
pub mod lockfile;
pub mod manifest;
pub mod name;
pub mod vcs;
pub mod walker;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregate::dependencies_from_packages;
pub use cache::RepoCache;
pub use dependency::{Dependency, VcsKind};
pub use dispatch::{concurrent_update, CONCURRENT_WORKERS};
pub use error::{codes as pkg_codes, PkgError};
pub use handlers::{MissingPackageResolver, VersionReconciler};
pub use installer::Installer;
pub use lockfile::{LockedDependency, Lockfile, LOCKFILE_NAME, PKG_LOCK_SCHEMA_VERSION};
pub use manifest::{read_declared, Manifest, MANIFEST_NAME};
pub use name::{normalize_name, root_of};
pub use vcs::{CommandVcs, GetOptions, UpdateOptions, Vcs};
pub use walker::{ImportWalker, ManifestWalker, MissingPackageHandler, VersionHandler};
