//! Package manager error types.

use std::fmt;
use std::io;

/// Package manager error codes.
pub mod codes {
    pub const PKG_VCS_FAILED: &str = "PKG_VCS_FAILED";
    pub const PKG_FETCH_FAILED: &str = "PKG_FETCH_FAILED";
    pub const PKG_COPY_FAILED: &str = "PKG_COPY_FAILED";
    pub const PKG_SET_VERSION_FAILED: &str = "PKG_SET_VERSION_FAILED";
    pub const PKG_UPDATE_FAILED: &str = "PKG_UPDATE_FAILED";
    pub const PKG_VENDORED_COPY: &str = "PKG_VENDORED_COPY";
    pub const PKG_RESOLVER_INIT_FAILED: &str = "PKG_RESOLVER_INIT_FAILED";
    pub const PKG_WALK_FAILED: &str = "PKG_WALK_FAILED";
    pub const PKG_CACHE_ERROR: &str = "PKG_CACHE_ERROR";
    pub const PKG_IO_ERROR: &str = "PKG_IO_ERROR";
    pub const PKG_NAME_INVALID: &str = "PKG_NAME_INVALID";

    pub const PKG_MANIFEST_NOT_FOUND: &str = "PKG_MANIFEST_NOT_FOUND";
    pub const PKG_MANIFEST_INVALID: &str = "PKG_MANIFEST_INVALID";
    pub const PKG_LOCK_INVALID: &str = "PKG_LOCK_INVALID";
    pub const PKG_LOCK_WRITE_FAILED: &str = "PKG_LOCK_WRITE_FAILED";
}

/// Package manager error.
///
/// Carries a stable code and a human-readable message. Errors produced by
/// aggregating several failures keep every individual failure in
/// [`PkgError::related`].
#[derive(Debug, Clone)]
pub struct PkgError {
    code: &'static str,
    message: String,
    related: Vec<PkgError>,
}

impl PkgError {
    /// Create a new error with the given code and message.
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            related: Vec::new(),
        }
    }

    /// Get the error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// Get the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Individual failures folded into this error, if it is an aggregate.
    #[must_use]
    pub fn related(&self) -> &[PkgError] {
        &self.related
    }

    /// Combine several failures into one `PKG_UPDATE_FAILED` error.
    ///
    /// A single failure is returned unchanged.
    #[must_use]
    pub fn multiple(mut errors: Vec<PkgError>) -> Self {
        if errors.len() == 1 {
            return errors.remove(0);
        }
        let message = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            code: codes::PKG_UPDATE_FAILED,
            message: format!("{} dependencies failed to update:\n{message}", errors.len()),
            related: errors,
        }
    }

    /// Attach the individual failures this error summarizes.
    #[must_use]
    pub fn with_related(mut self, related: Vec<PkgError>) -> Self {
        self.related = related;
        self
    }

    /// A VCS command failed.
    pub fn vcs(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_VCS_FAILED, msg)
    }

    /// Fetching a missing package failed.
    #[must_use]
    pub fn fetch_failed(name: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            codes::PKG_FETCH_FAILED,
            format!("Failed to fetch {name}: {reason}"),
        )
    }

    /// Copying a package from a local source root failed.
    #[must_use]
    pub fn copy_failed(name: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            codes::PKG_COPY_FAILED,
            format!("Failed to copy {name}: {reason}"),
        )
    }

    /// Moving a checkout to a reference failed.
    #[must_use]
    pub fn set_version_failed(name: &str, reference: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            codes::PKG_SET_VERSION_FAILED,
            format!("Unable to set version on {name} to {reference}: {reason}"),
        )
    }

    /// Updating a single dependency failed.
    #[must_use]
    pub fn update_failed(name: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            codes::PKG_UPDATE_FAILED,
            format!("Update failed for {name}: {reason}"),
        )
    }

    /// A vendored copy (no VCS metadata) is in the way of an update.
    #[must_use]
    pub fn vendored_copy(name: &str) -> Self {
        Self::new(
            codes::PKG_VENDORED_COPY,
            format!("{name} is a vendored copy without VCS metadata; use --update-vendored or --force to replace it"),
        )
    }

    /// The import graph walker could not be constructed.
    pub fn resolver_init(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_RESOLVER_INIT_FAILED, msg)
    }

    /// The import graph walk failed.
    pub fn walk_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_WALK_FAILED, msg)
    }

    /// The shared repository cache could not be prepared.
    pub fn cache_error(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_CACHE_ERROR, msg)
    }

    /// A package name does not resolve to a repository root.
    #[must_use]
    pub fn name_invalid(name: &str) -> Self {
        Self::new(
            codes::PKG_NAME_INVALID,
            format!("Package name is required for {name:?}"),
        )
    }

    /// Manifest not found at the given path.
    #[must_use]
    pub fn manifest_not_found(path: &std::path::Path) -> Self {
        Self::new(
            codes::PKG_MANIFEST_NOT_FOUND,
            format!("manifest not found: {}", path.display()),
        )
    }

    /// Manifest could not be read or parsed.
    pub fn manifest_invalid(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_MANIFEST_INVALID, msg)
    }

    /// Lockfile could not be read or parsed.
    pub fn lock_invalid(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_LOCK_INVALID, msg)
    }

    /// Lockfile could not be written.
    pub fn lock_write_failed(msg: impl Into<String>) -> Self {
        Self::new(codes::PKG_LOCK_WRITE_FAILED, msg)
    }
}

impl fmt::Display for PkgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PkgError {}

impl From<io::Error> for PkgError {
    fn from(e: io::Error) -> Self {
        Self::new(codes::PKG_IO_ERROR, e.to_string())
    }
}

impl From<serde_json::Error> for PkgError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(codes::PKG_MANIFEST_INVALID, format!("Invalid JSON: {e}"))
    }
}
