use crate::pkg::PkgError;
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for tether operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Project root not found from {start} (no {marker} in any parent)")]
    ProjectNotFound {
        start: PathBuf,
        marker: &'static str,
    },

    #[error(transparent)]
    Pkg(#[from] PkgError),
}

impl Error {
    /// Stable error code for machine-readable output.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "IO_ERROR",
            Self::ProjectNotFound { .. } => "PROJECT_NOT_FOUND",
            Self::Pkg(e) => e.code(),
        }
    }
}
