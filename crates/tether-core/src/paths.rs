use crate::error::Error;
use crate::pkg::manifest::MANIFEST_NAME;
use crate::version::SCHEMA_VERSION;
use std::path::{Path, PathBuf};

/// Environment variable overriding the tether home (cache) directory.
pub const HOME_ENV: &str = "TETHER_HOME";

/// Environment variable listing local source roots, separated like `PATH`.
pub const SOURCE_PATH_ENV: &str = "TETHER_PATH";

/// Name of the vendor directory inside a project.
pub const VENDOR_DIR: &str = "vendor";

/// Find the project root by walking up from `cwd` looking for the manifest.
///
/// # Errors
/// Returns [`Error::ProjectNotFound`] if no parent holds a manifest.
pub fn project_root(cwd: &Path) -> Result<PathBuf, Error> {
    let mut current = cwd.to_path_buf();

    loop {
        if current.join(MANIFEST_NAME).exists() {
            return Ok(current);
        }

        if !current.pop() {
            return Err(Error::ProjectNotFound {
                start: cwd.to_path_buf(),
                marker: MANIFEST_NAME,
            });
        }
    }
}

/// Get the tether home directory.
///
/// `TETHER_HOME` wins when set. Otherwise:
/// - Linux: `$XDG_CACHE_HOME/tether` or `~/.cache/tether`
/// - macOS: `~/Library/Caches/tether`
/// - Windows: `%LOCALAPPDATA%\tether`
#[must_use]
pub fn home_dir() -> PathBuf {
    if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(home);
    }

    dirs_next::cache_dir().map_or_else(
        || {
            dirs_next::home_dir().map_or_else(
                || PathBuf::from(".tether-cache"),
                |p| p.join(".cache").join("tether"),
            )
        },
        |p| p.join("tether"),
    )
}

/// Versioned cache directory under `home`.
#[must_use]
pub fn cache_dir(home: &Path) -> PathBuf {
    home.join("cache").join(format!("v{SCHEMA_VERSION}"))
}

/// Local source roots from `TETHER_PATH`, in declaration order.
///
/// Each root holds checkouts laid out by import path
/// (`<root>/github.com/org/repo/...`). Empty entries are dropped.
#[must_use]
pub fn source_roots() -> Vec<PathBuf> {
    std::env::var_os(SOURCE_PATH_ENV)
        .map(|v| {
            std::env::split_paths(&v)
                .filter(|p| !p.as_os_str().is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// First local source root holding a directory for `import_path`.
#[must_use]
pub fn find_local_source(roots: &[PathBuf], import_path: &str) -> Option<PathBuf> {
    roots
        .iter()
        .map(|root| root.join(import_path))
        .find(|candidate| candidate.is_dir())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_find_local_source_first_match() {
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        let pkg = "github.com/org/repo/sub";
        fs::create_dir_all(b.path().join(pkg)).unwrap();

        let roots = vec![a.path().to_path_buf(), b.path().to_path_buf()];
        assert_eq!(find_local_source(&roots, pkg), Some(b.path().join(pkg)));

        fs::create_dir_all(a.path().join(pkg)).unwrap();
        assert_eq!(find_local_source(&roots, pkg), Some(a.path().join(pkg)));

        assert_eq!(find_local_source(&roots, "github.com/none/here"), None);
    }

    #[test]
    fn test_project_root_walks_up() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_NAME), "{}").unwrap();
        let nested = dir.path().join("cmd").join("tool");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(project_root(&nested).unwrap(), dir.path());
    }

    #[test]
    fn test_project_root_missing() {
        let dir = tempdir().unwrap();
        let err = project_root(dir.path()).unwrap_err();
        assert_eq!(err.code(), "PROJECT_NOT_FOUND");
    }

    #[test]
    #[serial]
    fn test_home_dir_env_override() {
        std::env::set_var(HOME_ENV, "/tmp/tether-home-test");
        assert_eq!(home_dir(), PathBuf::from("/tmp/tether-home-test"));
        std::env::remove_var(HOME_ENV);
        assert_ne!(home_dir(), PathBuf::from("/tmp/tether-home-test"));
    }

    #[test]
    #[serial]
    fn test_source_roots_split() {
        let a = PathBuf::from("/src/a");
        let b = PathBuf::from("/src/b");
        let joined = std::env::join_paths([&a, &b]).unwrap();
        std::env::set_var(SOURCE_PATH_ENV, joined);
        assert_eq!(source_roots(), vec![a, b]);

        std::env::remove_var(SOURCE_PATH_ENV);
        assert!(source_roots().is_empty());
    }
}
