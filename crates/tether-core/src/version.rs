use crate::pkg::PKG_LOCK_SCHEMA_VERSION;

/// Crate version, from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Layout version of the repository cache under the tether home.
/// A new value makes every existing cache directory unused.
pub const SCHEMA_VERSION: u32 = 1;

/// `tether <version>` followed by the lockfile and cache formats it speaks.
#[must_use]
pub fn version_string() -> String {
    format!("tether {VERSION} (lockfile v{PKG_LOCK_SCHEMA_VERSION}, cache v{SCHEMA_VERSION})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_string_names_formats() {
        let vs = version_string();
        assert!(vs.starts_with(&format!("tether {VERSION} ")));
        assert!(vs.ends_with("(lockfile v1, cache v1)"));
    }
}
