use std::fs::File;
use std::io;
use std::path::Path;

/// Hex BLAKE3 digest of a file's contents, streamed.
///
/// # Errors
/// Returns an error if the file cannot be opened or read.
pub fn blake3_file(path: &Path) -> io::Result<String> {
    let mut hasher = blake3::Hasher::new();
    hasher.update_reader(File::open(path)?)?;
    Ok(hasher.finalize().to_hex().to_string())
}

/// Hex digest of `data`, truncated to `len` characters.
///
/// Used for stable, filesystem-safe directory names (e.g. one cache
/// directory per remote URL). `len` is clamped to the full digest length.
#[must_use]
pub fn short_digest(data: &[u8], len: usize) -> String {
    let hex = blake3::hash(data).to_hex();
    let len = len.min(hex.len());
    hex[..len].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HELLO_WORLD: &str = "d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24";

    #[test]
    fn test_blake3_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        file.flush().unwrap();

        assert_eq!(blake3_file(file.path()).unwrap(), HELLO_WORLD);
    }

    #[test]
    fn test_blake3_file_not_found() {
        assert!(blake3_file(Path::new("/nonexistent/file")).is_err());
    }

    #[test]
    fn test_short_digest() {
        assert_eq!(short_digest(b"hello world", 16), &HELLO_WORLD[..16]);
        assert_eq!(short_digest(b"hello world", 1000), HELLO_WORLD);
        assert_ne!(
            short_digest(b"https://github.com/a/b", 16),
            short_digest(b"https://github.com/a/c", 16)
        );
    }
}
