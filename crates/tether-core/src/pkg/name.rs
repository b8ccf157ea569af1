//! Import path normalization.
//!
//! Splits an import path into its repository root (the unit fetched from a
//! VCS remote) and the subpackage path inside that repository:
//!
//! ```text
//! github.com/org/repo/encoding/json  ->  ("github.com/org/repo", "encoding/json")
//! gopkg.in/yaml.v2                   ->  ("gopkg.in/yaml.v2", "")
//! example.org/tools.git/cmd/fmt      ->  ("example.org/tools.git", "cmd/fmt")
//! ```

use regex_lite::Regex;
use std::sync::OnceLock;

/// Hosts whose repository root sits at a fixed depth.
///
/// Depth counts every segment, including the host itself.
const KNOWN_HOSTS: &[(&str, usize)] = &[
    ("github.com", 3),
    ("bitbucket.org", 3),
    ("gitlab.com", 3),
    ("golang.org/x", 3),
    ("hub.jazz.net/git", 4),
    ("launchpad.net", 2),
    ("google.golang.org", 2),
    ("go.googlesource.com", 2),
];

/// Root depth for hosts with no specific rule.
const DEFAULT_ROOT_DEPTH: usize = 3;

/// A segment ending in a VCS suffix terminates the root.
const VCS_SUFFIX_PATTERN: &str = r"^(?:[^/]+/)*?[^/]+\.(?:git|hg|svn|bzr)(?:/|$)";

/// `gopkg.in/pkg.vN` and `gopkg.in/user/pkg.vN`.
const GOPKG_PATTERN: &str = r"^gopkg\.in/(?:[A-Za-z0-9_-]+/)?[A-Za-z0-9_.-]+\.v[0-9]+(?:/|$)";

static VCS_SUFFIX_RE: OnceLock<Option<Regex>> = OnceLock::new();
static GOPKG_RE: OnceLock<Option<Regex>> = OnceLock::new();

/// Split an import path into `(repository root, subpackage)`.
///
/// The subpackage is empty when the path is the root itself. Leading and
/// trailing slashes are ignored.
#[must_use]
pub fn normalize_name(path: &str) -> (String, String) {
    let trimmed = path.trim_matches('/');
    let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
    let depth = root_depth(trimmed).min(segments.len());

    (segments[..depth].join("/"), segments[depth..].join("/"))
}

/// Repository root of an import path.
#[must_use]
pub fn root_of(path: &str) -> String {
    normalize_name(path).0
}

fn root_depth(path: &str) -> usize {
    if let Some(depth) = pattern_depth(&VCS_SUFFIX_RE, VCS_SUFFIX_PATTERN, path) {
        return depth;
    }
    if let Some(depth) = pattern_depth(&GOPKG_RE, GOPKG_PATTERN, path) {
        return depth;
    }

    KNOWN_HOSTS
        .iter()
        .find(|(prefix, _)| {
            path == *prefix
                || path
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/'))
        })
        .map_or(DEFAULT_ROOT_DEPTH, |(_, depth)| *depth)
}

/// Number of segments covered by the leading match of `pattern`, if any.
fn pattern_depth(cell: &OnceLock<Option<Regex>>, pattern: &str, path: &str) -> Option<usize> {
    let re = cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()?;
    let matched = re.find(path)?.as_str().trim_end_matches('/');
    Some(matched.split('/').count())
}
