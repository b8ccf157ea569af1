//! Repository-level dependency records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Version control system backing a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VcsKind {
    Git,
    Hg,
    Svn,
    Bzr,
}

impl VcsKind {
    /// All kinds, in detection order.
    pub const ALL: [VcsKind; 4] = [Self::Git, Self::Hg, Self::Svn, Self::Bzr];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Git => "git",
            Self::Hg => "hg",
            Self::Svn => "svn",
            Self::Bzr => "bzr",
        }
    }

    /// Metadata directory that marks a checkout of this kind.
    #[must_use]
    pub fn metadata_dir(&self) -> &'static str {
        match self {
            Self::Git => ".git",
            Self::Hg => ".hg",
            Self::Svn => ".svn",
            Self::Bzr => ".bzr",
        }
    }
}

impl fmt::Display for VcsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One repository root and everything known about how to fetch it.
///
/// `name` is the repository root import path and the record's identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Repository root import path.
    #[serde(rename = "package")]
    pub name: String,
    /// Requested branch, tag or revision.
    #[serde(default, rename = "version", skip_serializing_if = "String::is_empty")]
    pub reference: String,
    /// Concrete revision actually checked out.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pin: String,
    /// Remote URL override.
    #[serde(default, rename = "repo", skip_serializing_if = "String::is_empty")]
    pub repository: String,
    /// VCS kind override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vcs: Option<VcsKind>,
    /// Subpackage paths used from this repository, in first-seen order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subpackages: Vec<String>,
    /// Operating systems this dependency is restricted to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub os: Vec<String>,
    /// Architectures this dependency is restricted to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arch: Vec<String>,
}

impl Dependency {
    /// Create a record for a repository root with nothing else known.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the requested reference.
    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    /// Set the repository URL override.
    #[must_use]
    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = repository.into();
        self
    }

    /// Set the VCS kind override.
    #[must_use]
    pub fn with_vcs(mut self, vcs: VcsKind) -> Self {
        self.vcs = Some(vcs);
        self
    }

    /// Record a subpackage, keeping first-seen order and skipping duplicates.
    pub fn add_subpackage(&mut self, subpackage: &str) {
        if !subpackage.is_empty() && !self.subpackages.iter().any(|s| s == subpackage) {
            self.subpackages.push(subpackage.to_string());
        }
    }

    /// Remote to fetch from: the override, else `https://<name>`.
    #[must_use]
    pub fn remote(&self) -> String {
        if self.repository.is_empty() {
            format!("https://{}", self.name)
        } else {
            self.repository.clone()
        }
    }

    /// Revision a checkout of this record should sit at: the pin once one
    /// was resolved, else the requested reference.
    #[must_use]
    pub fn target_revision(&self) -> &str {
        if self.pin.is_empty() {
            &self.reference
        } else {
            &self.pin
        }
    }

    /// Whether the OS/arch constraints admit the current platform.
    #[must_use]
    pub fn matches_platform(&self) -> bool {
        self.matches(std::env::consts::OS, std::env::consts::ARCH)
    }

    fn matches(&self, os: &str, arch: &str) -> bool {
        (self.os.is_empty() || self.os.iter().any(|o| o == os))
            && (self.arch.is_empty() || self.arch.iter().any(|a| a == arch))
    }

    /// Fold `other` (same root) into this record.
    ///
    /// Subpackages are unioned; scalar fields keep their current value and
    /// only take `other`'s when empty.
    pub fn merge(&mut self, other: &Dependency) {
        for sp in &other.subpackages {
            self.add_subpackage(sp);
        }
        fill(&mut self.reference, &other.reference);
        fill(&mut self.pin, &other.pin);
        fill(&mut self.repository, &other.repository);
        if self.vcs.is_none() {
            self.vcs = other.vcs;
        }
        if self.os.is_empty() {
            self.os.clone_from(&other.os);
        }
        if self.arch.is_empty() {
            self.arch.clone_from(&other.arch);
        }
    }
}

fn fill(field: &mut String, value: &str) {
    if field.is_empty() && !value.is_empty() {
        *field = value.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_subpackage_dedupes() {
        let mut dep = Dependency::new("github.com/org/repo");
        dep.add_subpackage("a");
        dep.add_subpackage("b");
        dep.add_subpackage("a");
        dep.add_subpackage("");
        assert_eq!(dep.subpackages, vec!["a", "b"]);
    }

    #[test]
    fn test_remote_default_and_override() {
        let dep = Dependency::new("github.com/org/repo");
        assert_eq!(dep.remote(), "https://github.com/org/repo");

        let dep = dep.with_repository("git@github.com:fork/repo.git");
        assert_eq!(dep.remote(), "git@github.com:fork/repo.git");
    }

    #[test]
    fn test_target_revision_prefers_pin() {
        let mut dep = Dependency::new("github.com/org/repo").with_reference("master");
        assert_eq!(dep.target_revision(), "master");

        dep.pin = "c39fb71".to_string();
        assert_eq!(dep.target_revision(), "c39fb71");
    }

    #[test]
    fn test_platform_constraints() {
        let mut dep = Dependency::new("github.com/org/repo");
        assert!(dep.matches("linux", "x86_64"));

        dep.os = vec!["windows".to_string()];
        assert!(!dep.matches("linux", "x86_64"));
        assert!(dep.matches("windows", "x86_64"));

        dep.arch = vec!["aarch64".to_string()];
        assert!(!dep.matches("windows", "x86_64"));
        assert!(dep.matches("windows", "aarch64"));
    }

    #[test]
    fn test_merge_keeps_existing_fields() {
        let mut a = Dependency::new("github.com/org/repo").with_reference("v1");
        a.add_subpackage("x");
        let mut b = Dependency::new("github.com/org/repo")
            .with_reference("v2")
            .with_repository("https://mirror/repo")
            .with_vcs(VcsKind::Hg);
        b.add_subpackage("y");
        b.add_subpackage("x");

        a.merge(&b);

        assert_eq!(a.reference, "v1");
        assert_eq!(a.repository, "https://mirror/repo");
        assert_eq!(a.vcs, Some(VcsKind::Hg));
        assert_eq!(a.subpackages, vec!["x", "y"]);
    }

    #[test]
    fn test_serde_field_names() {
        let dep = Dependency::new("github.com/org/repo")
            .with_reference("v1.2.0")
            .with_vcs(VcsKind::Git);
        let json = serde_json::to_value(&dep).unwrap();
        assert_eq!(json["package"], "github.com/org/repo");
        assert_eq!(json["version"], "v1.2.0");
        assert_eq!(json["vcs"], "git");
        assert!(json.get("pin").is_none());
    }
}
