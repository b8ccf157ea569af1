//! Folding discovered import paths into repository-level records.

use super::dependency::Dependency;
use super::name::normalize_name;
use std::collections::HashMap;

/// Reduce an ordered list of import paths to one record per repository root.
///
/// Records appear in the order their root was first seen; each record's
/// subpackages keep first-seen order without duplicates. The order is part
/// of the contract: lockfiles written from it must be reproducible.
#[must_use]
pub fn dependencies_from_packages(packages: &[String]) -> Vec<Dependency> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(packages.len());
    let mut deps: Vec<Dependency> = Vec::new();

    for pkg in packages {
        let (root, sub) = normalize_name(pkg);
        if root.is_empty() {
            continue;
        }

        let i = *index.entry(root).or_insert_with_key(|root| {
            deps.push(Dependency::new(root.clone()));
            deps.len() - 1
        });
        deps[i].add_subpackage(&sub);
    }

    deps
}
