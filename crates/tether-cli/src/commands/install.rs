//! `tether install` command implementation.
//!
//! Installs the versions recorded in `tether.lock`. Without a lockfile it
//! falls back to a full update.

use super::{dependency_json, fail, load_project, update, FetchArgs};
use miette::Result;
use std::path::Path;
use tether_core::pkg::{Dependency, Lockfile, LOCKFILE_NAME, MANIFEST_NAME};
use tether_core::Error;
use tether_util::hash::blake3_file;
use tracing::warn;

/// Run the install command.
pub fn run(cwd: &Path, fetch: &FetchArgs, json: bool) -> Result<()> {
    match perform(cwd, fetch) {
        Ok(installed) => {
            if json {
                let deps: Vec<_> = installed.iter().map(dependency_json).collect();
                println!(
                    "{}",
                    serde_json::json!({
                        "ok": true,
                        "installed": deps
                    })
                );
            } else if installed.is_empty() {
                println!("Nothing to install.");
            } else {
                for dep in &installed {
                    println!("{} {}", dep.name, dep.reference);
                }
                println!("Installed {} dependencies", installed.len());
            }
            Ok(())
        }
        Err(e) => fail(&e, json),
    }
}

fn perform(cwd: &Path, fetch: &FetchArgs) -> Result<Vec<Dependency>, Error> {
    let (root, mut manifest) = load_project(cwd)?;

    let Some(lock) = Lockfile::read_from(&root.join(LOCKFILE_NAME))? else {
        warn!("Lockfile ({LOCKFILE_NAME}) does not exist. Performing update.");
        let (_, lock) = update::perform(cwd, fetch)?;
        return Ok(lock
            .imports
            .iter()
            .map(tether_core::pkg::LockedDependency::to_dependency)
            .collect());
    };

    if let Ok(hash) = blake3_file(&root.join(MANIFEST_NAME)) {
        if !lock.matches_hash(&hash) {
            warn!("Lockfile may be out of date: the manifest changed since it was written");
        }
    }

    fetch.installer(&root).install(&lock, &mut manifest)?;
    Ok(manifest.imports)
}
