//! `tether update` command implementation.
//!
//! Resolves the full transitive import set, updates every vendored
//! repository and writes `tether.lock` from the result.

use super::{dependency_json, fail, load_project, FetchArgs};
use miette::Result;
use std::path::{Path, PathBuf};
use tether_core::pkg::{Lockfile, PkgError, LOCKFILE_NAME, MANIFEST_NAME};
use tether_core::Error;
use tether_util::hash::blake3_file;
use tracing::info;

/// Run the update command.
pub fn run(cwd: &Path, fetch: &FetchArgs, json: bool) -> Result<()> {
    match perform(cwd, fetch) {
        Ok((lock_path, lock)) => {
            if json {
                let deps: Vec<_> = lock
                    .imports
                    .iter()
                    .map(|d| dependency_json(&d.to_dependency()))
                    .collect();
                println!(
                    "{}",
                    serde_json::json!({
                        "ok": true,
                        "lockfile": lock_path.to_string_lossy(),
                        "dependencies": deps
                    })
                );
            } else {
                for dep in &lock.imports {
                    println!("{} {}", dep.name, dep.version);
                }
                println!(
                    "Updated {} dependencies, wrote {}",
                    lock.imports.len(),
                    lock_path.display()
                );
            }
            Ok(())
        }
        Err(e) => fail(&e, json),
    }
}

/// Update the project at `cwd` and write its lockfile.
pub fn perform(cwd: &Path, fetch: &FetchArgs) -> Result<(PathBuf, Lockfile), Error> {
    let (root, mut manifest) = load_project(cwd)?;
    let installer = fetch.installer(&root);

    installer.update(&mut manifest)?;

    let hash = blake3_file(&root.join(MANIFEST_NAME))
        .map_err(|e| PkgError::manifest_invalid(format!("Failed to hash manifest: {e}")))?;
    let lock = installer.lock_from(hash, &manifest.imports, &manifest.dev_imports);
    let lock_path = root.join(LOCKFILE_NAME);
    lock.write_to(&lock_path)?;
    info!(path = %lock_path.display(), "Wrote lockfile");

    Ok((lock_path, lock))
}
