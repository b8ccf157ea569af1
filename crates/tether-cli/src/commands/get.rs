//! `tether get` command implementation.
//!
//! Adds packages to `tether.json`, then runs a full update so the new
//! dependencies are vendored and locked.

use super::{dependency_json, fail, load_project, update, FetchArgs};
use miette::Result;
use std::path::Path;
use tether_core::pkg::{Dependency, LockedDependency, MANIFEST_NAME};
use tether_core::Error;
use tracing::info;

/// What `get` changed.
struct Outcome {
    added: usize,
    dependencies: Vec<Dependency>,
}

/// Run the get command.
pub fn run(
    cwd: &Path,
    packages: &[String],
    dev: bool,
    no_install: bool,
    fetch: &FetchArgs,
    json: bool,
) -> Result<()> {
    match perform(cwd, packages, dev, no_install, fetch) {
        Ok(outcome) => {
            if json {
                let deps: Vec<_> = outcome.dependencies.iter().map(dependency_json).collect();
                println!(
                    "{}",
                    serde_json::json!({
                        "ok": true,
                        "added": outcome.added,
                        "dependencies": deps
                    })
                );
            } else if outcome.added == 0 {
                println!("No packages added.");
            } else {
                for dep in &outcome.dependencies {
                    println!("{} {}", dep.name, dep.reference);
                }
                println!("Added {} packages to {MANIFEST_NAME}", outcome.added);
            }
            Ok(())
        }
        Err(e) => fail(&e, json),
    }
}

fn perform(
    cwd: &Path,
    packages: &[String],
    dev: bool,
    no_install: bool,
    fetch: &FetchArgs,
) -> Result<Outcome, Error> {
    let (root, mut manifest) = load_project(cwd)?;

    let added = manifest.add_packages(packages, dev)?;
    if added == 0 {
        return Ok(Outcome {
            added,
            dependencies: manifest.imports,
        });
    }
    manifest.write_to(&root.join(MANIFEST_NAME))?;
    info!(added, "Updated {MANIFEST_NAME}");

    if no_install {
        return Ok(Outcome {
            added,
            dependencies: manifest.imports,
        });
    }

    let (_, lock) = update::perform(cwd, fetch)?;
    Ok(Outcome {
        added,
        dependencies: lock
            .imports
            .iter()
            .map(LockedDependency::to_dependency)
            .collect(),
    })
}
