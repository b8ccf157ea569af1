//! `tether list` command implementation.
//!
//! Walks the vendored import graph without fetching or updating anything.

use super::{dependency_json, fail, load_project, FetchArgs};
use miette::Result;
use std::path::{Path, PathBuf};
use tether_core::pkg::Dependency;
use tether_core::Error;

/// Run the list command.
pub fn run(cwd: &Path, vendor: Option<PathBuf>, json: bool) -> Result<()> {
    match perform(cwd, vendor) {
        Ok(deps) => {
            if json {
                let list: Vec<_> = deps.iter().map(dependency_json).collect();
                println!(
                    "{}",
                    serde_json::json!({
                        "ok": true,
                        "dependencies": list
                    })
                );
            } else if deps.is_empty() {
                println!("No dependencies found.");
            } else {
                for dep in &deps {
                    println!("{}", dep.name);
                    for sp in &dep.subpackages {
                        println!("  {}/{sp}", dep.name);
                    }
                }
            }
            Ok(())
        }
        Err(e) => fail(&e, json),
    }
}

fn perform(cwd: &Path, vendor: Option<PathBuf>) -> Result<Vec<Dependency>, Error> {
    let (root, mut manifest) = load_project(cwd)?;
    let fetch = FetchArgs {
        vendor,
        ..Default::default()
    };
    let deps = fetch.installer(&root).list(&mut manifest)?;
    Ok(deps)
}
