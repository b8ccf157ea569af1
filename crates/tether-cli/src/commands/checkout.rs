use super::{fail, load_project, FetchArgs};
use miette::Result;
use std::path::Path;
use tether_core::Error;

/// Run the checkout command.
pub fn run(cwd: &Path, fetch: &FetchArgs, dev: bool, json: bool) -> Result<()> {
    match perform(cwd, fetch, dev) {
        Ok(count) => {
            if json {
                println!("{}", serde_json::json!({ "ok": true, "checked_out": count }));
            } else {
                println!("Checked out {count} dependencies");
            }
            Ok(())
        }
        Err(e) => fail(&e, json),
    }
}

fn perform(cwd: &Path, fetch: &FetchArgs, dev: bool) -> Result<usize, Error> {
    let (root, manifest) = load_project(cwd)?;
    fetch.installer(&root).checkout(&manifest, dev)?;

    let mut count = manifest.imports.len();
    if dev {
        count += manifest.dev_imports.len();
    }
    Ok(count)
}
