//! Command implementations.

pub mod checkout;
pub mod get;
pub mod install;
pub mod list;
pub mod update;
pub mod version;

use std::path::{Path, PathBuf};
use tether_core::paths::project_root;
use tether_core::pkg::{Dependency, Installer, Manifest, MANIFEST_NAME};
use tether_core::Error;

/// Flags shared by the commands that fetch or update repositories.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct FetchArgs {
    /// Vendor directory (relative paths resolve against the project root)
    #[arg(long, value_name = "DIR")]
    pub vendor: Option<PathBuf>,

    /// Fetch through the shared repository cache
    #[arg(long)]
    pub cache: bool,

    /// Copy fetched repositories into the first TETHER_PATH root
    #[arg(long)]
    pub cache_local: bool,

    /// Copy packages from TETHER_PATH roots instead of fetching them
    #[arg(long)]
    pub use_local: bool,

    /// Replace vendored copies that have no VCS metadata
    #[arg(long)]
    pub update_vendored: bool,

    /// Replace anything that would stop an update
    #[arg(long)]
    pub force: bool,
}

impl FetchArgs {
    /// Installer for the project at `root` configured from these flags.
    pub fn installer(&self, root: &Path) -> Installer {
        let mut installer = Installer::new(root);
        installer.vendor = self.vendor.as_ref().map(|v| root.join(v));
        installer.use_cache = self.cache;
        installer.cache_local_source = self.cache_local;
        installer.use_local_source = self.use_local;
        installer.update_vendored = self.update_vendored;
        installer.force = self.force;
        installer
    }
}

/// Locate the project from `cwd` and load its manifest, deduplicated.
pub fn load_project(cwd: &Path) -> Result<(PathBuf, Manifest), Error> {
    let root = project_root(cwd)?;
    let mut manifest = Manifest::load(&root.join(MANIFEST_NAME))?;
    manifest.dedupe();
    Ok((root, manifest))
}

/// JSON shape of one dependency in command output.
pub fn dependency_json(dep: &Dependency) -> serde_json::Value {
    serde_json::json!({
        "name": dep.name,
        "reference": dep.reference,
        "pin": dep.pin,
        "subpackages": dep.subpackages,
    })
}

/// Report `err` and exit non-zero.
pub fn fail(err: &Error, json: bool) -> ! {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "ok": false,
                "error": {
                    "code": err.code(),
                    "message": err.to_string()
                }
            })
        );
    } else {
        eprintln!("error: {err}");
    }
    std::process::exit(1);
}
