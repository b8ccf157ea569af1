#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod logging;

use clap::Parser;
use commands::FetchArgs;
use miette::Result;
use std::path::PathBuf;
use tether_core::Config;

#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(author, version, about = "Vendored dependency management for version-controlled packages", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Install the exact versions recorded in the lockfile
    Install {
        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Check out every declared dependency at its declared reference
    Checkout {
        /// Also check out dev imports
        #[arg(long)]
        dev: bool,

        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Resolve all transitive imports, update them and write the lockfile
    Update {
        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Add packages to the manifest, then update and lock
    Get {
        /// Import paths to add, optionally as `path#reference`
        #[arg(required = true, value_name = "PACKAGE")]
        packages: Vec<String>,

        /// Add as dev imports
        #[arg(long)]
        dev: bool,

        /// Only edit the manifest; do not fetch or write the lockfile
        #[arg(long)]
        no_install: bool,

        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// List every dependency reachable from the manifest
    List {
        /// Vendor directory (relative paths resolve against the project root)
        #[arg(long, value_name = "DIR")]
        vendor: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    let config = Config::new(cwd)
        .with_verbosity(cli.verbose)
        .with_json_logs(cli.json);

    logging::init(config.verbosity, config.json_logs);
    let cwd = config.cwd.as_path();

    match cli.command {
        Some(Commands::Version) | None => commands::version::run(cli.json),
        Some(Commands::Install { fetch }) => {
            let span = tracing::info_span!("install", cmd = "install", cwd = %cwd.display());
            let _guard = span.enter();
            commands::install::run(cwd, &fetch, cli.json)
        }
        Some(Commands::Checkout { dev, fetch }) => {
            let span = tracing::info_span!("checkout", cmd = "checkout", cwd = %cwd.display());
            let _guard = span.enter();
            commands::checkout::run(cwd, &fetch, dev, cli.json)
        }
        Some(Commands::Update { fetch }) => {
            let span = tracing::info_span!("update", cmd = "update", cwd = %cwd.display());
            let _guard = span.enter();
            commands::update::run(cwd, &fetch, cli.json)
        }
        Some(Commands::Get {
            packages,
            dev,
            no_install,
            fetch,
        }) => {
            let span = tracing::info_span!("get", cmd = "get", cwd = %cwd.display());
            let _guard = span.enter();
            commands::get::run(cwd, &packages, dev, no_install, &fetch, cli.json)
        }
        Some(Commands::List { vendor }) => {
            let span = tracing::info_span!("list", cmd = "list", cwd = %cwd.display());
            let _guard = span.enter();
            commands::list::run(cwd, vendor, cli.json)
        }
    }
}
