#![warn(clippy::pedantic)]

//! # rgfetch
//!
//! The `rgfetch` command installs a prebuilt ripgrep executable for the
//! current platform. It is meant to run as a package post-install step: it
//! resolves the target triple, downloads the matching release archive (from a
//! mirror or through the release API), caches it, unpacks it, and leaves the
//! executable at `<dest>/rg` or `<dest>/rg.exe`.
//!
//! ## Subcommands
//!
//! - `install` - Install ripgrep (also the default when no subcommand is given)
//! - `path` - Print where ripgrep is installed
//!
//! ## Examples
//!
//! Install the default release into `./bin`:
//! ```bash
//! rgfetch
//! ```
//!
//! Install through a mirror into `vendor/`:
//! ```bash
//! RIPGREP_MIRROR=https://mirror.example/ripgrep rgfetch install --dest vendor
//! ```
//!
//! Print the installed location:
//! ```bash
//! rgfetch path
//! ```

mod commands;
mod config;
mod errors;
mod prebuilt;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{install, path};
use tracing_subscriber::EnvFilter;

/// Prebuilt ripgrep installer.
#[derive(Parser)]
#[command(
    name = "rgfetch",
    author,
    version,
    about = "Installs a prebuilt ripgrep executable",
    long_about = "Downloads the prebuilt ripgrep release archive for this platform, caches it, \
    and unpacks the executable into a destination directory.",
    args_conflicts_with_subcommands = true,
    after_help = "\
ENVIRONMENT VARIABLES:
    RIPGREP_VERSION         Release tag (default: v13.0.0-13)
    npm_config_arch         Architecture override (e.g. arm64, x64, s390x)
    GITHUB_TOKEN            Token sent to the release API host only
    RIPGREP_MIRROR          Mirror base URL; bypasses the release API
    RGFETCH_API_SERVER      Release API URL (default: https://api.github.com)
    RGFETCH_CACHE_DIR       Cache directory (default: <tmp>/rgfetch-cache-<version>)
    RIPGREP_SHA256          Expected SHA256 of the release archive
    HTTPS_PROXY, HTTP_PROXY, NO_PROXY
                            Proxy routing (lowercase and npm_config_* forms accepted)
    RUST_LOG                Log filter (default: info)"
)]
pub struct Cli {
    /// Log debug output, including download progress.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Install options used when no subcommand is given.
    #[command(flatten)]
    pub install: install::InstallArgs,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands for the rgfetch CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// Install ripgrep.
    ///
    /// Skips the download when the executable is already present unless
    /// --force is given.
    Install(install::InstallArgs),

    /// Print where ripgrep is installed.
    ///
    /// Exits with an error if the executable is missing.
    Path(path::PathArgs),
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = run().await {
        let exit_code = handle_error(&e);
        std::process::exit(exit_code);
    }
}

/// Prints an error and returns the process exit code.
fn handle_error(e: &anyhow::Error) -> i32 {
    eprintln!("Error: {e:?}");
    1
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::Install(args)) => install::execute(&args).await,
        Some(Commands::Path(args)) => path::execute(&args),
        None => install::execute(&cli.install).await,
    }
}
