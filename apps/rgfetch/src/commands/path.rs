//! Path command for the rgfetch CLI.
//!
//! Prints where the ripgrep executable is installed, so scripts can locate it
//! without repeating the target resolution.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::config::env_var;
use crate::prebuilt::Target;
use crate::prebuilt::paths::binary_path;
use crate::prebuilt::platform::ARCH_OVERRIDE_ENV;

/// Arguments for the path command.
#[derive(Args, Debug, Clone)]
pub struct PathArgs {
    /// Directory the executable was installed into.
    #[arg(long, default_value = "bin")]
    pub dest: PathBuf,

    /// Target triple instead of the host's.
    #[arg(long)]
    pub target: Option<String>,
}

/// Executes the path command.
///
/// # Errors
///
/// Returns an error if the target cannot be resolved or no executable exists
/// at the expected location.
pub fn execute(args: &PathArgs) -> Result<()> {
    let path = resolve(args)?;
    if !path.is_file() {
        anyhow::bail!(
            "ripgrep is not installed at {}. Run 'rgfetch install' first.",
            path.display()
        );
    }
    println!("{}", path.display());
    Ok(())
}

fn resolve(args: &PathArgs) -> Result<PathBuf> {
    let target = match &args.target {
        Some(triple) => Target::from_triple(triple)?,
        None => Target::detect(env_var(ARCH_OVERRIDE_ENV).as_deref())?,
    };
    Ok(binary_path(&args.dest, target))
}
