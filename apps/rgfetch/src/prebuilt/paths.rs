//! Filesystem layout for rgfetch.
//!
//! ## Directory Structure
//!
//! ```text
//! <tmp>/rgfetch-cache-<version>/   # Cache directory (or RGFETCH_CACHE_DIR)
//!   ripgrep-<tag>-<triple>.tar.gz  # Completed download
//!   ripgrep-<tag>-<triple>.tar.gz.part  # In-flight download, never reused
//!
//! <dest>/                          # Destination directory (default ./bin)
//!   rg | rg.exe                    # Installed executable
//!   .rgfetch-staging/              # Extraction scratch space, removed after install
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::platform::Target;

/// Environment variable to override the cache directory.
pub const CACHE_DIR_ENV: &str = "RGFETCH_CACHE_DIR";

/// Name of the scratch directory created inside the destination.
const STAGING_DIR: &str = ".rgfetch-staging";

/// Returns the default cache directory, namespaced by the crate version.
#[must_use]
pub fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join(format!("rgfetch-cache-{}", env!("CARGO_PKG_VERSION")))
}

/// Returns where the executable for `target` lives inside `dest_dir`.
#[must_use]
pub fn binary_path(dest_dir: &Path, target: Target) -> PathBuf {
    dest_dir.join(target.binary_name())
}

/// Returns the extraction scratch directory for `dest_dir`.
#[must_use]
pub fn staging_dir(dest_dir: &Path) -> PathBuf {
    dest_dir.join(STAGING_DIR)
}

/// Creates `dir` and its ancestors.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))
}

/// Deletes a cached archive so the next run downloads it again.
///
/// Failures are logged, not returned.
pub fn invalidate_cache_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::info!("Deleted invalid download cache {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Could not delete {}: {e}", path.display()),
    }
}

/// Removes install-time temporary directories, best effort.
///
/// Missing directories are skipped silently; other failures are logged.
pub fn cleanup_install_dirs(dirs: &[PathBuf]) {
    for dir in dirs {
        if !dir.exists() {
            continue;
        }
        match std::fs::remove_dir_all(dir) {
            Ok(()) => tracing::info!("Removed {}", dir.display()),
            Err(e) => tracing::warn!("Could not remove {}: {e}", dir.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_test_dir(name: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("rgfetch_test_{}_{}", name, rand::random::<u64>()));
        std::fs::create_dir_all(&dir).expect("Should create temp dir");
        dir
    }

    #[test]
    fn default_cache_dir_is_versioned_under_temp() {
        let dir = default_cache_dir();
        assert!(dir.starts_with(std::env::temp_dir()));
        assert!(
            dir.to_string_lossy()
                .ends_with(&format!("rgfetch-cache-{}", env!("CARGO_PKG_VERSION")))
        );
    }

    #[test]
    fn binary_path_follows_target() {
        let linux = Target::from_triple("x86_64-unknown-linux-musl").unwrap();
        let windows = Target::from_triple("x86_64-pc-windows-msvc").unwrap();
        assert_eq!(binary_path(Path::new("bin"), linux), PathBuf::from("bin/rg"));
        assert_eq!(
            binary_path(Path::new("bin"), windows),
            Path::new("bin").join("rg.exe")
        );
    }

    #[test]
    fn cleanup_removes_existing_and_skips_missing() {
        let root = temp_test_dir("cleanup");
        let present = root.join("_node_modules");
        std::fs::create_dir_all(present.join("nested")).unwrap();
        std::fs::write(present.join("nested").join("f.js"), "x").unwrap();
        let missing = root.join("does-not-exist");

        cleanup_install_dirs(&[present.clone(), missing]);

        assert!(!present.exists());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn invalidate_cache_file_is_idempotent() {
        let root = temp_test_dir("invalidate");
        let file = root.join("asset.zip");
        std::fs::write(&file, "junk").unwrap();

        invalidate_cache_file(&file);
        assert!(!file.exists());
        invalidate_cache_file(&file);

        let _ = std::fs::remove_dir_all(&root);
    }
}
