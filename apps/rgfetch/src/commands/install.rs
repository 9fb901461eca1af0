//! Install command for the rgfetch CLI.
//!
//! Downloads the prebuilt ripgrep archive for the host (or a given target),
//! unpacks it, and places the executable at `<dest>/rg` or `<dest>/rg.exe`.
//!
//! ## Usage
//!
//! ```bash
//! rgfetch                               # Install the default release into ./bin
//! rgfetch install --tag v13.0.0-13      # Install a specific release
//! rgfetch install --dest vendor --force # Reinstall into ./vendor
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use reqwest::Url;

use crate::config::InstallRequest;
use crate::errors::RgFetchError;
use crate::prebuilt::paths::{self, cleanup_install_dirs, invalidate_cache_file};
use crate::prebuilt::retry::DEFAULT_MAX_ATTEMPTS;
use crate::prebuilt::{Downloader, archive, fetch, set_executable_permissions};

/// Arguments for the install command.
#[derive(Args, Debug, Clone)]
pub struct InstallArgs {
    /// Release tag to install (e.g., "v13.0.0-13").
    ///
    /// Falls back to RIPGREP_VERSION, then to the built-in default.
    #[arg(long)]
    pub tag: Option<String>,

    /// Directory receiving the executable.
    #[arg(long, default_value = "bin")]
    pub dest: PathBuf,

    /// Directory holding downloaded archives.
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Re-download and reinstall even if the executable or archive exists.
    #[arg(long)]
    pub force: bool,

    /// Target triple to install instead of the host's
    /// (e.g., "aarch64-apple-darwin").
    #[arg(long)]
    pub target: Option<String>,

    /// Expected SHA256 of the release archive.
    #[arg(long)]
    pub sha256: Option<String>,

    /// Maximum number of download attempts.
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,

    /// Temporary directory to remove after installing. May be repeated.
    #[arg(long, value_name = "DIR")]
    pub cleanup: Vec<PathBuf>,
}

/// Executes the install command.
///
/// # Errors
///
/// Returns an error if the request cannot be resolved or the install fails.
pub async fn execute(args: &InstallArgs) -> Result<()> {
    let request = InstallRequest::from_args(args)?;
    install(&request).await?;
    Ok(())
}

/// Installs ripgrep as described by `request` and returns the executable path.
///
/// # Process
///
/// 1. Return early if the executable exists and no reinstall is forced
/// 2. Fetch the release archive into the cache, with retries
/// 3. Extract into a staging directory inside the destination
/// 4. Move the executable into place and mark it executable
/// 5. Remove the staging directory and any requested temporary directories
///
/// A failed install never leaves a new executable at the destination. When
/// extraction fails, the cached archive is deleted so the next run downloads
/// it again.
///
/// # Errors
///
/// Returns the first unrecoverable error of any step.
pub async fn install(request: &InstallRequest) -> Result<PathBuf> {
    let binary = request.binary_path();

    if binary.is_file() && !request.force_redownload {
        tracing::info!("ripgrep is already installed at {}", binary.display());
        cleanup_install_dirs(&request.cleanup_dirs);
        return Ok(binary);
    }

    tracing::info!(
        "Installing ripgrep {} for {}...",
        request.release_tag,
        request.target
    );

    let trusted = Url::parse(request.api_server.trim()).map_err(|e| {
        RgFetchError::invalid_request(format!("invalid API server {}: {e}", request.api_server))
    })?;
    let downloader = Downloader::new(trusted, request.auth_token.clone(), &request.proxy)?;

    let asset = request
        .retry
        .run(|_| fetch(request, &downloader))
        .await?;
    if !asset.from_cache {
        tracing::debug!("Cached {} for later runs", asset.path.display());
    }

    let staging = paths::staging_dir(&request.destination_dir);
    let result = unpack(&asset.path, &staging, &binary);
    if let Err(e) = std::fs::remove_dir_all(&staging)
        && e.kind() != std::io::ErrorKind::NotFound
    {
        tracing::warn!("Could not remove {}: {e}", staging.display());
    }

    if let Err(e) = result {
        if matches!(
            e.downcast_ref::<RgFetchError>(),
            Some(RgFetchError::Extraction { .. } | RgFetchError::BinaryNotFound { .. })
        ) {
            invalidate_cache_file(&asset.path);
        }
        return Err(e);
    }

    cleanup_install_dirs(&request.cleanup_dirs);
    tracing::info!("ripgrep installed at {}", binary.display());
    Ok(binary)
}

/// Extracts `archive_path` into `staging` and moves the executable to `binary`.
fn unpack(archive_path: &Path, staging: &Path, binary: &Path) -> Result<()> {
    if staging.exists() {
        std::fs::remove_dir_all(staging)
            .with_context(|| format!("Failed to remove stale {}", staging.display()))?;
    }

    tracing::info!("Extracting {}...", archive_path.display());
    let extracted = archive::extract(archive_path, staging)?;
    tracing::debug!(
        "Found {} (executable: {})",
        extracted.path.display(),
        extracted.executable
    );

    if binary.exists() {
        std::fs::remove_file(binary)
            .with_context(|| format!("Failed to replace {}", binary.display()))?;
    }
    std::fs::rename(&extracted.path, binary).with_context(|| {
        format!(
            "Failed to move {} to {}",
            extracted.path.display(),
            binary.display()
        )
    })?;

    set_executable_permissions(binary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prebuilt::platform::Target;
    use crate::prebuilt::retry::RetryPolicy;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use httpmock::prelude::*;
    use serde_json::json;

    const TAG: &str = "v13.0.0-13";
    const ASSET: &str = "ripgrep-v13.0.0-13-x86_64-unknown-linux-musl.tar.gz";

    fn temp_test_dir(name: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("rgfetch_test_{}_{}", name, rand::random::<u64>()));
        std::fs::create_dir_all(&dir).expect("Should create temp dir");
        dir
    }

    fn tar_gz(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            builder
                .append_data(&mut header, name, *data)
                .expect("Should append entry");
        }
        builder
            .into_inner()
            .expect("Should finish tar")
            .finish()
            .expect("Should finish gzip")
    }

    fn request(root: &Path, api_server: &str) -> InstallRequest {
        let target = Target::from_triple("x86_64-unknown-linux-musl").unwrap();
        let mut request =
            InstallRequest::new(TAG, target, root.join("bin"), root.join("cache")).unwrap();
        request.api_server = api_server.to_string();
        request.auth_token = Some("secret".to_string());
        request.retry = RetryPolicy::no_retry();
        request
    }

    #[tokio::test]
    async fn already_installed_skips_network() {
        let api = MockServer::start_async().await;
        let any = api
            .mock_async(|when, then| {
                when.path_includes("/");
                then.status(500);
            })
            .await;

        let root = temp_test_dir("install_present");
        let mut request = request(&root, &api.base_url());
        let leftover = root.join("_node_modules");
        std::fs::create_dir_all(&leftover).unwrap();
        request.cleanup_dirs = vec![leftover.clone()];
        std::fs::create_dir_all(&request.destination_dir).unwrap();
        std::fs::write(request.binary_path(), b"existing").unwrap();

        let path = install(&request).await.expect("Should succeed");

        assert_eq!(path, request.binary_path());
        assert_eq!(std::fs::read(&path).unwrap(), b"existing");
        assert!(!leftover.exists());
        any.assert_calls_async(0).await;
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn installs_through_redirect_to_asset_host() {
        let api = MockServer::start_async().await;
        let cdn = MockServer::start_async().await;

        let archive = tar_gz(&[("rg", b"#!/bin/sh\necho ripgrep\n".as_slice())]);
        let cdn_mock = cdn
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/download/rg.tar.gz")
                    .header_missing("authorization");
                then.status(200).body(archive.clone());
            })
            .await;
        let asset_mock = api
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/assets/1")
                    .header("authorization", "Bearer secret");
                then.status(302)
                    .header("location", cdn.url("/download/rg.tar.gz"));
            })
            .await;
        let metadata = api
            .mock_async(|when, then| {
                when.method(GET)
                    .path(format!("/repos/microsoft/ripgrep-prebuilt/releases/tags/{TAG}"));
                then.status(200).json_body(json!({
                    "tag_name": TAG,
                    "assets": [{"name": ASSET, "url": api.url("/assets/1")}]
                }));
            })
            .await;

        let root = temp_test_dir("install_e2e");
        let request = request(&root, &api.base_url());

        let path = install(&request).await.expect("Should install");

        metadata.assert_async().await;
        asset_mock.assert_async().await;
        cdn_mock.assert_async().await;
        assert_eq!(path, root.join("bin").join("rg"));
        assert_eq!(std::fs::read(&path).unwrap(), b"#!/bin/sh\necho ripgrep\n");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }

        let cached: Vec<_> = std::fs::read_dir(&request.cache_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(cached, vec![std::ffi::OsString::from(ASSET)]);
        assert!(!paths::staging_dir(&request.destination_dir).exists());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn archive_without_binary_is_not_installed_and_cache_is_dropped() {
        let mirror = MockServer::start_async().await;
        let archive = tar_gz(&[("README.md", b"docs".as_slice())]);
        mirror
            .mock_async(|when, then| {
                when.method(GET).path(format!("/{ASSET}"));
                then.status(200).body(archive.clone());
            })
            .await;

        let root = temp_test_dir("install_no_binary");
        let mut request = request(&root, &mirror.base_url());
        request.mirror_base_url = Some(mirror.base_url());

        let err = install(&request).await.expect_err("Should fail");

        assert!(matches!(
            err.downcast_ref::<RgFetchError>(),
            Some(RgFetchError::BinaryNotFound { .. })
        ));
        assert!(!request.binary_path().exists());
        assert!(!request.cache_path().exists());
        assert!(!paths::staging_dir(&request.destination_dir).exists());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn corrupt_cached_archive_is_deleted() {
        let root = temp_test_dir("install_corrupt");
        let request = request(&root, "http://127.0.0.1:9");
        std::fs::create_dir_all(&request.cache_dir).unwrap();
        std::fs::write(request.cache_path(), b"not a gzip stream").unwrap();

        let err = install(&request).await.expect_err("Should fail");

        assert!(matches!(
            err.downcast_ref::<RgFetchError>(),
            Some(RgFetchError::Extraction { .. })
        ));
        assert!(!request.cache_path().exists());
        assert!(!request.binary_path().exists());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinked_binary_in_archive_is_not_installed() {
        use std::os::unix::fs::PermissionsExt;

        let root = temp_test_dir("install_symlink");
        let outside = root.join("outside.txt");
        std::fs::write(&outside, b"not ripgrep").unwrap();
        std::fs::set_permissions(&outside, std::fs::Permissions::from_mode(0o600)).unwrap();

        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Symlink);
        header.set_size(0);
        header.set_mode(0o777);
        builder
            .append_link(&mut header, "rg", &outside)
            .expect("Should append link");
        let archive = builder.into_inner().unwrap().finish().unwrap();

        let mirror = MockServer::start_async().await;
        mirror
            .mock_async(|when, then| {
                when.method(GET).path(format!("/{ASSET}"));
                then.status(200).body(archive.clone());
            })
            .await;

        let mut request = request(&root, &mirror.base_url());
        request.mirror_base_url = Some(mirror.base_url());

        let err = install(&request).await.expect_err("Should fail");

        assert!(matches!(
            err.downcast_ref::<RgFetchError>(),
            Some(RgFetchError::Extraction { .. })
        ));
        assert!(std::fs::symlink_metadata(request.binary_path()).is_err());
        assert!(!request.cache_path().exists());
        let mode = std::fs::metadata(&outside).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn force_replaces_existing_binary() {
        let mirror = MockServer::start_async().await;
        let archive = tar_gz(&[("rg", b"new".as_slice())]);
        let mirror_mock = mirror
            .mock_async(|when, then| {
                when.method(GET).path(format!("/{ASSET}"));
                then.status(200).body(archive.clone());
            })
            .await;

        let root = temp_test_dir("install_force");
        let mut request = request(&root, &mirror.base_url());
        request.mirror_base_url = Some(mirror.base_url());
        request.force_redownload = true;
        std::fs::create_dir_all(&request.destination_dir).unwrap();
        std::fs::write(request.binary_path(), b"old").unwrap();

        install(&request).await.expect("Should reinstall");

        mirror_mock.assert_async().await;
        assert_eq!(std::fs::read(request.binary_path()).unwrap(), b"new");
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn network_failure_leaves_no_binary() {
        let api = MockServer::start_async().await;
        api.mock_async(|when, then| {
            when.path_includes("/");
            then.status(503);
        })
        .await;

        let root = temp_test_dir("install_503");
        let request = request(&root, &api.base_url());

        let err = install(&request).await.expect_err("Should fail");

        assert!(matches!(
            err.downcast_ref::<RgFetchError>(),
            Some(RgFetchError::HttpStatus { status: 503, .. })
        ));
        assert!(!request.binary_path().exists());
        let _ = std::fs::remove_dir_all(&root);
    }
}
