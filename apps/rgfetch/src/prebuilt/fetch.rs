//! Asset fetching with a local cache.
//!
//! A completed archive in the cache directory is reused without any network
//! traffic. Otherwise the asset is downloaded from the mirror when one is
//! configured, or located through the release API and downloaded from the URL
//! it reports.

use std::path::PathBuf;

use anyhow::Result;

use super::download::Downloader;
use super::paths::{self, invalidate_cache_file};
use super::release::resolve_asset_url;
use super::verify::verify_checksum;
use crate::config::InstallRequest;

/// A complete release archive in the cache directory.
///
/// Downloads are streamed to a `.part` file and only renamed to the cache
/// path once complete, so a `CachedAsset` never refers to a partial file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedAsset {
    /// Location of the archive.
    pub path: PathBuf,
    /// Whether the archive was already cached before this run.
    pub from_cache: bool,
}

/// Returns the download URL of the asset inside a mirror.
#[must_use]
pub fn mirror_url(mirror_base: &str, asset_name: &str) -> String {
    let base = mirror_base.trim().trim_end_matches('/');
    format!("{base}/{asset_name}")
}

/// Ensures the release archive for `request` is in the cache directory.
///
/// When `force_redownload` is unset and the archive exists, it is returned
/// as-is. When it is set, any existing archive is deleted first. A cached
/// archive that does not match the expected SHA-256 is discarded and
/// downloaded again.
///
/// # Errors
///
/// Returns network, status and metadata errors from the download, or
/// [`crate::errors::RgFetchError::ChecksumMismatch`] when a fresh download
/// does not match the expected digest. The cache file is removed in the
/// latter case.
pub async fn fetch(request: &InstallRequest, downloader: &Downloader) -> Result<CachedAsset> {
    let asset_name = request.asset_name();
    let cache_path = request.cache_path();

    if !request.force_redownload && cache_path.is_file() {
        match &request.expected_sha256 {
            Some(expected) => match verify_checksum(&cache_path, expected) {
                Ok(()) => return Ok(cache_hit(cache_path)),
                Err(e) => {
                    tracing::warn!("Cached {asset_name} is unusable: {e:#}");
                    invalidate_cache_file(&cache_path);
                }
            },
            None => return Ok(cache_hit(cache_path)),
        }
    }

    if request.force_redownload {
        invalidate_cache_file(&cache_path);
    }
    paths::ensure_dir(&request.cache_dir)?;

    let url = match &request.mirror_base_url {
        Some(mirror) => {
            let url = mirror_url(mirror, &asset_name);
            tracing::info!("Downloading {asset_name} from mirror");
            url
        }
        None => {
            resolve_asset_url(
                downloader,
                &request.api_server,
                &request.release_tag,
                &asset_name,
            )
            .await?
        }
    };

    tracing::info!("Downloading from {url}");
    let written = downloader.download_to_file(&url, &cache_path).await?;
    tracing::info!("Downloaded {asset_name} ({written} bytes)");

    if let Some(expected) = &request.expected_sha256
        && let Err(e) = verify_checksum(&cache_path, expected)
    {
        invalidate_cache_file(&cache_path);
        return Err(e);
    }

    Ok(CachedAsset {
        path: cache_path,
        from_cache: false,
    })
}

fn cache_hit(path: PathBuf) -> CachedAsset {
    tracing::info!("Using cached download {}", path.display());
    CachedAsset {
        path,
        from_cache: true,
    }
}
