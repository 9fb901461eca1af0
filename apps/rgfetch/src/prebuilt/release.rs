//! Release metadata lookup.
//!
//! Asset download URLs are resolved through the release-listing API of the
//! release host. The metadata for a tag is a JSON object with an `assets`
//! array; the asset whose `name` matches exactly is selected and its API `url`
//! is downloaded with `Accept: application/octet-stream`.
//!
//! ```json
//! {
//!   "tag_name": "v13.0.0-13",
//!   "assets": [
//!     {
//!       "name": "ripgrep-v13.0.0-13-x86_64-unknown-linux-musl.tar.gz",
//!       "url": "https://api.github.com/repos/microsoft/ripgrep-prebuilt/releases/assets/1",
//!       "size": 1843542
//!     }
//!   ]
//! }
//! ```

use anyhow::Result;
use serde::Deserialize;

use super::download::{ACCEPT_JSON, Downloader};
use crate::errors::RgFetchError;

/// Repository publishing the prebuilt archives.
pub const RELEASE_REPO: &str = "microsoft/ripgrep-prebuilt";

/// Default release API server.
pub const DEFAULT_API_SERVER: &str = "https://api.github.com";

/// A downloadable file attached to a release.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ReleaseAsset {
    /// File name of the asset.
    pub name: String,
    /// API URL that serves the asset bytes.
    pub url: String,
    /// Size in bytes, when reported.
    #[serde(default)]
    pub size: Option<u64>,
}

/// Release metadata for one tag.
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    /// Attached assets. Absent in error payloads.
    #[serde(default)]
    pub assets: Option<Vec<ReleaseAsset>>,
}

/// Returns the metadata URL for a release tag.
#[must_use]
pub fn release_url(api_server: &str, tag: &str) -> String {
    let server = api_server.trim().trim_end_matches('/');
    format!("{server}/repos/{RELEASE_REPO}/releases/tags/{tag}")
}

/// Parses a release metadata body and returns its assets.
///
/// # Errors
///
/// Returns [`RgFetchError::MalformedResponse`] if the body is not JSON or has
/// no `assets` array.
pub fn parse_assets(url: &str, body: &[u8]) -> Result<Vec<ReleaseAsset>> {
    let release: Release = serde_json::from_slice(body)
        .map_err(|e| RgFetchError::malformed_response(url, format!("invalid JSON: {e}")))?;
    let assets = release.assets.ok_or_else(|| {
        RgFetchError::malformed_response(url, "release metadata has no assets list")
    })?;
    Ok(assets)
}

/// Finds the asset with exactly the given name.
///
/// # Errors
///
/// Returns [`RgFetchError::AssetNotFound`] when no asset matches.
pub fn find_asset<'a>(
    assets: &'a [ReleaseAsset],
    name: &str,
    tag: &str,
) -> Result<&'a ReleaseAsset> {
    assets
        .iter()
        .find(|asset| asset.name == name)
        .ok_or_else(|| RgFetchError::asset_not_found(name, tag).into())
}

/// Queries the release API and returns the download URL of `asset_name`.
///
/// # Errors
///
/// Returns network and status errors from the metadata request, or the
/// errors of [`parse_assets`] and [`find_asset`].
pub async fn resolve_asset_url(
    downloader: &Downloader,
    api_server: &str,
    tag: &str,
    asset_name: &str,
) -> Result<String> {
    let url = release_url(api_server, tag);
    tracing::info!("Finding asset {asset_name} in release {tag}");
    let body = downloader.get_bytes(&url, ACCEPT_JSON).await?;
    let assets = parse_assets(&url, &body)?;
    let asset = find_asset(&assets, asset_name, tag)?;
    if let Some(size) = asset.size {
        tracing::debug!("Asset {} is {size} bytes", asset.name);
    }
    Ok(asset.url.clone())
}
