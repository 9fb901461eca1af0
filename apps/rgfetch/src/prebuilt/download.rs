//! HTTP download functionality for rgfetch.
//!
//! This module wraps a single `reqwest` client with automatic redirects
//! disabled. Redirects are followed by hand so the authorization header can be
//! decided per hop: the token is only ever sent to the trusted release host,
//! never to a mirror or CDN a redirect points at.
//!
//! ## Features
//!
//! - Manual redirect following (301, 302, 303, 307, 308), at most 10 hops
//! - Per-hop authorization scoped to the trusted origin
//! - Streaming downloads into a `.part` file, renamed on success
//! - Partial files removed on every failure path
//! - Proxy routing through [`ProxySettings`]

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderValue, LOCATION};
use reqwest::{Response, StatusCode, Url};
use tokio::io::AsyncWriteExt;

use super::proxy::ProxySettings;
use crate::errors::RgFetchError;

/// User-Agent header for HTTP requests.
const USER_AGENT: &str = concat!("rgfetch/", env!("CARGO_PKG_VERSION"));

/// Request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Maximum number of redirects followed for one request.
const MAX_REDIRECTS: usize = 10;

/// Minimum interval between progress log lines in milliseconds.
const PROGRESS_INTERVAL_MS: u128 = 250;

/// Accept header for raw asset bytes.
pub const ACCEPT_OCTET_STREAM: &str = "application/octet-stream";

/// Accept header for release metadata.
pub const ACCEPT_JSON: &str = "application/vnd.github+json";

/// HTTP client that scopes credentials to one trusted origin.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: reqwest::Client,
    trusted: Url,
    token: Option<String>,
}

impl Downloader {
    /// Creates a downloader.
    ///
    /// `trusted` is the release API base URL. Requests whose scheme, host and
    /// port match it carry `Authorization: Bearer <token>` when a token is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(trusted: Url, token: Option<String>, proxy: &ProxySettings) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy();

        if !proxy.is_empty() {
            let settings = proxy.clone();
            builder = builder.proxy(reqwest::Proxy::custom(move |url| settings.proxy_for(url)));
        }

        let client = builder.build().context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            trusted,
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    /// Returns the authorization header value to send to `url`, if any.
    #[must_use]
    pub fn authorization_for(&self, url: &Url) -> Option<String> {
        let token = self.token.as_deref()?;
        same_origin(url, &self.trusted).then(|| format!("Bearer {token}"))
    }

    /// Issues a GET request and follows redirects until a final response.
    ///
    /// Bodies of redirect responses are discarded.
    ///
    /// # Errors
    ///
    /// - [`RgFetchError::Network`] if a connection fails
    /// - [`RgFetchError::HttpStatus`] if the final status is not 200
    /// - [`RgFetchError::MalformedResponse`] if a redirect has no usable
    ///   `Location` or the redirect limit is exceeded
    pub async fn get(&self, url: &str, accept: &str) -> Result<Response> {
        let mut current = Url::parse(url)
            .map_err(|e| RgFetchError::invalid_request(format!("invalid URL {url}: {e}")))?;

        for _ in 0..=MAX_REDIRECTS {
            let mut request = self
                .client
                .get(current.clone())
                .header(ACCEPT, HeaderValue::from_str(accept).context("Invalid Accept header")?);
            if let Some(auth) = self.authorization_for(&current) {
                request = request.header(AUTHORIZATION, auth);
            }

            tracing::debug!("GET {current}");
            let response = request
                .send()
                .await
                .map_err(|e| RgFetchError::network(format!("Failed to connect to {current}"), e))?;

            let status = response.status();
            if is_redirect(status) {
                let next = redirect_target(&current, &response)?;
                tracing::debug!("Following redirect ({}) to {next}", status.as_u16());
                drop(response);
                current = next;
                continue;
            }

            if status != StatusCode::OK {
                return Err(RgFetchError::http_status(status.as_u16(), current.as_str()).into());
            }
            return Ok(response);
        }

        Err(
            RgFetchError::malformed_response(url, format!("more than {MAX_REDIRECTS} redirects"))
                .into(),
        )
    }

    /// Fetches a small body completely into memory.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Downloader::get`], or a network error if the
    /// body cannot be read.
    pub async fn get_bytes(&self, url: &str, accept: &str) -> Result<Vec<u8>> {
        let response = self.get(url, accept).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RgFetchError::network(format!("Failed to read response from {url}"), e))?;
        Ok(bytes.to_vec())
    }

    /// Streams `url` into `dest`.
    ///
    /// The body is written to `dest` with a `.part` suffix and renamed once
    /// complete. On any failure the partial file is removed and the error is
    /// returned; `dest` itself is left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the stream breaks, or the file
    /// cannot be written.
    pub async fn download_to_file(&self, url: &str, dest: &Path) -> Result<u64> {
        let part_path = part_path(dest);

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                RgFetchError::io(format!("Failed to create directory: {}", parent.display()), e)
            })?;
        }

        match self.stream_to(url, &part_path).await {
            Ok(written) => {
                tokio::fs::rename(&part_path, dest).await.map_err(|e| {
                    RgFetchError::io(
                        format!(
                            "Failed to rename {} to {}",
                            part_path.display(),
                            dest.display()
                        ),
                        e,
                    )
                })?;
                Ok(written)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&part_path).await;
                Err(e)
            }
        }
    }

    async fn stream_to(&self, url: &str, dest: &Path) -> Result<u64> {
        let response = self.get(url, ACCEPT_OCTET_STREAM).await?;
        let total_size = response.content_length();

        let mut file = tokio::fs::File::create(dest).await.map_err(|e| {
            RgFetchError::io(format!("Failed to create file: {}", dest.display()), e)
        })?;

        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        let start_time = Instant::now();
        let mut last_update = Instant::now();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| RgFetchError::network(format!("Failed to read chunk from {url}"), e))?;
            file.write_all(&chunk).await.map_err(|e| {
                RgFetchError::io(format!("Failed to write to {}", dest.display()), e)
            })?;
            downloaded += chunk.len() as u64;

            if last_update.elapsed().as_millis() >= PROGRESS_INTERVAL_MS {
                log_progress(downloaded, total_size, start_time.elapsed().as_secs_f64());
                last_update = Instant::now();
            }
        }

        file.flush()
            .await
            .map_err(|e| RgFetchError::io(format!("Failed to flush {}", dest.display()), e))?;

        if let Some(total) = total_size
            && downloaded != total
        {
            return Err(RgFetchError::network(
                format!("Download of {url} ended after {downloaded} of {total} bytes"),
                std::io::Error::from(std::io::ErrorKind::UnexpectedEof),
            )
            .into());
        }

        log_progress(downloaded, total_size, start_time.elapsed().as_secs_f64());
        Ok(downloaded)
    }
}

/// Returns whether two URLs share scheme, host and port.
#[must_use]
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str().map(str::to_ascii_lowercase) == b.host_str().map(str::to_ascii_lowercase)
        && a.port_or_known_default() == b.port_or_known_default()
}

/// Returns the temporary path a download is streamed to.
#[must_use]
pub fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

fn redirect_target(current: &Url, response: &Response) -> Result<Url> {
    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            RgFetchError::malformed_response(current.as_str(), "redirect without Location header")
        })?;
    let next = current.join(location).map_err(|e| {
        RgFetchError::malformed_response(
            current.as_str(),
            format!("invalid redirect target {location}: {e}"),
        )
    })?;
    Ok(next)
}

#[allow(clippy::cast_precision_loss)]
fn log_progress(downloaded: u64, total: Option<u64>, elapsed_secs: f64) {
    let speed = if elapsed_secs > 0.0 {
        downloaded as f64 / elapsed_secs
    } else {
        0.0
    };
    match total {
        Some(total) if total > 0 => tracing::debug!(
            "{}/{} ({}%) {}",
            format_bytes(downloaded),
            format_bytes(total),
            downloaded * 100 / total,
            format_speed(speed)
        ),
        _ => tracing::debug!("{} {}", format_bytes(downloaded), format_speed(speed)),
    }
}

/// Formats bytes into a human-readable string (KB, MB, GB).
fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    #[allow(clippy::cast_precision_loss)]
    let bytes_f = bytes as f64;

    if bytes_f >= GB {
        format!("{:.2} GB", bytes_f / GB)
    } else if bytes_f >= MB {
        format!("{:.2} MB", bytes_f / MB)
    } else if bytes_f >= KB {
        format!("{:.2} KB", bytes_f / KB)
    } else {
        format!("{bytes} B")
    }
}

/// Formats speed (bytes/sec) into a human-readable string.
fn format_speed(speed: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;

    if speed >= MB {
        format!("{:.2} MB/s", speed / MB)
    } else if speed >= KB {
        format!("{:.2} KB/s", speed / KB)
    } else {
        format!("{speed:.0} B/s")
    }
}
