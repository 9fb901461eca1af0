//! Error types for the rgfetch CLI.
//!
//! This module defines the `RgFetchError` enum which names every failure the
//! installer distinguishes. Operations return `anyhow::Result` and raise these
//! typed errors internally; callers that need to classify a failure (the retry
//! policy, the exit code mapping) recover them with `downcast_ref`.

use std::path::PathBuf;
use thiserror::Error;

/// Consolidated error type for rgfetch operations.
#[derive(Debug, Error)]
pub enum RgFetchError {
    /// The host OS is not one of the supported families.
    #[error("unsupported platform: {os} ({arch})")]
    UnsupportedPlatform {
        /// The OS name as reported or overridden.
        os: String,
        /// The architecture name as reported or overridden.
        arch: String,
    },

    /// A connection could not be established or the body stream broke.
    #[error("network error: {message}")]
    Network {
        /// Description of the failed operation.
        message: String,
        /// The underlying transport error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The server answered with a status other than 200 or a redirect.
    #[error("HTTP error {status}: {url}")]
    HttpStatus {
        /// The response status code.
        status: u16,
        /// The URL that produced the status.
        url: String,
    },

    /// Release metadata did not have the expected shape.
    #[error("malformed response from {url}: {message}")]
    MalformedResponse {
        /// The URL whose response was malformed.
        url: String,
        /// What was wrong with it.
        message: String,
    },

    /// The release exists but carries no asset with the requested name.
    #[error("no asset named {asset} in release {tag}")]
    AssetNotFound {
        /// The asset file name that was looked up.
        asset: String,
        /// The release tag that was searched.
        tag: String,
    },

    /// The archive could not be unpacked.
    #[error("failed to extract {}: {message}", archive.display())]
    Extraction {
        /// The archive that failed to extract.
        archive: PathBuf,
        /// Description of the extraction failure.
        message: String,
    },

    /// The archive unpacked cleanly but did not contain `rg` or `rg.exe`.
    #[error("expected rg or rg.exe in {}, found neither", dir.display())]
    BinaryNotFound {
        /// The directory that was searched.
        dir: PathBuf,
    },

    /// The cached archive does not match the configured digest.
    #[error("checksum mismatch for {}: expected {expected}, got {actual}", path.display())]
    ChecksumMismatch {
        /// The file that was hashed.
        path: PathBuf,
        /// The configured digest.
        expected: String,
        /// The computed digest.
        actual: String,
    },

    /// The install request is inconsistent.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Description of what was invalid.
        message: String,
    },

    /// Error reading or writing files.
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O operation that failed.
        message: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl RgFetchError {
    /// Creates a new `UnsupportedPlatform` error.
    #[must_use]
    pub fn unsupported_platform(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self::UnsupportedPlatform {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Creates a new `Network` error wrapping a transport error.
    #[must_use]
    pub fn network(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new `HttpStatus` error.
    #[must_use]
    pub fn http_status(status: u16, url: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
        }
    }

    /// Creates a new `MalformedResponse` error.
    #[must_use]
    pub fn malformed_response(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a new `AssetNotFound` error.
    #[must_use]
    pub fn asset_not_found(asset: impl Into<String>, tag: impl Into<String>) -> Self {
        Self::AssetNotFound {
            asset: asset.into(),
            tag: tag.into(),
        }
    }

    /// Creates a new `Extraction` error.
    #[must_use]
    pub fn extraction(archive: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Extraction {
            archive: archive.into(),
            message: message.into(),
        }
    }

    /// Creates a new `BinaryNotFound` error.
    #[must_use]
    pub fn binary_not_found(dir: impl Into<PathBuf>) -> Self {
        Self::BinaryNotFound { dir: dir.into() }
    }

    /// Creates a new `ChecksumMismatch` error.
    #[must_use]
    pub fn checksum_mismatch(
        path: impl Into<PathBuf>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::ChecksumMismatch {
            path: path.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a new `Io` error from an I/O error with context.
    #[must_use]
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Returns whether repeating the failed operation may succeed.
    ///
    /// Only transport failures and unexpected HTTP statuses qualify. Metadata,
    /// extraction and checksum failures reproduce on every attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::HttpStatus { .. })
    }
}

/// Returns whether an `anyhow` error wraps a retryable `RgFetchError`.
///
/// Errors that carry no `RgFetchError` are treated as fatal.
#[must_use]
pub fn is_retryable(err: &anyhow::Error) -> bool {
    err.downcast_ref::<RgFetchError>()
        .is_some_and(RgFetchError::is_retryable)
}
