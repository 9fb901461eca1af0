//! Checksum verification for cached archives.
//!
//! Cache hits are keyed on file existence alone. When an expected SHA-256
//! digest is configured, the cached archive is hashed before extraction so a
//! truncated or tampered file is caught even across crashed runs.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use crate::errors::RgFetchError;

/// Verifies that a file matches the expected SHA256 checksum.
///
/// The comparison ignores case and surrounding whitespace in `expected`.
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be opened or read
/// - The computed checksum does not match ([`RgFetchError::ChecksumMismatch`])
pub fn verify_checksum(file_path: &Path, expected: &str) -> Result<()> {
    let computed = compute_sha256(file_path)?;
    let expected = expected.trim().to_ascii_lowercase();

    if computed != expected {
        return Err(RgFetchError::checksum_mismatch(file_path, expected, computed).into());
    }

    Ok(())
}

/// Computes the SHA256 hash of a file as a lowercase hex string.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn compute_sha256(file_path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(file_path)
        .with_context(|| format!("Failed to open file for checksum: {}", file_path.display()))?;

    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer).with_context(|| {
            format!("Failed to read file for checksum: {}", file_path.display())
        })?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}
