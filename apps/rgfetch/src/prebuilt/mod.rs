//! Prebuilt ripgrep management for the rgfetch CLI.
//!
//! This module provides functionality for fetching a prebuilt ripgrep release
//! archive, caching it, and unpacking the executable.
//!
//! ## Module Structure
//!
//! - [`platform`] - OS and architecture to target triple resolution
//! - [`release`] - Release metadata lookup
//! - [`proxy`] - Proxy routing from environment variables
//! - [`download`] - HTTP download with manual redirect handling
//! - [`retry`] - Retry with exponential backoff
//! - [`fetch`] - Cache-aware asset fetching
//! - [`archive`] - ZIP and tar.gz extraction and executable probing
//! - [`verify`] - SHA256 checksum verification
//! - [`paths`] - Cache and destination layout, cleanup

pub mod archive;
pub mod download;
pub mod fetch;
pub mod paths;
pub mod platform;
pub mod proxy;
pub mod release;
pub mod retry;
pub mod verify;

pub use archive::set_executable_permissions;
pub use download::Downloader;
pub use fetch::fetch;
pub use platform::Target;
