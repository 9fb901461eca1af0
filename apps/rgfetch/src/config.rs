//! Install configuration for the rgfetch CLI.
//!
//! Command-line arguments and environment variables are resolved exactly once
//! into an immutable [`InstallRequest`]. Nothing downstream reads the
//! environment again; every component receives the request (or a part of it)
//! explicitly.
//!
//! ## Environment Variables
//!
//! - `RIPGREP_VERSION`: release tag, when `--tag` is not given
//! - `npm_config_arch`: architecture override, when `--target` is not given
//! - `GITHUB_TOKEN`: token sent to the release API host only
//! - `RIPGREP_MIRROR`: mirror base URL; skips the release API entirely
//! - `RGFETCH_API_SERVER`: release API base URL (default: `https://api.github.com`)
//! - `RGFETCH_CACHE_DIR`: cache directory, when `--cache-dir` is not given
//! - `RIPGREP_SHA256`: expected archive digest, when `--sha256` is not given
//! - proxy variables, see [`crate::prebuilt::proxy`]

use std::path::PathBuf;

use anyhow::Result;

use crate::commands::install::InstallArgs;
use crate::errors::RgFetchError;
use crate::prebuilt::paths::{self, CACHE_DIR_ENV};
use crate::prebuilt::platform::{ARCH_OVERRIDE_ENV, Target};
use crate::prebuilt::proxy::ProxySettings;
use crate::prebuilt::release::DEFAULT_API_SERVER;
use crate::prebuilt::retry::RetryPolicy;

/// Environment variable overriding the release tag.
pub const VERSION_ENV: &str = "RIPGREP_VERSION";

/// Environment variable holding the release host token.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Environment variable holding the mirror base URL.
pub const MIRROR_ENV: &str = "RIPGREP_MIRROR";

/// Environment variable overriding the release API server.
pub const API_SERVER_ENV: &str = "RGFETCH_API_SERVER";

/// Environment variable holding the expected archive digest.
pub const SHA256_ENV: &str = "RIPGREP_SHA256";

/// Release installed when no tag is configured.
pub const DEFAULT_RELEASE_TAG: &str = "v13.0.0-13";

/// Reads an environment variable, trimmed. Empty values count as unset.
#[must_use]
pub fn env_var(key: &str) -> Option<String> {
    normalize(std::env::var(key).ok())
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Everything one install run needs.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    /// Release tag, e.g. `v13.0.0-13`.
    pub release_tag: String,
    /// Target whose asset is installed.
    pub target: Target,
    /// Directory receiving the executable.
    pub destination_dir: PathBuf,
    /// Directory holding downloaded archives.
    pub cache_dir: PathBuf,
    /// Token for the release API host.
    pub auth_token: Option<String>,
    /// Mirror base URL; the asset is fetched from `<mirror>/<asset name>`.
    pub mirror_base_url: Option<String>,
    /// Ignore both the cache and an existing installation.
    pub force_redownload: bool,
    /// Release API base URL. Its origin is the only one that receives the token.
    pub api_server: String,
    /// Expected SHA-256 of the archive, lowercase hex.
    pub expected_sha256: Option<String>,
    /// Proxy routing captured from the environment.
    pub proxy: ProxySettings,
    /// Retry policy applied around the asset fetch.
    pub retry: RetryPolicy,
    /// Install-time temporary directories removed after a successful run.
    pub cleanup_dirs: Vec<PathBuf>,
}

impl InstallRequest {
    /// Creates a request with defaults for everything but the essentials.
    ///
    /// # Errors
    ///
    /// Returns [`RgFetchError::InvalidRequest`] if the cache and destination
    /// directories coincide.
    pub fn new(
        release_tag: impl Into<String>,
        target: Target,
        destination_dir: PathBuf,
        cache_dir: PathBuf,
    ) -> Result<Self> {
        let request = Self {
            release_tag: release_tag.into(),
            target,
            destination_dir,
            cache_dir,
            auth_token: None,
            mirror_base_url: None,
            force_redownload: false,
            api_server: DEFAULT_API_SERVER.to_string(),
            expected_sha256: None,
            proxy: ProxySettings::default(),
            retry: RetryPolicy::default(),
            cleanup_dirs: Vec::new(),
        };
        request.validate()?;
        Ok(request)
    }

    /// Resolves a request from CLI arguments and the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the target cannot be resolved or the request is
    /// inconsistent.
    pub fn from_args(args: &InstallArgs) -> Result<Self> {
        Self::resolve(args, |key| std::env::var(key).ok())
    }

    /// Resolves a request from CLI arguments and an arbitrary variable lookup.
    ///
    /// Arguments take precedence over environment variables. Empty or
    /// whitespace-only variables are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the target cannot be resolved or the request is
    /// inconsistent.
    pub fn resolve(args: &InstallArgs, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| normalize(lookup(key));

        let target = match &args.target {
            Some(triple) => Target::from_triple(triple)?,
            None => Target::detect(var(ARCH_OVERRIDE_ENV).as_deref())?,
        };

        let release_tag = args
            .tag
            .clone()
            .or_else(|| var(VERSION_ENV))
            .unwrap_or_else(|| DEFAULT_RELEASE_TAG.to_string());

        let cache_dir = args
            .cache_dir
            .clone()
            .or_else(|| var(CACHE_DIR_ENV).map(PathBuf::from))
            .unwrap_or_else(paths::default_cache_dir);

        let mut request = Self::new(release_tag, target, args.dest.clone(), cache_dir)?;
        request.auth_token = var(TOKEN_ENV);
        request.mirror_base_url = var(MIRROR_ENV);
        request.force_redownload = args.force;
        request.api_server = var(API_SERVER_ENV).unwrap_or_else(|| DEFAULT_API_SERVER.to_string());
        request.expected_sha256 = args
            .sha256
            .clone()
            .or_else(|| var(SHA256_ENV))
            .map(|digest| digest.to_ascii_lowercase());
        request.proxy = ProxySettings::from_lookup(&lookup);
        request.retry = RetryPolicy::default().with_max_attempts(args.max_attempts);
        request.cleanup_dirs.clone_from(&args.cleanup);
        Ok(request)
    }

    /// Returns the release asset file name.
    #[must_use]
    pub fn asset_name(&self) -> String {
        self.target.asset_name(&self.release_tag)
    }

    /// Returns the cache path of the release asset.
    #[must_use]
    pub fn cache_path(&self) -> PathBuf {
        self.cache_dir.join(self.asset_name())
    }

    /// Returns the final path of the installed executable.
    #[must_use]
    pub fn binary_path(&self) -> PathBuf {
        paths::binary_path(&self.destination_dir, self.target)
    }

    fn validate(&self) -> Result<()> {
        if self.release_tag.trim().is_empty() {
            return Err(RgFetchError::invalid_request("release tag is empty").into());
        }
        if self.cache_dir == self.destination_dir {
            return Err(RgFetchError::invalid_request(format!(
                "cache directory and destination directory are both {}",
                self.cache_dir.display()
            ))
            .into());
        }
        Ok(())
    }
}
