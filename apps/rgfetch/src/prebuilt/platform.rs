//! Target resolution for prebuilt ripgrep archives.
//!
//! Maps an OS family and CPU architecture to the target triple used in
//! release asset names, together with the archive format published for it.
//! Both Node-style (`win32`, `x64`) and Rust-style (`windows`, `x86_64`)
//! spellings are accepted. Unknown architectures fall back to the 32-bit x86
//! build of the OS; only an unknown OS is an error.
//!
//! ## Supported Targets
//!
//! - macOS: `aarch64-apple-darwin`, `x86_64-apple-darwin`
//! - Windows: `x86_64-pc-windows-msvc`, `aarch64-pc-windows-msvc`, `i686-pc-windows-msvc`
//! - Linux: `x86_64-unknown-linux-musl`, `arm-unknown-linux-gnueabihf`,
//!   `aarch64-unknown-linux-gnu`, `powerpc64le-unknown-linux-gnu`,
//!   `s390x-unknown-linux-gnu`, `i686-unknown-linux-musl`

use std::fmt;

use anyhow::Result;

use crate::errors::RgFetchError;

/// Environment variable that overrides the detected architecture.
pub const ARCH_OVERRIDE_ENV: &str = "npm_config_arch";

/// Archive format of a release asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    /// ZIP archive, published for Windows targets.
    Zip,
    /// Gzip-compressed tarball, published for everything else.
    TarGz,
}

impl ArchiveKind {
    /// Returns the file extension including the leading dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Zip => ".zip",
            Self::TarGz => ".tar.gz",
        }
    }

    /// Detects the archive kind from a file name.
    #[must_use]
    pub fn from_file_name(name: &str) -> Option<Self> {
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }
}

/// A release target: the triple embedded in asset names and its archive format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    triple: &'static str,
    archive: ArchiveKind,
}

/// Every target the release host publishes.
const KNOWN_TARGETS: [Target; 11] = [
    Target::tar_gz("aarch64-apple-darwin"),
    Target::tar_gz("x86_64-apple-darwin"),
    Target::zip("x86_64-pc-windows-msvc"),
    Target::zip("aarch64-pc-windows-msvc"),
    Target::zip("i686-pc-windows-msvc"),
    Target::tar_gz("x86_64-unknown-linux-musl"),
    Target::tar_gz("arm-unknown-linux-gnueabihf"),
    Target::tar_gz("aarch64-unknown-linux-gnu"),
    Target::tar_gz("powerpc64le-unknown-linux-gnu"),
    Target::tar_gz("s390x-unknown-linux-gnu"),
    Target::tar_gz("i686-unknown-linux-musl"),
];

impl Target {
    const fn tar_gz(triple: &'static str) -> Self {
        Self {
            triple,
            archive: ArchiveKind::TarGz,
        }
    }

    const fn zip(triple: &'static str) -> Self {
        Self {
            triple,
            archive: ArchiveKind::Zip,
        }
    }

    /// Resolves the target for an OS family and architecture name.
    ///
    /// # Errors
    ///
    /// Returns [`RgFetchError::UnsupportedPlatform`] when `os` is not darwin,
    /// windows or linux.
    pub fn resolve(os: &str, arch: &str) -> Result<Self> {
        let target = match os {
            "darwin" | "macos" => match arch {
                "arm64" | "aarch64" => Self::tar_gz("aarch64-apple-darwin"),
                _ => Self::tar_gz("x86_64-apple-darwin"),
            },
            "win32" | "windows" => match arch {
                "x64" | "x86_64" => Self::zip("x86_64-pc-windows-msvc"),
                "arm" | "arm64" | "aarch64" => Self::zip("aarch64-pc-windows-msvc"),
                _ => Self::zip("i686-pc-windows-msvc"),
            },
            "linux" => match arch {
                "x64" | "x86_64" => Self::tar_gz("x86_64-unknown-linux-musl"),
                "arm" | "armv7l" => Self::tar_gz("arm-unknown-linux-gnueabihf"),
                "arm64" | "aarch64" => Self::tar_gz("aarch64-unknown-linux-gnu"),
                "ppc64" | "powerpc64" => Self::tar_gz("powerpc64le-unknown-linux-gnu"),
                "s390x" => Self::tar_gz("s390x-unknown-linux-gnu"),
                _ => Self::tar_gz("i686-unknown-linux-musl"),
            },
            _ => return Err(RgFetchError::unsupported_platform(os, arch).into()),
        };
        Ok(target)
    }

    /// Resolves the target of the running host.
    ///
    /// `arch_override` replaces the compile-time architecture when present.
    ///
    /// # Errors
    ///
    /// Returns an error if the host OS is unsupported.
    pub fn detect(arch_override: Option<&str>) -> Result<Self> {
        let arch = arch_override.unwrap_or(std::env::consts::ARCH);
        Self::resolve(std::env::consts::OS, arch)
    }

    /// Looks up a target by its full triple.
    ///
    /// # Errors
    ///
    /// Returns [`RgFetchError::UnsupportedPlatform`] for triples that have no
    /// published asset.
    pub fn from_triple(triple: &str) -> Result<Self> {
        KNOWN_TARGETS
            .iter()
            .copied()
            .find(|t| t.triple == triple)
            .ok_or_else(|| RgFetchError::unsupported_platform(triple, "unknown target").into())
    }

    /// Returns the target triple.
    #[must_use]
    pub fn triple(self) -> &'static str {
        self.triple
    }

    /// Returns the archive format of this target's assets.
    #[must_use]
    pub fn archive(self) -> ArchiveKind {
        self.archive
    }

    /// Returns whether this is a Windows target.
    #[must_use]
    pub fn is_windows(self) -> bool {
        self.triple.contains("-windows-")
    }

    /// Returns the name of the executable inside the archive.
    #[must_use]
    pub fn binary_name(self) -> &'static str {
        if self.is_windows() { "rg.exe" } else { "rg" }
    }

    /// Returns the release asset file name for a tag.
    ///
    /// Example: `ripgrep-v13.0.0-13-x86_64-unknown-linux-musl.tar.gz`
    #[must_use]
    pub fn asset_name(self, tag: &str) -> String {
        format!("ripgrep-{tag}-{}{}", self.triple(), self.archive().extension())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.triple())
    }
}
