//! Archive extraction for prebuilt ripgrep releases.
//!
//! Windows assets are ZIP files, everything else ships as tar.gz. After
//! unpacking, the destination is searched for `rg` or `rg.exe`; an archive that
//! unpacks cleanly but lacks both is reported as
//! [`RgFetchError::BinaryNotFound`].

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use flate2::read::GzDecoder;
use tar::Archive;

use super::platform::ArchiveKind;
use crate::errors::RgFetchError;

/// Executable names searched for after extraction, in order.
const BINARY_NAMES: [&str; 2] = ["rg", "rg.exe"];

/// The executable produced by an extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedBinary {
    /// Location of the executable.
    pub path: PathBuf,
    /// Whether the file is marked executable.
    pub executable: bool,
}

impl ExtractedBinary {
    /// Describes the executable at `path`, reading its permission bits.
    #[must_use]
    pub fn at(path: PathBuf) -> Self {
        let executable = is_executable(&path);
        Self { path, executable }
    }
}

/// Extracts `archive_path` into `dest_dir` and locates the ripgrep executable.
///
/// The archive format is chosen from the file extension. `dest_dir` and its
/// ancestors are created when missing.
///
/// # Errors
///
/// - [`RgFetchError::Extraction`] if the extension is unknown or unpacking fails
/// - [`RgFetchError::BinaryNotFound`] if neither `rg` nor `rg.exe` is present
///   directly inside `dest_dir` afterwards
pub fn extract(archive_path: &Path, dest_dir: &Path) -> Result<ExtractedBinary> {
    let file_name = archive_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let kind = ArchiveKind::from_file_name(&file_name).ok_or_else(|| {
        RgFetchError::extraction(archive_path, format!("unknown archive type: {file_name}"))
    })?;

    let unpacked = match kind {
        ArchiveKind::Zip => extract_zip(archive_path, dest_dir),
        ArchiveKind::TarGz => extract_tar_gz(archive_path, dest_dir),
    };
    unpacked.map_err(|e| RgFetchError::extraction(archive_path, format!("{e:#}")))?;

    find_binary(dest_dir)
}

/// Returns the ripgrep executable directly inside `dir`.
///
/// Only regular files count; a symlink named `rg` is ignored.
///
/// # Errors
///
/// Returns [`RgFetchError::BinaryNotFound`] if neither name exists.
pub fn find_binary(dir: &Path) -> Result<ExtractedBinary> {
    BINARY_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| std::fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_file()))
        .map(ExtractedBinary::at)
        .ok_or_else(|| RgFetchError::binary_not_found(dir).into())
}

/// Extracts a ZIP archive to the destination directory.
///
/// If all archive entries share a common root folder, it is stripped
/// (e.g., `ripgrep-13.0.0/rg.exe` becomes `rg.exe`).
///
/// # Errors
///
/// Returns an error if the archive cannot be read, contains entries that
/// escape the destination or are symlinks, or a file cannot be written.
pub fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let file = std::fs::File::open(archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;

    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read ZIP archive: {}", archive_path.display()))?;

    std::fs::create_dir_all(dest_dir)
        .with_context(|| format!("Failed to create directory: {}", dest_dir.display()))?;

    let strip_prefix = find_common_root_folder(&mut archive);

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to read archive entry {i}"))?;

        // enclosed_name() is None for names that escape the destination
        let entry_path = entry
            .enclosed_name()
            .with_context(|| format!("Refusing to extract unsafe path: {}", entry.name()))?;
        reject_unsafe_path(&entry_path)?;
        if entry.is_symlink() {
            bail!("Refusing to extract symlink: {}", entry_path.display());
        }

        let Some(relative_path) = strip_root(&entry_path, strip_prefix.as_deref()) else {
            continue;
        };
        let output_path = dest_dir.join(&relative_path);

        if entry.is_dir() {
            std::fs::create_dir_all(&output_path).with_context(|| {
                format!("Failed to create directory: {}", output_path.display())
            })?;
        } else {
            if let Some(parent) = output_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }

            let mut outfile = std::fs::File::create(&output_path)
                .with_context(|| format!("Failed to create file: {}", output_path.display()))?;

            std::io::copy(&mut entry, &mut outfile)
                .with_context(|| format!("Failed to extract: {}", output_path.display()))?;
        }
    }

    Ok(())
}

/// Extracts a tar.gz archive to the destination directory.
///
/// Common root folders are stripped the same way as in [`extract_zip`].
/// Unix permission bits stored in the archive are preserved. Only regular
/// files and directories are unpacked; link and device entries are rejected.
///
/// # Errors
///
/// Returns an error if the archive cannot be decompressed or read, contains
/// entries that escape the destination, or a file cannot be written.
pub fn extract_tar_gz(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dest_dir)
        .with_context(|| format!("Failed to create directory: {}", dest_dir.display()))?;

    let strip_prefix = find_common_root_folder_tar(archive_path)?;

    let file = std::fs::File::open(archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;
    let mut archive = Archive::new(GzDecoder::new(file));

    for entry in archive
        .entries()
        .with_context(|| format!("Failed to read tar entries: {}", archive_path.display()))?
    {
        let mut entry = entry
            .with_context(|| format!("Failed to read tar entry: {}", archive_path.display()))?;

        let entry_path = entry
            .path()
            .context("Failed to get entry path")?
            .into_owned();
        reject_unsafe_path(&entry_path)?;

        // links could point outside dest_dir
        let entry_type = entry.header().entry_type();
        if !(entry_type.is_file() || entry_type.is_dir()) {
            bail!(
                "Refusing to extract {entry_type:?} entry: {}",
                entry_path.display()
            );
        }

        let Some(relative_path) = strip_root(&entry_path, strip_prefix.as_deref()) else {
            continue;
        };
        let output_path = dest_dir.join(&relative_path);

        if entry_type.is_dir() {
            std::fs::create_dir_all(&output_path).with_context(|| {
                format!("Failed to create directory: {}", output_path.display())
            })?;
        } else {
            if let Some(parent) = output_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }

            entry
                .unpack(&output_path)
                .with_context(|| format!("Failed to extract: {}", output_path.display()))?;
        }
    }

    Ok(())
}

/// Rejects absolute paths and paths with `..` components.
fn reject_unsafe_path(path: &Path) -> Result<()> {
    if path.is_absolute()
        || path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
    {
        bail!(
            "Refusing to extract path with parent directory or absolute reference: {}",
            path.display()
        );
    }
    Ok(())
}

/// Strips `prefix` from `path`. Returns `None` for the prefix directory itself.
fn strip_root(path: &Path, prefix: Option<&Path>) -> Option<PathBuf> {
    match prefix {
        Some(prefix) => match path.strip_prefix(prefix) {
            Ok(p) if p.as_os_str().is_empty() => None,
            Ok(p) => Some(p.to_path_buf()),
            Err(_) => Some(path.to_path_buf()),
        },
        None => Some(path.to_path_buf()),
    }
}

/// Folds entry paths into a common root folder.
///
/// Returns `Some(root)` only if every path starts with the same component and
/// at least one path is nested below it, so a flat archive containing a
/// single file is never mistaken for a wrapper folder.
fn common_root<I>(paths: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = PathBuf>,
{
    let mut root: Option<PathBuf> = None;
    let mut has_nested_entries = false;

    for path in paths {
        if path.components().count() > 1 {
            has_nested_entries = true;
        }
        let first = PathBuf::from(path.components().next()?.as_os_str());
        match &root {
            None => root = Some(first),
            Some(existing) if existing != &first => return None,
            Some(_) => {}
        }
    }

    root.filter(|_| has_nested_entries)
}

fn find_common_root_folder_tar(archive_path: &Path) -> Result<Option<PathBuf>> {
    let file = std::fs::File::open(archive_path)
        .with_context(|| format!("Failed to open archive: {}", archive_path.display()))?;
    let mut archive = Archive::new(GzDecoder::new(file));

    let mut paths = Vec::new();
    for entry in archive
        .entries()
        .with_context(|| format!("Failed to read tar entries: {}", archive_path.display()))?
    {
        let entry = entry
            .with_context(|| format!("Failed to read tar entry: {}", archive_path.display()))?;
        paths.push(entry.path().context("Failed to get entry path")?.into_owned());
    }

    Ok(common_root(paths))
}

fn find_common_root_folder<R: std::io::Read + std::io::Seek>(
    archive: &mut zip::ZipArchive<R>,
) -> Option<PathBuf> {
    let mut paths = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        paths.push(archive.by_index(i).ok()?.enclosed_name()?);
    }
    common_root(paths)
}

/// Sets the executable permission bits (0o755) on `path` (Unix only).
///
/// # Errors
///
/// Returns an error if the metadata cannot be read or the permissions
/// cannot be changed.
#[cfg(unix)]
pub fn set_executable_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std::fs::metadata(path)
        .with_context(|| format!("Failed to get metadata: {}", path.display()))?
        .permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms)
        .with_context(|| format!("Failed to set permissions: {}", path.display()))
}

/// Sets executable permissions (no-op on Windows).
#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
pub fn set_executable_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("exe"))
}
