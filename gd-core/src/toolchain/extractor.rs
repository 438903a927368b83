//! Archive extraction for downloaded tool packages.
//!
//! Handles zip, tar.gz and tar.xz archives. Extraction optionally strips a
//! single bundled top-level directory, refuses entries that would land outside
//! the destination, and refuses anything that is not a regular file or a
//! directory. Errors abort immediately; a failed extraction may leave a
//! partially populated destination behind.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

use super::error::ToolchainError;
use super::types::ArchiveFormat;

type Result<T> = std::result::Result<T, ToolchainError>;

const DEFAULT_DIR_MODE: u32 = 0o755;
const DEFAULT_FILE_MODE: u32 = 0o644;

// ============================================================================
// Archive Extraction
// ============================================================================

/// Extracts an archive to a destination directory.
///
/// # Arguments
///
/// * `archive_path` - Path to the archive file.
/// * `dest_dir` - Directory to extract into.
/// * `format` - The archive format.
/// * `strip_top_dir` - Drop a leading directory shared by every entry.
///
/// # Errors
///
/// Returns an error if the archive cannot be read, an entry escapes
/// `dest_dir`, an entry is neither a file nor a directory, or writing fails.
pub fn extract_archive(
    archive_path: &Path,
    dest_dir: &Path,
    format: ArchiveFormat,
    strip_top_dir: bool,
) -> Result<()> {
    info!(
        "Extracting {:?} archive {} to {}",
        format,
        archive_path.display(),
        dest_dir.display()
    );

    fs::create_dir_all(dest_dir).map_err(|e| {
        ToolchainError::io(format!("failed to create {}", dest_dir.display()), e)
    })?;

    match format {
        ArchiveFormat::Zip => extract_zip(archive_path, dest_dir, strip_top_dir),
        ArchiveFormat::TarGz | ArchiveFormat::TarXz => {
            extract_tar(archive_path, dest_dir, format, strip_top_dir)
        }
        ArchiveFormat::Raw => Err(ToolchainError::UnknownArchiveFormat {
            path: archive_path.to_path_buf(),
        }),
    }
}

// ============================================================================
// Top-Level Directory Detection
// ============================================================================

/// Decides whether every entry shares one leading path segment.
///
/// Only the first component is considered. A top-level file, or any entry
/// whose first component differs, cancels the detection for the archive.
#[derive(Debug, Default)]
struct TopDirDetector {
    prefix: Option<String>,
    cancelled: bool,
}

impl TopDirDetector {
    fn observe(&mut self, raw_name: &str, is_dir: bool) {
        if self.cancelled {
            return;
        }
        let name = normalize_name(raw_name);
        if name.is_empty() {
            return;
        }

        let head = match name.split_once('/') {
            Some((head, _)) => head,
            None if is_dir => name.as_str(),
            None => {
                self.cancelled = true;
                return;
            }
        };

        match &self.prefix {
            None => self.prefix = Some(head.to_string()),
            Some(prefix) if prefix == head => {}
            Some(_) => self.cancelled = true,
        }
    }

    fn finish(self) -> Option<String> {
        if self.cancelled {
            None
        } else {
            self.prefix
        }
    }
}

/// Forward slashes, no leading `./`, no trailing `/`.
fn normalize_name(name: &str) -> String {
    let mut name = name.replace('\\', "/");
    while let Some(rest) = name.strip_prefix("./") {
        name = rest.to_string();
    }
    name.trim_end_matches('/').to_string()
}

/// Removes `prefix` from `name`; `None` when nothing remains.
fn strip_prefix(name: &str, prefix: Option<&str>) -> Option<String> {
    let name = normalize_name(name);
    let Some(prefix) = prefix else {
        return (!name.is_empty()).then_some(name);
    };
    if name == prefix {
        return None;
    }
    match name.strip_prefix(prefix).and_then(|rest| rest.strip_prefix('/')) {
        Some(rest) if !rest.is_empty() => Some(rest.to_string()),
        Some(_) => None,
        None => Some(name),
    }
}

/// Joins an archive-relative path onto `dest_dir`, refusing to leave it.
fn safe_join(dest_dir: &Path, relative: &str, entry: &str) -> Result<PathBuf> {
    let mut out = dest_dir.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ToolchainError::PathTraversal {
                    entry: entry.to_string(),
                });
            }
        }
    }
    // Defence in depth for names that smuggle separators past components().
    if relative.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(ToolchainError::PathTraversal {
            entry: entry.to_string(),
        });
    }
    Ok(out)
}

// ============================================================================
// Entry Writing
// ============================================================================

enum EntryKind {
    Dir,
    File,
    Skip,
    Unsupported(String),
}

/// Directory modes recorded in the archive.
///
/// Applied after the last entry is written, deepest first, so a read-only
/// directory can still receive its children.
#[derive(Debug, Default)]
struct DirModes(Vec<(PathBuf, u32)>);

impl DirModes {
    fn apply(mut self) -> Result<()> {
        self.0
            .sort_by_key(|(path, _)| std::cmp::Reverse(path.components().count()));
        #[cfg(unix)]
        for (path, mode) in &self.0 {
            set_unix_permissions(path, *mode)?;
        }
        Ok(())
    }
}

fn write_dir(path: &Path, mode: Option<u32>, modes: &mut DirModes) -> Result<()> {
    fs::create_dir_all(path)
        .map_err(|e| ToolchainError::io(format!("failed to create {}", path.display()), e))?;
    modes
        .0
        .push((path.to_path_buf(), mode.unwrap_or(DEFAULT_DIR_MODE)));
    Ok(())
}

fn write_file<R: Read>(path: &Path, reader: &mut R, mode: Option<u32>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            ToolchainError::io(format!("failed to create {}", parent.display()), e)
        })?;
    }
    let mut outfile = File::create(path)
        .map_err(|e| ToolchainError::io(format!("failed to create {}", path.display()), e))?;
    io::copy(reader, &mut outfile)
        .map_err(|e| ToolchainError::io(format!("failed to write {}", path.display()), e))?;

    #[cfg(unix)]
    set_unix_permissions(path, mode.unwrap_or(DEFAULT_FILE_MODE))?;
    #[cfg(not(unix))]
    let _ = mode;
    Ok(())
}

// ============================================================================
// ZIP Extraction
// ============================================================================

fn open_zip(archive_path: &Path) -> Result<zip::ZipArchive<BufReader<File>>> {
    let file = File::open(archive_path).map_err(|e| {
        ToolchainError::io(format!("failed to open {}", archive_path.display()), e)
    })?;
    zip::ZipArchive::new(BufReader::new(file))
        .map_err(|e| ToolchainError::archive(archive_path, e))
}

fn zip_kind(name: &str, unix_mode: Option<u32>) -> EntryKind {
    if name.ends_with('/') || name.ends_with('\\') {
        return EntryKind::Dir;
    }
    match unix_mode.map(|mode| mode & 0o170000) {
        None | Some(0) | Some(0o100000) => EntryKind::File,
        Some(0o040000) => EntryKind::Dir,
        Some(0o120000) => EntryKind::Unsupported("symlink".to_string()),
        Some(other) => EntryKind::Unsupported(format!("mode {:o}", other)),
    }
}

fn extract_zip(archive_path: &Path, dest_dir: &Path, strip_top_dir: bool) -> Result<()> {
    let mut archive = open_zip(archive_path)?;

    let prefix = if strip_top_dir {
        let mut detector = TopDirDetector::default();
        for name in archive.file_names() {
            detector.observe(name, name.ends_with('/'));
        }
        detector.finish()
    } else {
        None
    };
    debug!("ZIP top-level prefix to strip: {:?}", prefix);

    let mut dir_modes = DirModes::default();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ToolchainError::archive(archive_path, e))?;
        let name = entry.name().to_string();
        let mode = entry.unix_mode().map(|m| m & 0o7777).filter(|m| *m != 0);

        let kind = zip_kind(&name, entry.unix_mode());
        if let EntryKind::Unsupported(kind) = kind {
            return Err(ToolchainError::UnsupportedEntry { entry: name, kind });
        }

        let Some(relative) = strip_prefix(&name, prefix.as_deref()) else {
            continue;
        };
        let dest_path = safe_join(dest_dir, &relative, &name)?;

        match kind {
            EntryKind::Dir => write_dir(&dest_path, mode, &mut dir_modes)?,
            EntryKind::File => write_file(&dest_path, &mut entry, mode)?,
            EntryKind::Skip | EntryKind::Unsupported(_) => {}
        }
    }

    dir_modes.apply()?;
    debug!("ZIP extraction complete");
    Ok(())
}

// ============================================================================
// TAR Extraction (gzip / xz)
// ============================================================================

fn open_tar(archive_path: &Path, format: ArchiveFormat) -> Result<tar::Archive<Box<dyn Read>>> {
    let file = File::open(archive_path).map_err(|e| {
        ToolchainError::io(format!("failed to open {}", archive_path.display()), e)
    })?;
    let reader = BufReader::new(file);
    let decoder: Box<dyn Read> = match format {
        ArchiveFormat::TarXz => Box::new(xz2::read::XzDecoder::new(reader)),
        _ => Box::new(flate2::read::GzDecoder::new(reader)),
    };
    Ok(tar::Archive::new(decoder))
}

fn tar_kind(entry_type: tar::EntryType) -> EntryKind {
    use tar::EntryType;
    match entry_type {
        EntryType::Regular | EntryType::Continuous => EntryKind::File,
        EntryType::Directory => EntryKind::Dir,
        EntryType::XGlobalHeader => EntryKind::Skip,
        EntryType::Symlink => EntryKind::Unsupported("symlink".to_string()),
        EntryType::Link => EntryKind::Unsupported("hard link".to_string()),
        EntryType::Char => EntryKind::Unsupported("character device".to_string()),
        EntryType::Block => EntryKind::Unsupported("block device".to_string()),
        EntryType::Fifo => EntryKind::Unsupported("fifo".to_string()),
        other => EntryKind::Unsupported(format!("{:?}", other)),
    }
}

fn entry_name<R: Read>(entry: &tar::Entry<'_, R>) -> String {
    String::from_utf8_lossy(&entry.path_bytes()).into_owned()
}

fn extract_tar(
    archive_path: &Path,
    dest_dir: &Path,
    format: ArchiveFormat,
    strip_top_dir: bool,
) -> Result<()> {
    let read_err = |e: io::Error| ToolchainError::archive(archive_path, e);

    let prefix = if strip_top_dir {
        let mut archive = open_tar(archive_path, format)?;
        let mut detector = TopDirDetector::default();
        for entry in archive.entries().map_err(read_err)? {
            let entry = entry.map_err(read_err)?;
            let entry_type = entry.header().entry_type();
            if matches!(tar_kind(entry_type), EntryKind::Skip) {
                continue;
            }
            detector.observe(&entry_name(&entry), entry_type.is_dir());
        }
        detector.finish()
    } else {
        None
    };
    debug!("TAR top-level prefix to strip: {:?}", prefix);

    let mut archive = open_tar(archive_path, format)?;
    let mut dir_modes = DirModes::default();
    for entry in archive.entries().map_err(read_err)? {
        let mut entry = entry.map_err(read_err)?;
        let name = entry_name(&entry);
        let kind = tar_kind(entry.header().entry_type());
        let mode = entry.header().mode().ok().map(|m| m & 0o7777);

        match kind {
            EntryKind::Skip => continue,
            EntryKind::Unsupported(kind) => {
                return Err(ToolchainError::UnsupportedEntry { entry: name, kind });
            }
            EntryKind::Dir | EntryKind::File => {}
        }

        let Some(relative) = strip_prefix(&name, prefix.as_deref()) else {
            continue;
        };
        let dest_path = safe_join(dest_dir, &relative, &name)?;

        if matches!(kind, EntryKind::Dir) {
            write_dir(&dest_path, mode, &mut dir_modes)?;
        } else {
            write_file(&dest_path, &mut entry, mode)?;
        }
    }

    dir_modes.apply()?;
    debug!("TAR extraction complete");
    Ok(())
}

// ============================================================================
// Unix Permissions
// ============================================================================

#[cfg(unix)]
fn set_unix_permissions(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|e| {
        ToolchainError::io(format!("failed to set permissions on {}", path.display()), e)
    })
}

/// Sets executable permission on a file (Unix only).
///
/// On Windows, this is a no-op.
#[allow(unused_variables)]
pub fn make_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            ToolchainError::io(format!("failed to get metadata for {}", path.display()), e)
        })?;

        let mut permissions = metadata.permissions();
        let current_mode = permissions.mode();
        permissions.set_mode(current_mode | 0o755);

        fs::set_permissions(path, permissions).map_err(|e| {
            ToolchainError::io(
                format!("failed to set executable permission on {}", path.display()),
                e,
            )
        })?;

        debug!("Set executable permission on {}", path.display());
    }

    Ok(())
}
