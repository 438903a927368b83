//! Managed-tools directory layout under `GDPATH`.
//!
//! - `$GDPATH/bin/`: installed tool binaries (`<tool>[-<version>][.exe]`)
//!   and whatever else their archives unpacked
//! - `$GDPATH/downloads/`: archives in flight; removed after extraction

use std::path::{Path, PathBuf};

use super::error::ToolchainError;

// ============================================================================
// Path Resolution
// ============================================================================

/// Returns the directory holding installed tools.
///
/// Path: `{gdpath}/bin/`
pub fn bin_dir(gdpath: &Path) -> PathBuf {
    gdpath.join("bin")
}

/// Returns the directory holding partially or fully downloaded archives.
///
/// Path: `{gdpath}/downloads/`
pub fn downloads_dir(gdpath: &Path) -> PathBuf {
    gdpath.join("downloads")
}

/// Returns the local file an archive at `url` is downloaded to.
///
/// Uses the last path segment of the URL, ignoring query and fragment.
pub fn download_path(gdpath: &Path, url: &str) -> PathBuf {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file_name = path
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("download");
    downloads_dir(gdpath).join(file_name)
}

/// Ensures the managed directories exist.
///
/// # Errors
///
/// Returns an error if any directory cannot be created (e.g., permission issues).
pub fn ensure_dirs_exist(gdpath: &Path) -> Result<(), ToolchainError> {
    for dir in [bin_dir(gdpath), downloads_dir(gdpath)] {
        std::fs::create_dir_all(&dir)
            .map_err(|e| ToolchainError::io(format!("failed to create {}", dir.display()), e))?;
    }
    Ok(())
}
