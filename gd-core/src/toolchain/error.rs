//! Error type for toolchain resolution, downloads and extraction.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while locating, downloading or unpacking a tool.
#[derive(Debug, Error)]
pub enum ToolchainError {
    /// A required tool could not be found or installed.
    #[error("{name} is required{for_text}, but it could not be found{reason_text}{hint_text}",
        for_text = with_prefix(" for ", .required_for),
        reason_text = with_prefix(": ", .reason),
        hint_text = with_prefix(". ", .hint))]
    NotFound {
        name: String,
        required_for: String,
        hint: String,
        reason: String,
    },

    #[error("download of {url} failed: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("download of {url} failed with status {status}")]
    DownloadStatus { url: String, status: u16 },

    /// A 416 response whose reported size disagrees with the partial file.
    #[error("cannot resume {url}: server reports {remote:?} bytes, local file has {local}")]
    InconsistentResume {
        url: String,
        local: u64,
        remote: Option<u64>,
    },

    #[error("SHA-256 mismatch for {path}: expected {expected}, got {actual}")]
    Checksum {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("unsupported download URL {url}: {reason}")]
    UnsupportedUrl { url: String, reason: String },

    #[error("no value for $({placeholder}) in {template}")]
    UnresolvedTemplate {
        template: String,
        placeholder: String,
    },

    #[error("failed to read archive {path}: {message}")]
    Archive { path: PathBuf, message: String },

    #[error("{path} is not a zip, tar.gz or tar.xz archive")]
    UnknownArchiveFormat { path: PathBuf },

    #[error("archive entry {entry:?} escapes the destination directory")]
    PathTraversal { entry: String },

    #[error("archive entry {entry:?} has unsupported file type {kind}")]
    UnsupportedEntry { entry: String, kind: String },

    #[error("{program} exited with {exit}{stderr_text}",
        exit = .code.map(|c| format!("status {}", c)).unwrap_or_else(|| "a signal".to_string()),
        stderr_text = with_prefix(": ", .stderr))]
    Subprocess {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl ToolchainError {
    /// Wraps an I/O error with a short description of the failed operation.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn archive(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Archive {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

fn with_prefix(prefix: &str, value: &str) -> String {
    if value.is_empty() {
        String::new()
    } else {
        format!("{}{}", prefix, value)
    }
}
