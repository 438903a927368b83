//! Resumable HTTP downloads for tool archives.
//!
//! Downloads stream straight to disk. When the destination already holds a
//! partial file, the request asks the server for the remaining bytes only and
//! appends them; servers that ignore the range get the file rewritten from
//! scratch.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{CONTENT_RANGE, RANGE, USER_AGENT};
use reqwest::StatusCode;
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};
use url::{Host, Url};

use super::error::ToolchainError;

type Result<T> = std::result::Result<T, ToolchainError>;

// ============================================================================
// URL Security Validation
// ============================================================================

/// Validates that a URL is safe for downloading.
///
/// Checks:
/// - URL scheme must be HTTPS, or HTTP against a loopback host
/// - URL must have a host
fn validate_url(url_str: &str) -> Result<Url> {
    let unsupported = |reason: &str| ToolchainError::UnsupportedUrl {
        url: url_str.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(url_str).map_err(|e| unsupported(&e.to_string()))?;
    let host = url.host().ok_or_else(|| unsupported("URL must have a host"))?;

    match url.scheme() {
        "https" => Ok(url),
        "http" if is_loopback(&host) => Ok(url),
        "http" => Err(unsupported("plain HTTP is only allowed for loopback hosts")),
        _ => Err(unsupported("URL must use HTTPS")),
    }
}

fn is_loopback(host: &Host<&str>) -> bool {
    match host {
        Host::Domain(domain) => *domain == "localhost",
        Host::Ipv4(ip) => ip.is_loopback(),
        Host::Ipv6(ip) => ip.is_loopback(),
    }
}

// ============================================================================
// Downloader Trait
// ============================================================================

/// Fetches a URL into a local file.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Downloads `url` to `dest`, resuming a partial file when possible.
    ///
    /// Returns the final size of `dest` in bytes.
    async fn fetch(&self, url: &str, dest: &Path, expected_sha256: Option<&str>) -> Result<u64>;
}

/// Streaming downloader backed by reqwest.
#[derive(Debug, Clone, Default)]
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Parses the total length out of a `Content-Range` header.
///
/// Accepts both `bytes */TOTAL` and `bytes START-END/TOTAL`.
fn content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.trim().strip_prefix("bytes")?.rsplit_once('/')?;
    total.trim().parse().ok()
}

/// Parses the start offset out of a `Content-Range: bytes START-END/TOTAL` header.
fn content_range_start(value: &str) -> Option<u64> {
    let range = value.trim().strip_prefix("bytes")?.trim_start();
    let (start, _) = range.split_once('-')?;
    start.trim().parse().ok()
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn fetch(&self, url: &str, dest: &Path, expected_sha256: Option<&str>) -> Result<u64> {
        info!("Downloading {} to {}", url, dest.display());

        validate_url(url)?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ToolchainError::io(format!("failed to create {}", parent.display()), e)
            })?;
        }

        let existing = match tokio::fs::metadata(dest).await {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => 0,
        };

        let mut request = self
            .client
            .get(url)
            .header(USER_AGENT, concat!("gd/", env!("CARGO_PKG_VERSION")));
        if existing > 0 {
            debug!("Resuming {} from byte {}", url, existing);
            request = request.header(RANGE, format!("bytes={}-", existing));
        }

        let response = request.send().await.map_err(|source| ToolchainError::Download {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        let content_range = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut file = match status {
            StatusCode::RANGE_NOT_SATISFIABLE if existing > 0 => {
                let remote = content_range.as_deref().and_then(content_range_total);
                if remote == Some(existing) {
                    debug!("{} already complete ({} bytes)", dest.display(), existing);
                    verify_checksum(dest, expected_sha256).await?;
                    return Ok(existing);
                }
                return Err(ToolchainError::InconsistentResume {
                    url: url.to_string(),
                    local: existing,
                    remote,
                });
            }
            StatusCode::PARTIAL_CONTENT if existing > 0 => {
                let start = content_range.as_deref().and_then(content_range_start);
                if start.is_some_and(|start| start != existing) {
                    return Err(ToolchainError::InconsistentResume {
                        url: url.to_string(),
                        local: existing,
                        remote: content_range.as_deref().and_then(content_range_total),
                    });
                }
                OpenOptions::new().append(true).open(dest).await.map_err(|e| {
                    ToolchainError::io(format!("failed to open {}", dest.display()), e)
                })?
            }
            s if s.is_success() => {
                if existing > 0 {
                    warn!("Server ignored range request for {}, restarting download", url);
                }
                File::create(dest).await.map_err(|e| {
                    ToolchainError::io(format!("failed to create {}", dest.display()), e)
                })?
            }
            other => {
                return Err(ToolchainError::DownloadStatus {
                    url: url.to_string(),
                    status: other.as_u16(),
                });
            }
        };

        debug!("Content-Length: {:?}", response.content_length());

        let mut stream = response.bytes_stream();
        let mut bytes_downloaded: u64 = 0;
        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|source| ToolchainError::Download {
                url: url.to_string(),
                source,
            })?;
            file.write_all(&chunk).await.map_err(|e| {
                ToolchainError::io(format!("failed to write {}", dest.display()), e)
            })?;
            bytes_downloaded += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| ToolchainError::io(format!("failed to flush {}", dest.display()), e))?;
        drop(file);

        verify_checksum(dest, expected_sha256).await?;

        let total = tokio::fs::metadata(dest)
            .await
            .map_err(|e| ToolchainError::io(format!("failed to stat {}", dest.display()), e))?
            .len();

        info!(
            "Download complete: {} new bytes, {} total in {}",
            bytes_downloaded,
            total,
            dest.display()
        );
        Ok(total)
    }
}

// ============================================================================
// Checksum Verification
// ============================================================================

async fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .await
        .map_err(|e| ToolchainError::io(format!("failed to open {}", path.display()), e))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| ToolchainError::io(format!("failed to read {}", path.display()), e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format_sha256_hex(&hasher.finalize()))
}

/// Checks the whole file against `expected`, deleting it on mismatch.
async fn verify_checksum(path: &Path, expected: Option<&str>) -> Result<()> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let actual = sha256_file(path).await?;
    if actual != expected.to_lowercase() {
        let _ = tokio::fs::remove_file(path).await;
        return Err(ToolchainError::Checksum {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            actual,
        });
    }
    debug!("SHA256 verified: {}", actual);
    Ok(())
}

/// Formats a SHA256 hash as lowercase hex without using the hex crate.
fn format_sha256_hex(hash: &[u8]) -> String {
    hash.iter().map(|b| format!("{:02x}", b)).collect()
}

// ============================================================================
// Test Double
// ============================================================================
