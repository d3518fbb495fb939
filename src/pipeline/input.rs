//! Input resolution: turn a user-supplied path or URL into PDF bytes.
//!
//! pdfium opens documents straight from a byte slice, so both local files and
//! downloads end up as an in-memory buffer. The `%PDF` magic bytes are checked
//! before returning so callers get a meaningful error instead of a pdfium
//! load failure.

use crate::error::Pdf2MdError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// PDF bytes plus a label for error messages.
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    /// Local path, or the URL's last path segment for downloads.
    pub origin: PathBuf,
    pub bytes: Vec<u8>,
}

impl ResolvedInput {
    /// Wrap bytes supplied by the caller.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, Pdf2MdError> {
        let origin = PathBuf::from("<memory>");
        check_magic(&origin, &bytes)?;
        Ok(Self { origin, bytes })
    }

    pub fn origin(&self) -> &Path {
        &self.origin
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to PDF bytes.
///
/// If the input is a URL, download it. If the input is a local file, read
/// it. Either way the bytes must start with `%PDF`.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, Pdf2MdError> {
    if input.trim().is_empty() {
        return Err(Pdf2MdError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

/// Read a local file, mapping I/O errors onto input errors.
async fn read_local(path_str: &str) -> Result<ResolvedInput, Pdf2MdError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2MdError::PermissionDenied { path });
        }
        Err(_) => return Err(Pdf2MdError::FileNotFound { path }),
    };

    check_magic(&path, &bytes)?;
    debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
    Ok(ResolvedInput {
        origin: path,
        bytes,
    })
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, Pdf2MdError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Pdf2MdError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Pdf2MdError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Pdf2MdError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Pdf2MdError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let origin = PathBuf::from(filename_from_url(url));

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Pdf2MdError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?
        .to_vec();

    check_magic(&origin, &bytes)?;
    info!("Downloaded {} bytes from {}", bytes.len(), url);

    Ok(ResolvedInput { origin, bytes })
}

/// Reject buffers that do not start with `%PDF`.
fn check_magic(path: &Path, bytes: &[u8]) -> Result<(), Pdf2MdError> {
    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(Pdf2MdError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    Ok(())
}

/// Extract a reasonable filename from the URL path.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}
