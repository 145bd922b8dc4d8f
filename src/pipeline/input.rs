//! Input resolution and validation.
//!
//! A local path is checked in a fixed order (non-empty path, `.pdf`
//! extension, readable file, non-zero size, size limit) and the first failing
//! rule is reported. URLs are downloaded into a `TempDir` first and the
//! downloaded file goes through the same checks; the temp dir lives as long as
//! the returned [`ResolvedInput`].

use crate::error::PdfChatError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// The resolved input: either a local path or a downloaded temp file.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; PDF downloaded to a temp directory.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Get the path to the PDF file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a validated local PDF file.
pub async fn resolve_input(
    input: &str,
    max_size_mb: u64,
    timeout_secs: u64,
) -> Result<ResolvedInput, PdfChatError> {
    if is_url(input) {
        download_url(input, max_size_mb, timeout_secs).await
    } else {
        validate_pdf(input, max_size_mb).map(ResolvedInput::Local)
    }
}

/// Validate that `path` names a non-empty PDF no larger than `max_size_mb`.
///
/// Returns the first violated rule; no side effects.
pub fn validate_pdf(path: &str, max_size_mb: u64) -> Result<PathBuf, PdfChatError> {
    if path.trim().is_empty() {
        return Err(PdfChatError::EmptyPath);
    }
    let path = PathBuf::from(path);

    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        return Err(PdfChatError::NotPdfExtension { path });
    }

    let metadata = match std::fs::metadata(&path) {
        Ok(m) if m.is_file() => m,
        Ok(_) => return Err(PdfChatError::FileNotFound { path }),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(PdfChatError::PermissionDenied { path });
        }
        Err(_) => return Err(PdfChatError::FileNotFound { path }),
    };

    // Readability is only proven by opening.
    if let Err(e) = std::fs::File::open(&path) {
        return Err(if e.kind() == std::io::ErrorKind::PermissionDenied {
            PdfChatError::PermissionDenied { path }
        } else {
            PdfChatError::FileNotFound { path }
        });
    }

    let size_bytes = metadata.len();
    if size_bytes == 0 {
        return Err(PdfChatError::EmptyFile { path });
    }
    if size_bytes > max_size_mb.saturating_mul(BYTES_PER_MB) {
        return Err(PdfChatError::FileTooLarge {
            path,
            size_bytes,
            max_mb: max_size_mb,
        });
    }

    debug!("Validated PDF: {} ({} bytes)", path.display(), size_bytes);
    Ok(path)
}

/// Download a URL to a temporary directory and validate the result.
async fn download_url(
    url: &str,
    max_size_mb: u64,
    timeout_secs: u64,
) -> Result<ResolvedInput, PdfChatError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| PdfChatError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            PdfChatError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            PdfChatError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(PdfChatError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let limit = max_size_mb.saturating_mul(BYTES_PER_MB);
    if let Some(len) = response.content_length() {
        if len > limit {
            return Err(PdfChatError::FileTooLarge {
                path: PathBuf::from(url),
                size_bytes: len,
                max_mb: max_size_mb,
            });
        }
    }

    let filename = filename_from_url(url);
    let temp_dir = TempDir::new().map_err(|e| PdfChatError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| PdfChatError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| PdfChatError::Internal(format!("Failed to write temp file: {}", e)))?;

    let path_str = file_path.to_string_lossy().to_string();
    let validated = validate_pdf(&path_str, max_size_mb)?;
    info!("Downloaded to: {}", validated.display());

    Ok(ResolvedInput::Downloaded {
        path: validated,
        _temp_dir: temp_dir,
    })
}

/// Pick a file name for a downloaded PDF.
///
/// The last URL path segment is used when it already ends in `.pdf`; anything
/// else (arxiv-style `/pdf/1706.03762`, query-only URLs) becomes
/// `downloaded.pdf` so the extension check passes.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if last.to_ascii_lowercase().ends_with(".pdf") {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}
