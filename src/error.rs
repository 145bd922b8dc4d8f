//! Error types for the pdfchat library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PdfChatError`] — **Fatal**: the document cannot be processed at all
//!   (bad path, oversized file, unreadable PDF, nothing extracted). Returned
//!   as `Err(PdfChatError)` from [`crate::process::DocumentProcessor`].
//!
//! * [`ExtractionFailure`] — **Non-fatal**: one batch or one page came back
//!   unusable. These never abort a run; the affected pages move into the
//!   skipped set and are retried page by page.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdfchat library.
#[derive(Debug, Error)]
pub enum PdfChatError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// No path was supplied.
    #[error("No file path provided")]
    EmptyPath,

    /// The path does not end in `.pdf`.
    #[error("File must have a .pdf extension: '{path}'")]
    NotPdfExtension { path: PathBuf },

    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists but has zero length.
    #[error("PDF file is empty: '{path}'")]
    EmptyFile { path: PathBuf },

    /// The file is larger than the configured limit.
    #[error("PDF file '{path}' is {size_bytes} bytes, exceeding the {max_mb} MB limit")]
    FileTooLarge {
        path: PathBuf,
        size_bytes: u64,
        max_mb: u64,
    },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Rasterisation errors ──────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH to a working libpdfium, or remove the cached copy so it\n\
is downloaded again.\n"
    )]
    PdfiumBindingFailed(String),

    /// The pdfium library is not installed and could not be downloaded.
    #[error("PDF engine unavailable: {0}")]
    EngineUnavailable(#[from] crate::engine::EngineError),

    // ── Result errors ─────────────────────────────────────────────────────
    /// Every page stayed unresolved after the batch and retry passes.
    #[error("No text extracted: all {} pages unresolved after retry", .unresolved.len())]
    NoTextExtracted { unresolved: Vec<usize> },

    // ── LLM / chat errors ─────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM API returned an error on a chat request.
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    /// `ask` was called before any document was processed in the session.
    #[error("Session '{session_id}' has no processed document; process a PDF first")]
    NoDocumentInSession { session_id: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not read or write the cache snapshot.
    #[error("Cache file '{path}' I/O failed: {source}")]
    CacheIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The cache snapshot is not valid JSON.
    #[error("Cache file '{path}' is malformed: {detail}")]
    CacheCorrupt { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`PdfChatError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad path, type or size.
    Validation,
    /// The PDF could not be turned into page images.
    Rasterization,
    /// Every page failed extraction.
    EmptyResult,
    /// Provider, chat, cache or internal failures.
    Other,
}

impl PdfChatError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        use PdfChatError::*;
        match self {
            EmptyPath
            | NotPdfExtension { .. }
            | FileNotFound { .. }
            | PermissionDenied { .. }
            | EmptyFile { .. }
            | FileTooLarge { .. }
            | DownloadFailed { .. }
            | DownloadTimeout { .. } => ErrorKind::Validation,
            CorruptPdf { .. }
            | PasswordRequired { .. }
            | WrongPassword { .. }
            | RasterisationFailed { .. }
            | PdfiumBindingFailed(_)
            | EngineUnavailable(_) => ErrorKind::Rasterization,
            NoTextExtracted { .. } => ErrorKind::EmptyResult,
            _ => ErrorKind::Other,
        }
    }
}

/// A non-fatal failure for one batch or one page.
///
/// Never propagated out of a pipeline run: the pages it covers go into the
/// skipped set instead.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ExtractionFailure {
    /// The extraction call itself failed after its own retries.
    #[error("extraction call failed after {retries} retries: {detail}")]
    Transport { retries: u32, detail: String },

    /// The extraction call did not answer in time.
    #[error("extraction call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The model answered with nothing (or only whitespace / fences).
    #[error("empty response")]
    EmptyResponse,

    /// The response body is not JSON.
    #[error("response is not valid JSON: {detail}")]
    InvalidJson { detail: String },

    /// The response is JSON but not an object.
    #[error("response JSON is not an object")]
    NotAnObject,

    /// A single-page response lacks the requested page key.
    #[error("response has no text for page {page}")]
    MissingPage { page: usize },
}
