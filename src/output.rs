//! Result types returned by document processing.

use crate::error::{ErrorKind, PdfChatError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Extracted text keyed by 1-based page number.
pub type PageTextMap = BTreeMap<usize, String>;

/// Timing and counting information for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Pages produced by rasterisation.
    pub total_pages: usize,
    /// Batch requests sent.
    pub batches: usize,
    /// Batches whose answer was unusable.
    pub failed_batches: usize,
    /// Single-page retry requests sent.
    pub retried_pages: usize,
    /// Pages with text after merge.
    pub resolved_pages: usize,
    /// Pages without text after merge.
    pub unresolved_pages: usize,
    pub render_duration_ms: u64,
    pub extraction_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Successful outcome of processing one document.
///
/// May be partial: `unresolved` lists pages for which no text was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentText {
    /// Content fingerprint used as the cache key.
    pub fingerprint: String,
    /// Page count of the source document.
    pub total_pages: usize,
    /// Extracted text per page.
    pub pages: PageTextMap,
    /// Pages that stayed unresolved after the retry pass, ascending.
    pub unresolved: Vec<usize>,
    /// True when served from the cache without calling the model.
    pub from_cache: bool,
    /// Run statistics; `None` for cache hits.
    pub stats: Option<ExtractionStats>,
}

impl DocumentText {
    /// Whether some pages are missing.
    pub fn is_partial(&self) -> bool {
        !self.unresolved.is_empty()
    }

    /// All page texts joined in page order, separated by blank lines.
    pub fn text(&self) -> String {
        self.pages
            .values()
            .map(|t| t.trim_end())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Wire-friendly form of a processing result: `{ "extractedText": … }` on
/// success and `{ "error": … }` on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProcessResponse {
    Success {
        #[serde(rename = "extractedText")]
        extracted_text: String,
        #[serde(rename = "unresolvedPages", default, skip_serializing_if = "Vec::is_empty")]
        unresolved_pages: Vec<usize>,
        #[serde(rename = "fromCache", default)]
        from_cache: bool,
    },
    Failure {
        error: String,
        kind: ErrorKind,
    },
}

impl From<Result<DocumentText, PdfChatError>> for ProcessResponse {
    fn from(result: Result<DocumentText, PdfChatError>) -> Self {
        match result {
            Ok(doc) => ProcessResponse::Success {
                extracted_text: doc.text(),
                unresolved_pages: doc.unresolved,
                from_cache: doc.from_cache,
            },
            Err(e) => ProcessResponse::Failure {
                error: e.to_string(),
                kind: e.kind(),
            },
        }
    }
}
