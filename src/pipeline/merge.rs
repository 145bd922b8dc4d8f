//! Merge batch and retry results into one page-indexed map.

use crate::error::PdfChatError;
use crate::output::PageTextMap;
use crate::pipeline::postprocess::clean_page_text;
use std::collections::BTreeSet;

/// Final page map plus the pages that never got text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedResult {
    pub pages: PageTextMap,
    /// Ascending.
    pub unresolved: Vec<usize>,
}

/// Merge batch successes, then retry successes.
///
/// A page is only retried when its batch did not resolve it, so the two maps
/// never share a key. Returns [`PdfChatError::NoTextExtracted`] when nothing
/// at all was extracted.
pub fn merge(
    batch: PageTextMap,
    retry: PageTextMap,
    unresolved: BTreeSet<usize>,
) -> Result<MergedResult, PdfChatError> {
    debug_assert!(
        retry.keys().all(|k| !batch.contains_key(k)),
        "retry result overlaps batch result"
    );

    let mut pages = PageTextMap::new();
    for (page, text) in batch.into_iter().chain(retry) {
        pages.insert(page, clean_page_text(&text));
    }

    let unresolved: Vec<usize> = unresolved
        .into_iter()
        .filter(|p| !pages.contains_key(p))
        .collect();

    if pages.is_empty() {
        return Err(PdfChatError::NoTextExtracted { unresolved });
    }

    Ok(MergedResult { pages, unresolved })
}
