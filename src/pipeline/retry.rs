//! Retry pass: re-extract each skipped page on its own.
//!
//! Every page in the skipped set gets exactly one single-page request whose
//! instruction names that page. The answer must be a JSON object holding the
//! exact requested key, otherwise the page stays unresolved. Requests run
//! concurrently, bounded by `concurrency` just like the batch pass.

use crate::config::ExtractionConfig;
use crate::error::ExtractionFailure;
use crate::output::PageTextMap;
use crate::pipeline::llm::Extractor;
use crate::pipeline::parse::parse_page_response;
use crate::pipeline::render::PageImage;
use crate::prompts::page_instruction;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// What the retry pass produced.
#[derive(Debug, Default)]
pub struct RetryPassOutput {
    /// Text for pages that succeeded on retry.
    pub recovered: PageTextMap,
    /// Pages still without text.
    pub unresolved: BTreeSet<usize>,
    /// Single-page requests sent.
    pub attempted: usize,
}

/// Retry every page in `skipped`, looking images up in `pages`.
pub async fn retry_pages(
    extractor: &dyn Extractor,
    pages: &[PageImage],
    skipped: &BTreeSet<usize>,
    config: &ExtractionConfig,
) -> RetryPassOutput {
    if skipped.is_empty() {
        return RetryPassOutput::default();
    }

    let progress = config.progress_callback.as_ref();
    if let Some(cb) = progress {
        let list: Vec<usize> = skipped.iter().copied().collect();
        cb.on_retry_start(&list);
    }

    let by_page: BTreeMap<usize, &PageImage> = pages.iter().map(|p| (p.page_num, p)).collect();
    let mut out = RetryPassOutput::default();

    let mut requests = Vec::with_capacity(skipped.len());
    for &page in skipped {
        match by_page.get(&page) {
            Some(image) => requests.push((page, *image)),
            None => {
                warn!("Page {}: no image available for retry", page);
                out.unresolved.insert(page);
            }
        }
    }
    out.attempted = requests.len();
    info!("Retrying {} pages individually", out.attempted);

    let outcomes: Vec<(usize, Result<String, ExtractionFailure>)> =
        stream::iter(requests.into_iter().map(|(page, image)| async move {
            let instruction = page_instruction(page);
            let result = match extractor.extract(vec![image.image.clone()], &instruction).await {
                Ok(raw) => parse_page_response(&raw, page),
                Err(e) => Err(e),
            };
            if let Some(cb) = progress {
                cb.on_page_retried(page, result.is_ok());
            }
            (page, result)
        }))
        .buffer_unordered(config.concurrency.max(1))
        .collect()
        .await;

    for (page, result) in outcomes {
        match result {
            Ok(text) => {
                debug!("Page {}: recovered on retry", page);
                out.recovered.insert(page, text);
            }
            Err(e) => {
                warn!("Page {}: retry failed: {}", page, e);
                out.unresolved.insert(page);
            }
        }
    }

    info!(
        "Retry pass: {} recovered, {} unresolved",
        out.recovered.len(),
        out.unresolved.len()
    );
    out
}
