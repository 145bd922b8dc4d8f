//! Batch pass: send consecutive page groups to the model concurrently.
//!
//! Pages are split into contiguous batches of at most `batch_size`. Each
//! batch becomes one request carrying all of its page images and an
//! instruction naming the absolute page numbers it covers. Batches are
//! independent, so they run concurrently, bounded by `concurrency`.
//!
//! A batch whose answer cannot be parsed fails as a whole: all of its pages
//! go into the skipped set. Pages that are merely absent from an otherwise
//! valid answer are skipped as well. Either way the retry pass picks them up.

use crate::config::ExtractionConfig;
use crate::error::ExtractionFailure;
use crate::output::PageTextMap;
use crate::pipeline::llm::Extractor;
use crate::pipeline::parse::parse_batch_response;
use crate::pipeline::render::PageImage;
use crate::prompts::batch_instruction;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;
use tracing::{debug, info, warn};

/// A contiguous half-open range `[start, end)` of 1-based page numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Batch {
    pub start: usize,
    pub end: usize,
}

impl Batch {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start >= 1 && start < end, "invalid batch {start}..{end}");
        Self { start, end }
    }

    /// First page of the batch.
    pub fn first(&self) -> usize {
        self.start
    }

    /// Last page of the batch (inclusive).
    pub fn last(&self) -> usize {
        self.end - 1
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, page: usize) -> bool {
        (self.start..self.end).contains(&page)
    }

    pub fn pages(&self) -> Range<usize> {
        self.start..self.end
    }
}

impl fmt::Display for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.len() == 1 {
            write!(f, "[{}]", self.start)
        } else {
            write!(f, "[{}-{}]", self.first(), self.last())
        }
    }
}

/// Split pages `1..=num_pages` into consecutive batches of at most `batch_size`.
pub fn partition(num_pages: usize, batch_size: usize) -> Vec<Batch> {
    let size = batch_size.max(1);
    (1..=num_pages)
        .step_by(size)
        .map(|start| Batch::new(start, (start + size).min(num_pages + 1)))
        .collect()
}

/// What the batch pass produced.
#[derive(Debug, Default)]
pub struct BatchPassOutput {
    /// Text for every page that a batch answer covered.
    pub resolved: PageTextMap,
    /// Pages to retry individually.
    pub skipped: BTreeSet<usize>,
    /// Batch requests sent.
    pub batches: usize,
    /// Batches whose answer was unusable as a whole.
    pub failed_batches: usize,
}

/// Run the batch pass over `pages` (ordered by page number).
pub async fn dispatch_batches(
    extractor: &dyn Extractor,
    pages: &[PageImage],
    config: &ExtractionConfig,
) -> BatchPassOutput {
    let batch_size = config.batch_size.max(1);
    let progress = config.progress_callback.as_ref();

    let outcomes: Vec<(Batch, Result<PageTextMap, ExtractionFailure>)> =
        stream::iter(pages.chunks(batch_size).map(|chunk| async move {
            let batch = batch_of(chunk);
            let images = chunk.iter().map(|p| p.image.clone()).collect();
            let instruction = batch_instruction(batch.first(), batch.last());

            debug!("Batch {}: sending {} pages", batch, chunk.len());
            let result = match extractor.extract(images, &instruction).await {
                Ok(raw) => parse_batch_response(&raw, &batch),
                Err(e) => Err(e),
            };

            if let Some(cb) = progress {
                match &result {
                    Ok(map) => cb.on_batch_complete(&batch, map.len()),
                    Err(e) => cb.on_batch_failed(&batch, &e.to_string()),
                }
            }
            (batch, result)
        }))
        .buffer_unordered(config.concurrency.max(1))
        .collect()
        .await;

    // Fan-in: every batch has settled before any shared state is touched.
    let mut out = BatchPassOutput {
        batches: outcomes.len(),
        ..Default::default()
    };
    for (batch, result) in outcomes {
        match result {
            Ok(map) => {
                for page in batch.pages() {
                    if !map.contains_key(&page) {
                        debug!("Batch {}: no text for page {}, will retry", batch, page);
                        out.skipped.insert(page);
                    }
                }
                out.resolved.extend(map);
            }
            Err(e) => {
                warn!("Batch {} failed, retrying its pages individually: {}", batch, e);
                out.failed_batches += 1;
                out.skipped.extend(batch.pages());
            }
        }
    }

    info!(
        "Batch pass: {} batches, {} failed, {} pages resolved, {} skipped",
        out.batches,
        out.failed_batches,
        out.resolved.len(),
        out.skipped.len()
    );
    out
}

fn batch_of(chunk: &[PageImage]) -> Batch {
    let first = chunk.first().map_or(1, |p| p.page_num);
    let last = chunk.last().map_or(first, |p| p.page_num);
    Batch::new(first, last + 1)
}
