//! Progress-callback trait for batch and retry events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to be told
//! when batches finish, fail, and when individual pages are retried.
//!
//! # Example
//!
//! ```rust
//! use pdfchat::{ExtractionConfig, ExtractionProgressCallback, pipeline::batch::Batch};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct FailedBatches(AtomicUsize);
//!
//! impl ExtractionProgressCallback for FailedBatches {
//!     fn on_batch_failed(&self, batch: &Batch, error: &str) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("pages {batch} failed: {error}");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(FailedBatches(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::pipeline::batch::Batch;
use std::sync::Arc;

/// Called by the pipeline as it processes a document.
///
/// Batches and retries run concurrently, so every method may be called from
/// several tasks at once. All methods default to no-ops.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once after rasterisation, before any batch is sent.
    fn on_extraction_start(&self, total_pages: usize, total_batches: usize) {
        let _ = (total_pages, total_batches);
    }

    /// A batch answered with a usable JSON object.
    ///
    /// `resolved` counts the pages of the batch that got text.
    fn on_batch_complete(&self, batch: &Batch, resolved: usize) {
        let _ = (batch, resolved);
    }

    /// A batch failed as a whole; its pages will be retried one by one.
    fn on_batch_failed(&self, batch: &Batch, error: &str) {
        let _ = (batch, error);
    }

    /// Called once before the retry pass, with the pages about to be retried.
    fn on_retry_start(&self, pages: &[usize]) {
        let _ = pages;
    }

    /// A single-page retry finished.
    fn on_page_retried(&self, page_num: usize, success: bool) {
        let _ = (page_num, success);
    }

    /// Called once after merge.
    fn on_extraction_complete(&self, resolved: usize, unresolved: &[usize]) {
        let _ = (resolved, unresolved);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
