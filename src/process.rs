//! Document processing and chat entry points.
//!
//! [`DocumentProcessor`] owns the document cache, the session store and the
//! two external capabilities (rasteriser and extractor). One call to
//! [`DocumentProcessor::process_document`] runs:
//!
//! ```text
//! validate ─▶ fingerprint ─▶ cache? ──hit──────────────────────────────▶ session
//!                              │miss
//!                              ▼
//!                         rasterise ─▶ batch pass ─▶ retry pass ─▶ merge ─▶ cache ─▶ session
//! ```
//!
//! Validation and rasterisation failures abort the run; per-batch and
//! per-page failures only ever end up in the unresolved list. Nothing is
//! cached unless at least one page produced text.

use crate::cache::{fingerprint_file, CacheEntry, DocumentCache};
use crate::chat::{self, ChatModel, LlmChat};
use crate::config::ExtractionConfig;
use crate::error::PdfChatError;
use crate::output::{DocumentText, ExtractionStats};
use crate::pipeline::batch::{dispatch_batches, partition};
use crate::pipeline::llm::{resolve_provider, Extractor, VisionExtractor};
use crate::pipeline::merge::merge;
use crate::pipeline::render::{PdfiumRasterizer, Rasterizer};
use crate::pipeline::retry::retry_pages;
use crate::pipeline::input;
use crate::session::{ChatTurn, SessionDocument, SessionStore};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Processes PDFs into cached page text and answers questions about them.
pub struct DocumentProcessor {
    config: ExtractionConfig,
    rasterizer: Arc<dyn Rasterizer>,
    extractor: Arc<dyn Extractor>,
    chat: Arc<dyn ChatModel>,
    cache: Arc<DocumentCache>,
    sessions: Arc<SessionStore>,
}

impl DocumentProcessor {
    /// Build a processor with pdfium rasterisation and the configured LLM
    /// provider for both extraction and chat.
    pub fn new(config: ExtractionConfig) -> Result<Self, PdfChatError> {
        let provider = resolve_provider(&config)?;
        let rasterizer = Arc::new(PdfiumRasterizer::from_config(&config));
        let extractor = Arc::new(VisionExtractor::new(Arc::clone(&provider), &config));
        let chat = Arc::new(LlmChat::new(provider, &config));
        Ok(Self::from_parts(config, rasterizer, extractor, chat))
    }

    /// Build a processor from explicit capabilities, with empty stores.
    pub fn from_parts(
        config: ExtractionConfig,
        rasterizer: Arc<dyn Rasterizer>,
        extractor: Arc<dyn Extractor>,
        chat: Arc<dyn ChatModel>,
    ) -> Self {
        Self {
            config,
            rasterizer,
            extractor,
            chat,
            cache: Arc::new(DocumentCache::new()),
            sessions: Arc::new(SessionStore::new()),
        }
    }

    /// Use existing stores, e.g. to carry cache and sessions over to a
    /// processor built from a new configuration.
    pub fn with_stores(mut self, cache: Arc<DocumentCache>, sessions: Arc<SessionStore>) -> Self {
        self.cache = cache;
        self.sessions = sessions;
        self
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<DocumentCache> {
        &self.cache
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Extract the text of the PDF at `input` (path or URL) for `session_id`.
    ///
    /// Served from the cache when the same content was processed within the
    /// TTL. On success the document becomes the session's chat context.
    pub async fn process_document(
        &self,
        input_str: &str,
        session_id: &str,
    ) -> Result<DocumentText, PdfChatError> {
        info!("Processing document: {} (session {})", input_str, session_id);

        let resolved = input::resolve_input(
            input_str,
            self.config.max_file_size_mb,
            self.config.download_timeout_secs,
        )
        .await?;
        let fingerprint = fingerprint_file(resolved.path()).await?;
        debug!("Fingerprint {}", fingerprint);

        let document = match self.cache.get_fresh(&fingerprint, self.config.cache_ttl()) {
            Some(entry) => {
                info!("Cache hit for {} ({} pages)", fingerprint, entry.pages.len());
                DocumentText {
                    fingerprint: fingerprint.clone(),
                    total_pages: entry.total_pages,
                    pages: entry.pages,
                    unresolved: entry.unresolved,
                    from_cache: true,
                    stats: None,
                }
            }
            None => {
                let document = extract_document(
                    self.rasterizer.as_ref(),
                    self.extractor.as_ref(),
                    resolved.path(),
                    fingerprint.clone(),
                    &self.config,
                )
                .await?;
                self.cache.insert(
                    fingerprint.clone(),
                    CacheEntry::new(
                        document.pages.clone(),
                        document.unresolved.clone(),
                        document.total_pages,
                    ),
                );
                document
            }
        };

        self.sessions.attach_document(
            session_id,
            SessionDocument {
                fingerprint,
                pages: Arc::new(document.pages.clone()),
                unresolved: document.unresolved.clone(),
            },
        );

        Ok(document)
    }

    /// Answer `question` about the session's current document.
    ///
    /// Both the question and the answer are appended to the transcript; a
    /// failed model call leaves the transcript untouched.
    pub async fn ask(&self, session_id: &str, question: &str) -> Result<String, PdfChatError> {
        let document =
            self.sessions
                .document(session_id)
                .ok_or_else(|| PdfChatError::NoDocumentInSession {
                    session_id: session_id.to_string(),
                })?;
        let history = self.sessions.transcript(session_id);

        let reply = chat::answer(
            self.chat.as_ref(),
            &self.config,
            &document,
            &history,
            question,
        )
        .await?;

        self.sessions.push_turn(session_id, ChatTurn::user(question));
        self.sessions
            .push_turn(session_id, ChatTurn::assistant(reply.as_str()));
        Ok(reply)
    }

    /// Forget the session's document and transcript.
    pub fn clear_session(&self, session_id: &str) -> bool {
        self.sessions.clear(session_id)
    }
}

/// Run rasterise → batch pass → retry pass → merge for one document.
///
/// Does not touch the cache.
pub async fn extract_document(
    rasterizer: &dyn Rasterizer,
    extractor: &dyn Extractor,
    pdf_path: &Path,
    fingerprint: String,
    config: &ExtractionConfig,
) -> Result<DocumentText, PdfChatError> {
    let total_start = Instant::now();

    // ── Rasterise ────────────────────────────────────────────────────────
    let render_start = Instant::now();
    let pages = rasterizer.rasterize(pdf_path).await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    let total_pages = pages.len();
    info!("Rasterised {} pages in {}ms", total_pages, render_duration_ms);

    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_start(total_pages, partition(total_pages, config.batch_size).len());
    }

    // ── Batch pass, then retry pass ─────────────────────────────────────
    let extraction_start = Instant::now();
    let batch_out = dispatch_batches(extractor, &pages, config).await;
    let retry_out = retry_pages(extractor, &pages, &batch_out.skipped, config).await;
    let extraction_duration_ms = extraction_start.elapsed().as_millis() as u64;

    // ── Merge ────────────────────────────────────────────────────────────
    let merged = merge(batch_out.resolved, retry_out.recovered, retry_out.unresolved);

    if let Some(ref cb) = config.progress_callback {
        match &merged {
            Ok(m) => cb.on_extraction_complete(m.pages.len(), &m.unresolved),
            Err(PdfChatError::NoTextExtracted { unresolved }) => {
                cb.on_extraction_complete(0, unresolved)
            }
            Err(_) => {}
        }
    }
    let merged = merged?;

    let stats = ExtractionStats {
        total_pages,
        batches: batch_out.batches,
        failed_batches: batch_out.failed_batches,
        retried_pages: retry_out.attempted,
        resolved_pages: merged.pages.len(),
        unresolved_pages: merged.unresolved.len(),
        render_duration_ms,
        extraction_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Extraction complete: {}/{} pages, {} unresolved, {}ms total",
        stats.resolved_pages, total_pages, stats.unresolved_pages, stats.total_duration_ms
    );

    Ok(DocumentText {
        fingerprint,
        total_pages,
        pages: merged.pages,
        unresolved: merged.unresolved,
        from_cache: false,
        stats: Some(stats),
    })
}
