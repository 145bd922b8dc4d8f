//! Integration tests for the extraction pipeline with scripted fakes.
//!
//! A fake rasteriser hands out N blank page images and a scripted extractor
//! answers batch and retry requests, so the whole flow from validation to
//! chat runs without pdfium or network access.

use async_trait::async_trait;
use edgequake_llm::ImageData;
use pdfchat::pipeline::batch::Batch;
use pdfchat::{
    ChatModel, ChatTurn, DocumentProcessor, DocumentText, ErrorKind, ExtractionConfig,
    ExtractionFailure, ExtractionProgressCallback, Extractor, PageImage, PdfChatError,
    ProcessResponse, Rasterizer, Role,
};
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

// ── Fakes ────────────────────────────────────────────────────────────────────

struct FakeRasterizer {
    pages: usize,
    calls: AtomicUsize,
}

impl FakeRasterizer {
    fn new(pages: usize) -> Arc<Self> {
        Arc::new(Self {
            pages,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Rasterizer for FakeRasterizer {
    async fn rasterize(&self, _pdf_path: &Path) -> Result<Vec<PageImage>, PdfChatError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((1..=self.pages)
            .map(|page_num| PageImage {
                page_num,
                image: ImageData::new("AAAA".to_string(), "image/png"),
            })
            .collect())
    }
}

/// Rejects every document as corrupt.
#[derive(Default)]
struct CorruptPdfRasterizer {
    calls: AtomicUsize,
}

#[async_trait]
impl Rasterizer for CorruptPdfRasterizer {
    async fn rasterize(&self, pdf_path: &Path) -> Result<Vec<PageImage>, PdfChatError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(PdfChatError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: "xref table not found".into(),
        })
    }
}

/// Answers extraction requests according to a script.
///
/// A single-page request for a page that was already requested is treated as
/// a retry; everything else belongs to the batch pass.
#[derive(Default)]
struct ScriptedExtractor {
    /// First page of batches that get an unparseable answer.
    garbage_batches: HashSet<usize>,
    /// First page of batches whose call fails outright.
    erroring_batches: HashSet<usize>,
    /// Pages left out of an otherwise valid batch answer.
    omitted_pages: HashSet<usize>,
    /// Pages whose retry answer lacks the requested key.
    failing_retries: HashSet<usize>,
    /// Artificial latency per call.
    delay: Option<Duration>,

    seen: Mutex<HashSet<usize>>,
    batch_calls: AtomicUsize,
    retry_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

static RE_RANGE: once_cell::sync::Lazy<Regex> =
    once_cell::sync::Lazy::new(|| Regex::new(r"pages (\d+) to (\d+)").unwrap());
static RE_PAGE: once_cell::sync::Lazy<Regex> =
    once_cell::sync::Lazy::new(|| Regex::new(r"page (\d+) of").unwrap());

fn requested_pages(instruction: &str) -> (usize, usize) {
    if let Some(c) = RE_RANGE.captures(instruction) {
        return (c[1].parse().unwrap(), c[2].parse().unwrap());
    }
    let c = RE_PAGE
        .captures(instruction)
        .unwrap_or_else(|| panic!("unexpected instruction: {instruction}"));
    let page = c[1].parse().unwrap();
    (page, page)
}

fn page_text(page: usize) -> String {
    format!("Text of page {page}")
}

impl ScriptedExtractor {
    fn answer(&self, first: usize, last: usize) -> Result<String, ExtractionFailure> {
        let is_retry = {
            let mut seen = self.seen.lock().unwrap();
            let retry = first == last && seen.contains(&first);
            seen.extend(first..=last);
            retry
        };

        if is_retry {
            self.retry_calls.fetch_add(1, Ordering::SeqCst);
            if self.failing_retries.contains(&first) {
                return Ok(r#"{"999": "some other page"}"#.to_string());
            }
            return Ok(format!(r#"{{"{first}": "{}"}}"#, page_text(first)));
        }

        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if self.erroring_batches.contains(&first) {
            return Err(ExtractionFailure::Timeout { secs: 1 });
        }
        if self.garbage_batches.contains(&first) {
            return Ok("Sorry, I cannot read these pages.".to_string());
        }
        let mut obj = serde_json::Map::new();
        for page in first..=last {
            if !self.omitted_pages.contains(&page) {
                obj.insert(page.to_string(), page_text(page).into());
            }
        }
        Ok(format!(
            "```json\n{}\n```",
            serde_json::Value::Object(obj)
        ))
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    async fn extract(
        &self,
        images: Vec<ImageData>,
        instruction: &str,
    ) -> Result<String, ExtractionFailure> {
        let (first, last) = requested_pages(instruction);
        assert_eq!(images.len(), last - first + 1, "one image per page");

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let result = self.answer(first, last);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Records the prompt it was given and answers with the turn count.
#[derive(Default)]
struct RecordingChat {
    systems: Mutex<Vec<String>>,
}

#[async_trait]
impl ChatModel for RecordingChat {
    async fn reply(&self, system: &str, turns: &[ChatTurn]) -> Result<String, PdfChatError> {
        self.systems.lock().unwrap().push(system.to_string());
        let last = turns.last().map(|t| t.content.clone()).unwrap_or_default();
        Ok(format!("answer #{} to: {last}", turns.len() / 2 + 1))
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

struct Harness {
    processor: DocumentProcessor,
    rasterizer: Arc<FakeRasterizer>,
    extractor: Arc<ScriptedExtractor>,
    chat: Arc<RecordingChat>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn harness(pages: usize, extractor: ScriptedExtractor, config: ExtractionConfig) -> Harness {
    init_tracing();
    let rasterizer = FakeRasterizer::new(pages);
    let extractor = Arc::new(extractor);
    let chat = Arc::new(RecordingChat::default());
    let processor = DocumentProcessor::from_parts(
        config,
        rasterizer.clone(),
        extractor.clone(),
        chat.clone(),
    );
    Harness {
        processor,
        rasterizer,
        extractor,
        chat,
    }
}

fn write_pdf(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn sample_pdf(dir: &TempDir) -> String {
    write_pdf(dir, "sample.pdf", b"%PDF-1.7 sample document")
        .to_string_lossy()
        .into_owned()
}

// ── Batch + retry flow ───────────────────────────────────────────────────────

#[tokio::test]
async fn twelve_pages_with_one_failed_batch_leaves_only_page_eight_unresolved() {
    let dir = TempDir::new().unwrap();
    let h = harness(
        12,
        ScriptedExtractor {
            garbage_batches: HashSet::from([6]),
            failing_retries: HashSet::from([8]),
            ..Default::default()
        },
        ExtractionConfig::default(),
    );
    let session = h.processor.sessions().create();

    let doc = h
        .processor
        .process_document(&sample_pdf(&dir), &session)
        .await
        .unwrap();

    assert_eq!(doc.total_pages, 12);
    assert_eq!(doc.unresolved, vec![8]);
    assert!(doc.is_partial());
    let resolved: Vec<usize> = doc.pages.keys().copied().collect();
    assert_eq!(resolved, vec![1, 2, 3, 4, 5, 6, 7, 9, 10, 11, 12]);
    assert_eq!(doc.pages[&6], "Text of page 6");

    // [1-5], [6-10], [11-12], then one retry per page of [6-10].
    assert_eq!(h.extractor.batch_calls.load(Ordering::SeqCst), 3);
    assert_eq!(h.extractor.retry_calls.load(Ordering::SeqCst), 5);

    let stats = doc.stats.unwrap();
    assert_eq!(stats.batches, 3);
    assert_eq!(stats.failed_batches, 1);
    assert_eq!(stats.retried_pages, 5);
    assert_eq!(stats.resolved_pages, 11);
}

#[tokio::test]
async fn clean_run_sends_no_retries_and_keeps_page_order() {
    let dir = TempDir::new().unwrap();
    let h = harness(7, ScriptedExtractor::default(), ExtractionConfig::default());
    let session = h.processor.sessions().create();

    let doc = h
        .processor
        .process_document(&sample_pdf(&dir), &session)
        .await
        .unwrap();

    assert!(doc.unresolved.is_empty());
    assert_eq!(h.extractor.batch_calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.extractor.retry_calls.load(Ordering::SeqCst), 0);
    let expected: Vec<String> = (1..=7).map(page_text).collect();
    assert_eq!(doc.text(), expected.join("\n\n"));
}

#[tokio::test]
async fn transport_failure_discards_whole_batch_then_retry_recovers() {
    let dir = TempDir::new().unwrap();
    let h = harness(
        10,
        ScriptedExtractor {
            erroring_batches: HashSet::from([1]),
            ..Default::default()
        },
        ExtractionConfig::default(),
    );
    let session = h.processor.sessions().create();

    let doc = h
        .processor
        .process_document(&sample_pdf(&dir), &session)
        .await
        .unwrap();

    assert!(doc.unresolved.is_empty());
    assert_eq!(doc.pages.len(), 10);
    assert_eq!(h.extractor.retry_calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn page_missing_from_valid_batch_answer_is_retried() {
    let dir = TempDir::new().unwrap();
    let h = harness(
        5,
        ScriptedExtractor {
            omitted_pages: HashSet::from([3]),
            ..Default::default()
        },
        ExtractionConfig::default(),
    );
    let session = h.processor.sessions().create();

    let doc = h
        .processor
        .process_document(&sample_pdf(&dir), &session)
        .await
        .unwrap();

    assert!(doc.unresolved.is_empty());
    assert_eq!(h.extractor.retry_calls.load(Ordering::SeqCst), 1);
    assert_eq!(doc.stats.unwrap().failed_batches, 0);
}

#[tokio::test]
async fn nothing_extracted_is_an_error_and_is_not_cached() {
    let dir = TempDir::new().unwrap();
    let h = harness(
        3,
        ScriptedExtractor {
            garbage_batches: HashSet::from([1]),
            failing_retries: HashSet::from([1, 2, 3]),
            ..Default::default()
        },
        ExtractionConfig::default(),
    );
    let session = h.processor.sessions().create();

    let err = h
        .processor
        .process_document(&sample_pdf(&dir), &session)
        .await
        .unwrap_err();

    match &err {
        PdfChatError::NoTextExtracted { unresolved } => assert_eq!(unresolved, &vec![1, 2, 3]),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::EmptyResult);
    assert!(h.processor.cache().is_empty());
    assert!(h.processor.sessions().document(&session).is_none());

    let result: Result<DocumentText, PdfChatError> = Err(err);
    let response = ProcessResponse::from(result);
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["kind"], "empty_result");
    assert!(json["error"].as_str().unwrap().contains("No text extracted"));
}

#[tokio::test]
async fn fan_out_respects_concurrency_limit() {
    let dir = TempDir::new().unwrap();
    let config = ExtractionConfig::builder()
        .batch_size(1)
        .concurrency(2)
        .build()
        .unwrap();
    let h = harness(
        12,
        ScriptedExtractor {
            delay: Some(Duration::from_millis(10)),
            ..Default::default()
        },
        config,
    );
    let session = h.processor.sessions().create();

    let doc = h
        .processor
        .process_document(&sample_pdf(&dir), &session)
        .await
        .unwrap();

    assert_eq!(doc.pages.len(), 12);
    assert_eq!(h.extractor.batch_calls.load(Ordering::SeqCst), 12);
    let peak = h.extractor.max_in_flight.load(Ordering::SeqCst);
    assert!(peak <= 2, "peak concurrency was {peak}");
}

#[tokio::test]
async fn rasterisation_failure_aborts_without_caching() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let rasterizer = Arc::new(CorruptPdfRasterizer::default());
    let extractor = Arc::new(ScriptedExtractor::default());
    let processor = DocumentProcessor::from_parts(
        ExtractionConfig::default(),
        rasterizer.clone(),
        extractor.clone(),
        Arc::new(RecordingChat::default()),
    );
    let session = processor.sessions().create();

    let err = processor
        .process_document(&sample_pdf(&dir), &session)
        .await
        .unwrap_err();

    assert!(matches!(err, PdfChatError::CorruptPdf { .. }), "got {err:?}");
    assert_eq!(err.kind(), ErrorKind::Rasterization);
    assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(extractor.batch_calls.load(Ordering::SeqCst), 0);
    assert_eq!(extractor.retry_calls.load(Ordering::SeqCst), 0);
    assert!(processor.cache().is_empty());
    assert!(processor.sessions().document(&session).is_none());
}

// ── Validation ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn invalid_inputs_never_reach_the_rasteriser() {
    let dir = TempDir::new().unwrap();
    let config = ExtractionConfig::builder()
        .max_file_size_mb(1)
        .build()
        .unwrap();
    let h = harness(3, ScriptedExtractor::default(), config);
    let session = h.processor.sessions().create();

    let txt = write_pdf(&dir, "notes.txt", b"hello");
    let empty = write_pdf(&dir, "empty.pdf", b"");
    let big = write_pdf(&dir, "big.pdf", &vec![b'x'; 1024 * 1024 + 1]);
    let missing = dir.path().join("missing.pdf");

    let cases = [
        (String::new(), "EmptyPath"),
        (txt.to_string_lossy().into_owned(), "NotPdfExtension"),
        (missing.to_string_lossy().into_owned(), "FileNotFound"),
        (empty.to_string_lossy().into_owned(), "EmptyFile"),
        (big.to_string_lossy().into_owned(), "FileTooLarge"),
    ];

    for (input, variant) in cases {
        let err = h
            .processor
            .process_document(&input, &session)
            .await
            .unwrap_err();
        assert!(
            format!("{err:?}").starts_with(variant),
            "input {input:?} gave {err:?}, expected {variant}"
        );
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    assert_eq!(h.rasterizer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.extractor.batch_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn uppercase_extension_is_accepted() {
    let dir = TempDir::new().unwrap();
    let path = write_pdf(&dir, "REPORT.PDF", b"%PDF-1.4");
    let h = harness(1, ScriptedExtractor::default(), ExtractionConfig::default());
    let session = h.processor.sessions().create();

    let doc = h
        .processor
        .process_document(&path.to_string_lossy(), &session)
        .await
        .unwrap();
    assert_eq!(doc.pages.len(), 1);
}

// ── Cache ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn fresh_cache_entry_skips_extraction_for_same_content() {
    let dir = TempDir::new().unwrap();
    let h = harness(6, ScriptedExtractor::default(), ExtractionConfig::default());
    let session = h.processor.sessions().create();

    let first = h
        .processor
        .process_document(&sample_pdf(&dir), &session)
        .await
        .unwrap();
    assert!(!first.from_cache);

    // Same bytes under another name share the fingerprint.
    let copy = write_pdf(&dir, "copy.pdf", b"%PDF-1.7 sample document");
    let second = h
        .processor
        .process_document(&copy.to_string_lossy(), &session)
        .await
        .unwrap();

    assert!(second.from_cache);
    assert!(second.stats.is_none());
    assert_eq!(second.pages, first.pages);
    assert_eq!(second.fingerprint, first.fingerprint);
    assert_eq!(h.rasterizer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.extractor.batch_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn partial_result_is_cached_with_its_unresolved_pages() {
    let dir = TempDir::new().unwrap();
    let h = harness(
        4,
        ScriptedExtractor {
            garbage_batches: HashSet::from([1]),
            failing_retries: HashSet::from([2]),
            ..Default::default()
        },
        ExtractionConfig::default(),
    );
    let session = h.processor.sessions().create();
    let pdf = sample_pdf(&dir);

    h.processor.process_document(&pdf, &session).await.unwrap();
    let cached = h.processor.process_document(&pdf, &session).await.unwrap();

    assert!(cached.from_cache);
    assert_eq!(cached.unresolved, vec![2]);
    assert_eq!(cached.total_pages, 4);
}

#[tokio::test]
async fn zero_ttl_reextracts_and_overwrites_entry() {
    let dir = TempDir::new().unwrap();
    let config = ExtractionConfig::builder().cache_ttl_secs(0).build().unwrap();
    let h = harness(2, ScriptedExtractor::default(), config);
    let session = h.processor.sessions().create();
    let pdf = sample_pdf(&dir);

    let first = h.processor.process_document(&pdf, &session).await.unwrap();
    let second = h.processor.process_document(&pdf, &session).await.unwrap();

    assert!(!second.from_cache);
    assert_eq!(h.rasterizer.calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.processor.cache().len(), 1);
    assert_eq!(first.fingerprint, second.fingerprint);
}

#[tokio::test]
async fn unbounded_ttl_serves_from_cache() {
    let dir = TempDir::new().unwrap();
    let config = ExtractionConfig::builder()
        .cache_ttl_secs(u64::MAX)
        .build()
        .unwrap();
    let h = harness(2, ScriptedExtractor::default(), config);
    let session = h.processor.sessions().create();
    let pdf = sample_pdf(&dir);

    h.processor.process_document(&pdf, &session).await.unwrap();
    let second = h.processor.process_document(&pdf, &session).await.unwrap();

    assert!(second.from_cache);
    assert_eq!(h.rasterizer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn documents_do_not_evict_each_other() {
    let dir = TempDir::new().unwrap();
    let h = harness(1, ScriptedExtractor::default(), ExtractionConfig::default());
    let session = h.processor.sessions().create();
    let a = write_pdf(&dir, "a.pdf", b"%PDF a");
    let b = write_pdf(&dir, "b.pdf", b"%PDF b");

    for path in [&a, &b, &a, &b] {
        h.processor
            .process_document(&path.to_string_lossy(), &session)
            .await
            .unwrap();
    }

    assert_eq!(h.processor.cache().len(), 2);
    assert_eq!(h.rasterizer.calls.load(Ordering::SeqCst), 2);
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct EventLog {
    started: Mutex<Option<(usize, usize)>>,
    failed: Mutex<Vec<Batch>>,
    retried: Mutex<BTreeSet<usize>>,
    completed: Mutex<Option<(usize, Vec<usize>)>>,
}

impl ExtractionProgressCallback for EventLog {
    fn on_extraction_start(&self, total_pages: usize, total_batches: usize) {
        *self.started.lock().unwrap() = Some((total_pages, total_batches));
    }
    fn on_batch_failed(&self, batch: &Batch, _error: &str) {
        self.failed.lock().unwrap().push(*batch);
    }
    fn on_page_retried(&self, page_num: usize, _success: bool) {
        self.retried.lock().unwrap().insert(page_num);
    }
    fn on_extraction_complete(&self, resolved: usize, unresolved: &[usize]) {
        *self.completed.lock().unwrap() = Some((resolved, unresolved.to_vec()));
    }
}

#[tokio::test]
async fn progress_callback_sees_every_stage() {
    let dir = TempDir::new().unwrap();
    let log = Arc::new(EventLog::default());
    let config = ExtractionConfig::builder()
        .progress_callback(log.clone())
        .build()
        .unwrap();
    let h = harness(
        8,
        ScriptedExtractor {
            garbage_batches: HashSet::from([6]),
            failing_retries: HashSet::from([7]),
            ..Default::default()
        },
        config,
    );
    let session = h.processor.sessions().create();

    h.processor
        .process_document(&sample_pdf(&dir), &session)
        .await
        .unwrap();

    assert_eq!(*log.started.lock().unwrap(), Some((8, 2)));
    assert_eq!(*log.failed.lock().unwrap(), vec![Batch::new(6, 9)]);
    assert_eq!(
        *log.retried.lock().unwrap(),
        BTreeSet::from([6, 7, 8])
    );
    assert_eq!(*log.completed.lock().unwrap(), Some((7, vec![7])));
}

// ── Chat ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ask_without_document_fails() {
    let h = harness(1, ScriptedExtractor::default(), ExtractionConfig::default());
    let session = h.processor.sessions().create();

    let err = h.processor.ask(&session, "Anything?").await.unwrap_err();
    assert!(matches!(err, PdfChatError::NoDocumentInSession { .. }));
    assert!(h.processor.sessions().transcript(&session).is_empty());
}

#[tokio::test]
async fn ask_builds_transcript_with_document_context() {
    let dir = TempDir::new().unwrap();
    let h = harness(
        3,
        ScriptedExtractor {
            garbage_batches: HashSet::from([1]),
            failing_retries: HashSet::from([3]),
            ..Default::default()
        },
        ExtractionConfig::default(),
    );
    let session = h.processor.sessions().create();
    h.processor
        .process_document(&sample_pdf(&dir), &session)
        .await
        .unwrap();

    let a1 = h.processor.ask(&session, "What is on page 1?").await.unwrap();
    let a2 = h.processor.ask(&session, "And page 2?").await.unwrap();
    assert_eq!(a1, "answer #1 to: What is on page 1?");
    assert_eq!(a2, "answer #2 to: And page 2?");

    let transcript = h.processor.sessions().transcript(&session);
    assert_eq!(transcript.len(), 4);
    assert_eq!(transcript[0].role, Role::User);
    assert_eq!(transcript[3].role, Role::Assistant);
    assert_eq!(transcript[3].content, a2);

    let systems = h.chat.systems.lock().unwrap();
    assert!(systems[0].contains("[Page 1]\nText of page 1"));
    assert!(systems[0].contains("[Page 2]\nText of page 2"));
    assert!(!systems[0].contains("[Page 3]"));
    assert!(systems[0].contains("could not be extracted"));
}

#[tokio::test]
async fn new_document_resets_transcript_and_clear_forgets_document() {
    let dir = TempDir::new().unwrap();
    let h = harness(1, ScriptedExtractor::default(), ExtractionConfig::default());
    let session = h.processor.sessions().create();
    let a = write_pdf(&dir, "a.pdf", b"%PDF a");
    let b = write_pdf(&dir, "b.pdf", b"%PDF b");

    h.processor
        .process_document(&a.to_string_lossy(), &session)
        .await
        .unwrap();
    h.processor.ask(&session, "q").await.unwrap();
    assert_eq!(h.processor.sessions().transcript(&session).len(), 2);

    // Same document again keeps the conversation.
    h.processor
        .process_document(&a.to_string_lossy(), &session)
        .await
        .unwrap();
    assert_eq!(h.processor.sessions().transcript(&session).len(), 2);

    h.processor
        .process_document(&b.to_string_lossy(), &session)
        .await
        .unwrap();
    assert!(h.processor.sessions().transcript(&session).is_empty());

    assert!(h.processor.clear_session(&session));
    let err = h.processor.ask(&session, "q").await.unwrap_err();
    assert!(matches!(err, PdfChatError::NoDocumentInSession { .. }));
}

#[tokio::test]
async fn sessions_are_isolated() {
    let dir = TempDir::new().unwrap();
    let h = harness(2, ScriptedExtractor::default(), ExtractionConfig::default());
    let s1 = h.processor.sessions().create();
    let s2 = h.processor.sessions().create();

    h.processor
        .process_document(&sample_pdf(&dir), &s1)
        .await
        .unwrap();
    h.processor.ask(&s1, "hello").await.unwrap();

    assert!(h.processor.sessions().transcript(&s2).is_empty());
    assert!(h.processor.ask(&s2, "hello").await.is_err());
}
