//! # pdfchat
//!
//! Extract the text of a PDF with a Vision Language Model, cache it, and ask
//! questions about it.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Validate  non-empty path, .pdf extension, readable, size-bounded
//!  ├─ 2. Cache     MD5 of the content; fresh hit skips everything below
//!  ├─ 3. Render    rasterise every page via pdfium (spawn_blocking),
//!  │               downloading the engine on first use
//!  ├─ 4. Batch     pages in groups of 5, concurrent VLM calls, JSON answers
//!  ├─ 5. Retry     one call per page of any batch that failed to parse
//!  ├─ 6. Merge     page → text map + unresolved pages
//!  └─ 7. Chat      follow-up questions against the merged text
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfchat::{DocumentProcessor, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let processor = DocumentProcessor::new(ExtractionConfig::default())?;
//!     let session = processor.sessions().create();
//!
//!     let doc = processor.process_document("invoice.pdf", &session).await?;
//!     if doc.is_partial() {
//!         eprintln!("no text for pages {:?}", doc.unresolved);
//!     }
//!
//!     let answer = processor.ask(&session, "What is the total amount?").await?;
//!     println!("{answer}");
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfchat` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cache;
pub mod chat;
pub mod config;
pub mod engine;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod prompts;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cache::{fingerprint_bytes, CacheEntry, DocumentCache};
pub use chat::{ChatModel, LlmChat};
pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use error::{ErrorKind, ExtractionFailure, PdfChatError};
pub use output::{DocumentText, ExtractionStats, PageTextMap, ProcessResponse};
pub use pipeline::input::validate_pdf;
pub use pipeline::llm::{Extractor, VisionExtractor};
pub use pipeline::render::{PageImage, PdfiumRasterizer, Rasterizer};
pub use process::{extract_document, DocumentProcessor};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use session::{ChatTurn, Role, SessionStore};
