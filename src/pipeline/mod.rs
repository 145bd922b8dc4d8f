//! Pipeline stages for batch PDF text extraction.
//!
//! Each submodule implements exactly one step, so each can be tested with a
//! fake model and no PDF engine.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ batch ──▶ retry ──▶ merge
//! (validate) (pdfium)  (VLM, N pages) (VLM, 1 page) (page map)
//! ```
//!
//! 1. [`input`]  — validate the path (or download the URL) before any work
//! 2. [`render`] — rasterise every page and [`encode`] it as base64 PNG
//! 3. [`batch`]  — concurrent multi-page requests, parsed by [`parse`]
//! 4. [`retry`]  — one request per page the batch pass did not resolve
//! 5. [`merge`]  — combine both passes and clean the text ([`postprocess`])
//!
//! [`llm`] holds the extraction capability the batch and retry passes call.

pub mod batch;
pub mod encode;
pub mod input;
pub mod llm;
pub mod merge;
pub mod parse;
pub mod postprocess;
pub mod render;
pub mod retry;
