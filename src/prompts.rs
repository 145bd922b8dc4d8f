//! Prompts for page extraction and document chat.
//!
//! Every instruction sent to the model lives here so that the retry and
//! parsing code never embeds prompt text. The extraction prompts ask for a
//! strict JSON object keyed by absolute page number; the parser in
//! [`crate::pipeline::parse`] is written against exactly that shape.

use crate::output::PageTextMap;

/// System prompt for every extraction call (batch and single page).
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are a precise OCR engine. You receive one or more images, each showing one page of a PDF document, in page order.

Rules:
1. Transcribe ALL visible text of each page, in natural reading order.
2. Keep paragraph breaks as blank lines. Keep list markers and table cells as plain text.
3. Do not summarise, translate, or correct the text.
4. Ignore purely decorative elements.
5. Answer with ONE JSON object and nothing else: no prose, no code fences.
   Keys are page numbers as strings, values are the page text as strings.
   Example: {"3": "text of page 3", "4": "text of page 4"}"#;

/// Instruction for a batch of consecutive pages `first..=last`.
pub fn batch_instruction(first: usize, last: usize) -> String {
    if first == last {
        return page_instruction(first);
    }
    let keys: Vec<String> = (first..=last).map(|p| format!("\"{p}\"")).collect();
    format!(
        "The {count} images are pages {first} to {last} of the document, in order. \
         Return a JSON object with exactly these keys: {keys}. \
         Each value is the full extracted text of that page.",
        count = last - first + 1,
        keys = keys.join(", "),
    )
}

/// Instruction for re-extracting exactly one page.
pub fn page_instruction(page: usize) -> String {
    format!(
        "The image is page {page} of the document. \
         Return a JSON object with exactly one key, \"{page}\", \
         whose value is the full extracted text of the page."
    )
}

/// Default system prompt for answering questions about a document.
pub const DEFAULT_CHAT_SYSTEM_PROMPT: &str = r#"You are a helpful assistant answering questions about a PDF document.
Use only the document text provided below. If the answer is not in the document, say so.
When you quote or rely on a specific page, mention its page number."#;

/// Render the extracted document as a context block for chat.
///
/// Pages are emitted in ascending order with a `[Page N]` marker so the
/// model can cite them. Unresolved pages are listed so the model does not
/// claim they are empty.
pub fn document_context(pages: &PageTextMap, unresolved: &[usize]) -> String {
    let mut out = String::from("DOCUMENT TEXT:\n");
    for (page, text) in pages {
        out.push_str(&format!("\n[Page {page}]\n{}\n", text.trim_end()));
    }
    if !unresolved.is_empty() {
        let list: Vec<String> = unresolved.iter().map(|p| p.to_string()).collect();
        out.push_str(&format!(
            "\n(Text for pages {} could not be extracted.)\n",
            list.join(", ")
        ));
    }
    out
}
