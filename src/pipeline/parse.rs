//! Parsing of free-form model answers into page text.
//!
//! The extraction prompt asks for a bare JSON object keyed by page number,
//! but nothing enforces it. One surrounding code fence is stripped; anything
//! else that is not a JSON object fails the whole answer, and a partially
//! valid body is never salvaged. A failed batch is retried page by page.

use crate::error::ExtractionFailure;
use crate::output::PageTextMap;
use crate::pipeline::batch::Batch;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

static RE_CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*[ \t]*\n?(.*?)\n?[ \t]*```$").unwrap());

/// Remove one surrounding code fence (```` ```json … ``` ````), if present.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    match RE_CODE_FENCE.captures(trimmed) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str().trim()),
        None => trimmed,
    }
}

/// Parse a raw answer into a JSON object.
pub fn parse_object(raw: &str) -> Result<Map<String, Value>, ExtractionFailure> {
    let body = strip_code_fences(raw);
    if body.is_empty() {
        return Err(ExtractionFailure::EmptyResponse);
    }
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ExtractionFailure::NotAnObject),
        Err(e) => Err(ExtractionFailure::InvalidJson {
            detail: e.to_string(),
        }),
    }
}

/// Parse a batch answer, keeping only string values whose key is a page of
/// `batch`.
///
/// Pages of the batch that are missing from a valid object are simply absent
/// from the returned map; the caller moves them to the skipped set.
pub fn parse_batch_response(raw: &str, batch: &Batch) -> Result<PageTextMap, ExtractionFailure> {
    let object = parse_object(raw)?;
    let mut pages = PageTextMap::new();
    for (key, value) in object {
        let Some(page) = parse_page_key(&key) else {
            debug!("Batch {}: ignoring non-numeric key {:?}", batch, key);
            continue;
        };
        if !batch.contains(page) {
            debug!("Batch {}: ignoring out-of-range page {}", batch, page);
            continue;
        }
        match value {
            Value::String(text) => {
                pages.insert(page, text);
            }
            other => debug!(
                "Batch {}: page {} has non-string value ({})",
                batch,
                page,
                json_type(&other)
            ),
        }
    }
    Ok(pages)
}

/// Parse a single-page answer; the object must carry a string for `page`.
pub fn parse_page_response(raw: &str, page: usize) -> Result<String, ExtractionFailure> {
    let object = parse_object(raw)?;
    object
        .into_iter()
        .find(|(key, _)| parse_page_key(key) == Some(page))
        .and_then(|(_, value)| match value {
            Value::String(text) => Some(text),
            _ => None,
        })
        .ok_or(ExtractionFailure::MissingPage { page })
}

fn parse_page_key(key: &str) -> Option<usize> {
    key.trim().parse::<usize>().ok().filter(|&p| p >= 1)
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
