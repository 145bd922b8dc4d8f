//! The extraction capability: page images + instruction in, raw text out.
//!
//! [`Extractor`] is the seam between the pipeline and the model. The batch
//! and retry passes only ever see `extract(images, instruction) -> text`;
//! they parse the text themselves and never assume the model honoured the
//! requested JSON shape.
//!
//! [`VisionExtractor`] implements it over any `edgequake_llm` provider and
//! owns the transport concerns: a per-call timeout and exponential backoff
//! on transient API errors (`retry_backoff_ms * 2^attempt`, so 500 ms → 1 s
//! → 2 s with the defaults). Those retries are invisible to the pipeline; a
//! call that still fails is reported as one [`ExtractionFailure`] and the
//! affected pages go through the page-level retry pass.

use crate::config::ExtractionConfig;
use crate::error::{ExtractionFailure, PdfChatError};
use crate::prompts::EXTRACTION_SYSTEM_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Default model when the caller names a provider but no model.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Sends page images with an instruction and returns the model's raw answer.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(
        &self,
        images: Vec<ImageData>,
        instruction: &str,
    ) -> Result<String, ExtractionFailure>;
}

/// [`Extractor`] backed by a vision-capable LLM provider.
pub struct VisionExtractor {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout_secs: u64,
}

impl VisionExtractor {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractionConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout_secs: config.api_timeout_secs,
        }
    }
}

#[async_trait]
impl Extractor for VisionExtractor {
    async fn extract(
        &self,
        images: Vec<ImageData>,
        instruction: &str,
    ) -> Result<String, ExtractionFailure> {
        let start = Instant::now();
        let image_count = images.len();
        let messages = vec![
            ChatMessage::system(EXTRACTION_SYSTEM_PROMPT),
            ChatMessage::user_with_images(instruction, images),
        ];
        let call_timeout = Duration::from_secs(self.api_timeout_secs.max(1));

        let mut last_err = ExtractionFailure::Transport {
            retries: 0,
            detail: "no attempt made".to_string(),
        };

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "Extraction retry {}/{} after {}ms",
                    attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match timeout(call_timeout, self.provider.chat(&messages, Some(&self.options))).await {
                Ok(Ok(response)) => {
                    debug!(
                        "Extracted {} images: {} input tokens, {} output tokens, {:?}",
                        image_count,
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(response.content);
                }
                Ok(Err(e)) => {
                    warn!("Extraction attempt {} failed: {}", attempt + 1, e);
                    last_err = ExtractionFailure::Transport {
                        retries: attempt,
                        detail: e.to_string(),
                    };
                }
                Err(_) => {
                    warn!(
                        "Extraction attempt {} timed out after {}s",
                        attempt + 1,
                        call_timeout.as_secs()
                    );
                    last_err = ExtractionFailure::Timeout {
                        secs: call_timeout.as_secs(),
                    };
                }
            }
        }

        Err(last_err)
    }
}

/// Build `CompletionOptions` for extraction calls.
fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Instantiate a named provider with the given model.
fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, PdfChatError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        PdfChatError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Full auto-detection** via `ProviderFactory::from_env`.
pub fn resolve_provider(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, PdfChatError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| PdfChatError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
