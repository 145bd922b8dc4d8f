//! Configuration for document extraction and chat.
//!
//! All behaviour is controlled through one immutable [`ExtractionConfig`],
//! built via [`ExtractionConfigBuilder`] and passed into every pipeline run.
//! Changing a setting (model, endpoint, batch size) means building a new
//! config value; nothing here is mutated behind a running pipeline.

use crate::error::PdfChatError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Default number of pages sent to the VLM in one batch request.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Default cache time-to-live in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Configuration for extracting text from a PDF and chatting about it.
///
/// # Example
/// ```rust
/// use pdfchat::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .batch_size(5)
///     .concurrency(4)
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Maximum pages per batch request. Range: 1–20. Default: 5.
    ///
    /// Several pages per request amortise the prompt overhead; too many and
    /// the model starts truncating or merging pages in its JSON answer.
    pub batch_size: usize,

    /// Maximum number of extraction calls in flight at once. Default: 4.
    ///
    /// Applies to the batch pass and the retry pass alike, so the number of
    /// simultaneous API calls never grows with the page count.
    pub concurrency: usize,

    /// Seconds a cached extraction stays valid. Default: 3600.
    pub cache_ttl_secs: u64,

    /// Largest accepted PDF in megabytes. Default: 50.
    pub max_file_size_mb: u64,

    /// LLM model identifier, e.g. "gpt-4.1-mini".
    /// If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for extraction calls. Default: 0.1.
    pub temperature: f32,

    /// Sampling temperature for chat answers. Default: 0.7.
    pub chat_temperature: f32,

    /// Maximum tokens the LLM may generate per extraction call. Default: 8192.
    ///
    /// A batch answer holds the text of every page in the batch, so this is
    /// sized for `batch_size` dense pages rather than one.
    pub max_tokens: usize,

    /// Transport-level retries inside a single extraction call. Default: 2.
    ///
    /// These cover 429/5xx blips. They are separate from the page-level
    /// retry pass, which re-asks for pages whose answer could not be parsed.
    pub max_retries: u32,

    /// Initial transport retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-extraction-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Custom chat system prompt. If None, uses built-in default.
    pub chat_system_prompt: Option<String>,

    /// Receives batch and retry events while a document is processed.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: 4,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            max_file_size_mb: 50,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            chat_temperature: 0.7,
            max_tokens: 8192,
            max_retries: 2,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            download_timeout_secs: 120,
            max_rendered_pixels: 2000,
            password: None,
            chat_system_prompt: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("batch_size", &self.batch_size)
            .field("concurrency", &self.concurrency)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("max_file_size_mb", &self.max_file_size_mb)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("chat_temperature", &self.chat_temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn callback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Cache TTL as a chrono duration.
    ///
    /// TTLs beyond what chrono can represent saturate to `Duration::MAX`.
    pub fn cache_ttl(&self) -> chrono::Duration {
        i64::try_from(self.cache_ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    /// Return a copy of this config that uses `provider` for every call.
    pub fn with_provider(&self, provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider: Some(provider),
            ..self.clone()
        }
    }
}

/// Builder for [`ExtractionConfig`].
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl fmt::Debug for ExtractionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ExtractionConfigBuilder {
    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.batch_size = n.clamp(1, 20);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn cache_ttl_secs(mut self, secs: u64) -> Self {
        self.config.cache_ttl_secs = secs;
        self
    }

    pub fn max_file_size_mb(mut self, mb: u64) -> Self {
        self.config.max_file_size_mb = mb;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn chat_temperature(mut self, t: f32) -> Self {
        self.config.chat_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn chat_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.chat_system_prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, PdfChatError> {
        let c = &self.config;
        if c.batch_size == 0 {
            return Err(PdfChatError::InvalidConfig(
                "Batch size must be ≥ 1".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(PdfChatError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.max_file_size_mb == 0 {
            return Err(PdfChatError::InvalidConfig(
                "Maximum file size must be ≥ 1 MB".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(PdfChatError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ExtractionConfig::default();
        assert_eq!(c.batch_size, 5);
        assert_eq!(c.cache_ttl_secs, 3600);
        assert_eq!(c.cache_ttl(), chrono::Duration::seconds(3600));
        assert!(c.provider.is_none());
    }

    #[test]
    fn builder_clamps_out_of_range_values() {
        let c = ExtractionConfig::builder()
            .batch_size(0)
            .concurrency(0)
            .temperature(5.0)
            .build()
            .unwrap();
        assert_eq!(c.batch_size, 1);
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.temperature, 2.0);

        let c = ExtractionConfig::builder().batch_size(500).build().unwrap();
        assert_eq!(c.batch_size, 20);
    }

    #[test]
    fn huge_ttl_saturates_instead_of_panicking() {
        let c = ExtractionConfig::builder()
            .cache_ttl_secs(u64::MAX)
            .build()
            .unwrap();
        assert_eq!(c.cache_ttl(), chrono::Duration::MAX);

        let c = ExtractionConfig::builder()
            .cache_ttl_secs(i64::MAX as u64)
            .build()
            .unwrap();
        assert_eq!(c.cache_ttl(), chrono::Duration::MAX);
    }

    #[test]
    fn builder_rejects_zero_file_size() {
        let err = ExtractionConfig::builder()
            .max_file_size_mb(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, PdfChatError::InvalidConfig(_)));
    }

    #[test]
    fn debug_redacts_password() {
        let c = ExtractionConfig::builder()
            .password("hunter2")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }
}
