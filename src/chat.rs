//! Follow-up questions against an extracted document.
//!
//! Each question is sent together with the whole session transcript and the
//! document text as context. [`ChatModel`] is the seam to the model, kept
//! separate from [`crate::pipeline::llm::Extractor`] because chat is plain
//! text-in / text-out with its own sampling settings.

use crate::config::ExtractionConfig;
use crate::error::PdfChatError;
use crate::prompts::{document_context, DEFAULT_CHAT_SYSTEM_PROMPT};
use crate::session::{ChatTurn, Role, SessionDocument};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use tracing::debug;

/// Produces the assistant's next turn.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// `system` holds instructions and document context; `turns` is the
    /// conversation so far, ending with the user's question.
    async fn reply(&self, system: &str, turns: &[ChatTurn]) -> Result<String, PdfChatError>;
}

/// [`ChatModel`] backed by an `edgequake_llm` provider.
pub struct LlmChat {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl LlmChat {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractionConfig) -> Self {
        Self {
            provider,
            options: CompletionOptions {
                temperature: Some(config.chat_temperature),
                max_tokens: Some(config.max_tokens),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl ChatModel for LlmChat {
    async fn reply(&self, system: &str, turns: &[ChatTurn]) -> Result<String, PdfChatError> {
        let mut messages = Vec::with_capacity(turns.len() + 1);
        messages.push(ChatMessage::system(system));
        for turn in turns {
            messages.push(match turn.role {
                Role::User => ChatMessage::user(turn.content.as_str()),
                Role::Assistant => ChatMessage::assistant(turn.content.as_str()),
            });
        }

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| PdfChatError::LlmApiError {
                message: e.to_string(),
            })?;
        debug!(
            "Chat reply: {} input tokens, {} output tokens",
            response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Build the system message for a session's document.
pub fn system_message(config: &ExtractionConfig, document: &SessionDocument) -> String {
    let instructions = config
        .chat_system_prompt
        .as_deref()
        .unwrap_or(DEFAULT_CHAT_SYSTEM_PROMPT);
    format!(
        "{}\n\n{}",
        instructions,
        document_context(&document.pages, &document.unresolved)
    )
}

/// Ask `question` about `document`, given the prior `history`.
///
/// Returns the assistant's answer; the caller records both turns.
pub async fn answer(
    model: &dyn ChatModel,
    config: &ExtractionConfig,
    document: &SessionDocument,
    history: &[ChatTurn],
    question: &str,
) -> Result<String, PdfChatError> {
    let system = system_message(config, document);
    let mut turns = history.to_vec();
    turns.push(ChatTurn::user(question));
    model.reply(&system, &turns).await
}
