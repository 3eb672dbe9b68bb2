//! Structured completion on top of a streaming provider
//!
//! The provider returns raw text. The model is asked for a JSON object
//! matching [`CompletionReply`]; anything else is kept as plain reply text.

use crate::provider::{collect_text, LlmError, LlmProvider, LlmResult};
use crate::types::{LlmRequest, DEFAULT_MAX_TOKENS};
use compass_core::{CompletionReply, CompletionRequest};
use std::sync::Arc;
use tracing::{debug, warn};

/// The external completion contract the turn pipeline calls.
#[async_trait::async_trait]
pub trait CompletionService: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> LlmResult<CompletionReply>;
}

/// [`CompletionService`] over any [`LlmProvider`].
pub struct ProviderCompletion {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl ProviderCompletion {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn from_config(provider: Arc<dyn LlmProvider>, config: &compass_core::config::CompletionConfig) -> Self {
        Self::new(provider, config.model.clone())
            .with_max_tokens(config.max_tokens)
            .with_temperature(config.temperature)
    }

    pub fn build_request(&self, request: &CompletionRequest) -> LlmResult<LlmRequest> {
        let body = serde_json::json!({
            "payload": request.payload,
            "hint": request.hint,
        });
        let content = serde_json::to_string(&body)
            .map_err(|e| LlmError::RequestFailed(format!("payload encode: {}", e)))?;

        Ok(LlmRequest::turn(self.model.clone(), request.system_prompt.clone(), content)
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature))
    }
}

#[async_trait::async_trait]
impl CompletionService for ProviderCompletion {
    fn name(&self) -> &str {
        self.provider.name()
    }

    async fn complete(&self, request: CompletionRequest) -> LlmResult<CompletionReply> {
        let llm_request = self.build_request(&request)?;
        let stream = self.provider.complete_stream(llm_request).await?;
        let collected = collect_text(stream).await?;
        debug!(
            provider = self.provider.name(),
            stop_reason = collected.stop_reason.as_deref().unwrap_or("-"),
            output_tokens = collected.usage.map(|u| u.output_tokens).unwrap_or(0),
            total_tokens = collected.usage.map(|u| u.total()).unwrap_or(0),
            "completion finished"
        );

        let raw = collected.text;
        if raw.trim().is_empty() {
            return Err(LlmError::InvalidResponse("empty completion".into()));
        }
        Ok(parse_reply(&raw))
    }
}

/// Parse raw model output into a reply. Accepts a bare JSON object or one
/// wrapped in a ``` fence; anything else becomes the reply text verbatim.
pub fn parse_reply(raw: &str) -> CompletionReply {
    let trimmed = raw.trim();
    let body = strip_fence(trimmed).unwrap_or(trimmed);

    if body.starts_with('{') {
        match serde_json::from_str::<CompletionReply>(body) {
            Ok(reply) => return reply,
            Err(e) => warn!("completion looked like JSON but did not parse: {}", e),
        }
    }
    CompletionReply::text(trimmed)
}

fn strip_fence(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("```")?;
    let rest = rest.strip_suffix("```")?;
    // Drop an optional language tag on the opening line.
    let start = rest.find('\n').map(|i| i + 1).unwrap_or(0);
    Some(rest[start..].trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fence_with_language_tag() {
        assert_eq!(strip_fence("```json\n{\"text\":\"x\"}\n```"), Some("{\"text\":\"x\"}"));
    }

    #[test]
    fn fence_without_tag() {
        assert_eq!(strip_fence("```\n{}\n```"), Some("{}"));
    }

    #[test]
    fn no_fence() {
        assert_eq!(strip_fence("{}"), None);
        assert_eq!(strip_fence("```unterminated"), None);
    }
}
