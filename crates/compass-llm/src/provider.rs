//! LLM Provider trait and stream draining

use crate::types::{LlmRequest, StreamDelta, Usage};
use futures::{Stream, StreamExt};
use std::pin::Pin;

/// Result type for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// LLM error types
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

impl LlmError {
    /// Failures a caller may retry later without changing the request.
    pub fn is_transient(&self) -> bool {
        matches!(self, LlmError::RateLimited { .. } | LlmError::NetworkError(_))
    }
}

impl From<LlmError> for compass_core::Error {
    fn from(e: LlmError) -> Self {
        compass_core::Error::completion("llm", e.to_string())
    }
}

/// Stream type for LLM responses
pub type LlmStream = Pin<Box<dyn Stream<Item = LlmResult<StreamDelta>> + Send>>;

/// LLM Provider trait
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;
    fn models(&self) -> &[&str];

    fn supports_model(&self, model: &str) -> bool {
        self.models()
            .iter()
            .any(|m| *m == model || model.starts_with(m))
    }

    /// Stream a completion response.
    async fn complete_stream(&self, request: LlmRequest) -> LlmResult<LlmStream>;
}

/// A fully drained completion stream.
#[derive(Clone, Debug, Default)]
pub struct Collected {
    pub text: String,
    pub stop_reason: Option<String>,
    pub usage: Option<Usage>,
}

/// Drain `stream` into one string. Stops at `Done`; an in-band error event
/// fails the whole completion.
pub async fn collect_text(mut stream: LlmStream) -> LlmResult<Collected> {
    let mut out = Collected::default();
    while let Some(delta) = stream.next().await {
        match delta? {
            StreamDelta::Text(text) => out.text.push_str(&text),
            StreamDelta::Done { stop_reason, usage } => {
                out.stop_reason = stop_reason;
                out.usage = usage;
                break;
            }
            StreamDelta::Error(e) => return Err(LlmError::StreamError(e)),
        }
    }
    Ok(out)
}
