//! ScriptedProvider: deterministic completions for tests and offline runs
//!
//! Each call to `complete_stream` pops the next scripted behavior. Once the
//! script runs out, the default behavior repeats.

use crate::provider::{LlmError, LlmProvider, LlmResult, LlmStream};
use crate::types::{LlmRequest, StreamDelta, Usage};
use async_stream::stream;
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// What one scripted call produces.
#[derive(Clone, Debug)]
pub enum ScriptedBehavior {
    /// Stream this text, then finish.
    Text(String),
    /// Fail the call before any delta is produced.
    Error(String),
}

pub struct ScriptedProvider {
    behaviors: Mutex<VecDeque<ScriptedBehavior>>,
    default_behavior: ScriptedBehavior,
    call_count: Mutex<usize>,
    last_request: Mutex<Option<LlmRequest>>,
}

impl ScriptedProvider {
    /// Always answer with the same behavior.
    pub fn constant(behavior: ScriptedBehavior) -> Self {
        Self {
            behaviors: Mutex::new(VecDeque::new()),
            default_behavior: behavior,
            call_count: Mutex::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Answer with each behavior in turn.
    pub fn sequence(behaviors: Vec<ScriptedBehavior>) -> Self {
        Self {
            behaviors: Mutex::new(behaviors.into()),
            default_behavior: ScriptedBehavior::Text("(scripted: sequence exhausted)".into()),
            call_count: Mutex::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::constant(ScriptedBehavior::Text(text.into()))
    }

    pub async fn call_count(&self) -> usize {
        *self.call_count.lock().await
    }

    /// The most recent request seen, for asserting on prompts.
    pub async fn last_request(&self) -> Option<LlmRequest> {
        self.last_request.lock().await.clone()
    }

    async fn next_behavior(&self) -> ScriptedBehavior {
        *self.call_count.lock().await += 1;
        self.behaviors
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| self.default_behavior.clone())
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str { "scripted" }

    fn models(&self) -> &[&str] { &["scripted"] }

    fn supports_model(&self, _model: &str) -> bool { true }

    async fn complete_stream(&self, request: LlmRequest) -> LlmResult<LlmStream> {
        *self.last_request.lock().await = Some(request);

        let text = match self.next_behavior().await {
            ScriptedBehavior::Text(text) => text,
            ScriptedBehavior::Error(msg) => return Err(LlmError::RequestFailed(msg)),
        };

        Ok(Box::pin(stream! {
            // Stream in small chunks like a real provider, on char boundaries.
            let chars: Vec<char> = text.chars().collect();
            for chunk in chars.chunks(20) {
                yield Ok(StreamDelta::Text(chunk.iter().collect()));
            }
            yield Ok(StreamDelta::Done {
                stop_reason: Some("end_turn".into()),
                usage: Some(Usage { input_tokens: 0, output_tokens: chars.len() as u32 }),
            });
        }))
    }
}
