//! Compass LLM - Completion service contract and provider adapters

pub mod anthropic;
pub mod completion;
pub mod provider;
pub mod scripted;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use completion::{parse_reply, CompletionService, ProviderCompletion};
pub use provider::{collect_text, Collected, LlmError, LlmProvider, LlmResult, LlmStream};
pub use scripted::{ScriptedBehavior, ScriptedProvider};
pub use types::*;
