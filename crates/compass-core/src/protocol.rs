//! Turn and completion contracts
//!
//! Turn input (validated before the pipeline runs):
//!   { "user_id": "u-1", "message": "I keep putting off my taxes" }
//!
//! Completion request carries the intervention hint; the reply is structured:
//!   { "text": "...", "actions": [...], "tasks": [...], "new_facts": [...], "presence": {...} }

use crate::error::{Error, Result};
use crate::facts::FactCandidate;
use crate::presence::PresenceSuggestion;
use crate::types::{InterventionLevel, ReasonCode, UserId};
use serde::{Deserialize, Serialize};

/// Longest message the core accepts.
pub const MAX_MESSAGE_CHARS: usize = 16_000;

// ---------------------------------------------------------------------------
// Turn input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRequest {
    pub user_id: String,
    pub message: String,
}

impl TurnRequest {
    pub fn new(user_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            message: message.into(),
        }
    }

    /// Reject missing or malformed fields before anything else runs.
    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(Error::invalid_turn("user_id is required"));
        }
        if self.user_id.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(Error::invalid_turn("user_id must not contain whitespace"));
        }
        if self.message.trim().is_empty() {
            return Err(Error::invalid_turn("message is required"));
        }
        if self.message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(Error::invalid_turn(format!(
                "message exceeds {} chars",
                MAX_MESSAGE_CHARS
            )));
        }
        Ok(())
    }

    pub fn user(&self) -> UserId {
        UserId::new(self.user_id.trim())
    }
}

// ---------------------------------------------------------------------------
// Completion contract
// ---------------------------------------------------------------------------

/// Constraint passed to the completion service. Purely advisory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionHint {
    pub level: InterventionLevel,
    pub reason_codes: Vec<ReasonCode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub payload: serde_json::Value,
    pub hint: InterventionHint,
}

/// An action the model proposes for the client to perform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedAction {
    pub kind: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// A task the model proposes to add to the user's list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedTask {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<String>,
    /// Set when the model tries to schedule execution itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<String>,
    #[serde(default)]
    pub autonomous: bool,
}

impl ProposedTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            due: None,
            run_at: None,
            recurrence: None,
            autonomous: false,
        }
    }
}

/// Structured completion output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionReply {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub actions: Vec<ProposedAction>,
    #[serde(default)]
    pub tasks: Vec<ProposedTask>,
    #[serde(default)]
    pub new_facts: Vec<FactCandidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence: Option<PresenceSuggestion>,
}

impl CompletionReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Whether the reply proposes anything beyond its text.
    pub fn has_side_effects(&self) -> bool {
        !self.actions.is_empty()
            || !self.tasks.is_empty()
            || !self.new_facts.is_empty()
            || self.presence.is_some()
    }
}
