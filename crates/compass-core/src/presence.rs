//! Presence events: passive suggestions surfaced outside the main reply

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    #[default]
    Pending,
    Shown,
    Snoozed,
    Dismissed,
}

impl std::fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            PresenceStatus::Pending => f.write_str("pending"),
            PresenceStatus::Shown => f.write_str("shown"),
            PresenceStatus::Snoozed => f.write_str("snoozed"),
            PresenceStatus::Dismissed => f.write_str("dismissed"),
        }
    }
}

impl std::str::FromStr for PresenceStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(PresenceStatus::Pending),
            "shown" => Ok(PresenceStatus::Shown),
            "snoozed" => Ok(PresenceStatus::Snoozed),
            "dismissed" => Ok(PresenceStatus::Dismissed),
            _ => Err(format!("unknown presence status: {}", s)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PresenceEvent {
    pub id: String,
    pub topic: String,
    #[serde(default)]
    pub text: String,
    pub status: PresenceStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snoozed_until: Option<DateTime<Utc>>,
}

impl PresenceEvent {
    pub fn pending(topic: impl Into<String>, text: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            topic: topic.into(),
            text: text.into(),
            status: PresenceStatus::Pending,
            created_at,
            snoozed_until: None,
        }
    }
}

/// Per-topic state shared by every event of that topic.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PresenceTopicMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_until: Option<DateTime<Utc>>,
    /// Set once any event on the topic is dismissed; never cleared.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dismissed: bool,
}

impl PresenceTopicMeta {
    pub fn blocked_until(until: DateTime<Utc>) -> Self {
        Self {
            blocked_until: Some(until),
            dismissed: false,
        }
    }

    pub fn is_blocked(&self, now: DateTime<Utc>) -> bool {
        self.blocked_until.map(|until| until > now).unwrap_or(false)
    }
}

/// A proposed presence event, before throttling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PresenceSuggestion {
    pub topic: String,
    #[serde(default)]
    pub text: String,
}
