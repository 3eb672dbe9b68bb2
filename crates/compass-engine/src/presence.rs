//! Presence throttle: decides whether a side-channel suggestion surfaces
//!
//! Visibility is a filter over stored events, newest first. Emission adds
//! per-topic and per-user limits on top of it.

use chrono::{DateTime, Duration, Utc};
use compass_core::config::PresenceConfig;
use compass_core::{
    CompletionReply, PresenceEvent, PresenceStatus, PresenceSuggestion, PresenceTopicMeta,
    TriggerResult, TriggerTag, UserId,
};
use compass_store::PresenceStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub const DEFAULT_SCAN_WINDOW: usize = 50;

/// Whether `event` may be shown at `now`.
pub fn is_visible(event: &PresenceEvent, meta: Option<&PresenceTopicMeta>, now: DateTime<Utc>) -> bool {
    if meta.map(|m| m.is_blocked(now)).unwrap_or(false) {
        return false;
    }
    match event.status {
        PresenceStatus::Dismissed => false,
        // A snooze without a deadline holds until the user acts.
        PresenceStatus::Snoozed => event.snoozed_until.map(|until| until <= now).unwrap_or(false),
        PresenceStatus::Pending | PresenceStatus::Shown => true,
    }
}

/// First visible event in a most-recent-first list, scanning at most
/// [`DEFAULT_SCAN_WINDOW`] events.
pub fn latest_visible<'e>(
    events: &'e [PresenceEvent],
    metas: &HashMap<String, PresenceTopicMeta>,
    now: DateTime<Utc>,
) -> Option<&'e PresenceEvent> {
    latest_visible_within(events, metas, now, DEFAULT_SCAN_WINDOW)
}

pub fn latest_visible_within<'e>(
    events: &'e [PresenceEvent],
    metas: &HashMap<String, PresenceTopicMeta>,
    now: DateTime<Utc>,
    window: usize,
) -> Option<&'e PresenceEvent> {
    events
        .iter()
        .take(window)
        .find(|e| is_visible(e, metas.get(&e.topic), now))
}

/// Suggestion for this turn: the reply's own, else a check-in on the first trigger.
pub fn suggestion_for(reply: &CompletionReply, triggers: &TriggerResult) -> Option<PresenceSuggestion> {
    if let Some(s) = &reply.presence {
        return Some(s.clone());
    }
    let tag = triggers.triggers.first()?;
    Some(PresenceSuggestion {
        topic: tag.name().to_string(),
        text: check_in_text(*tag).to_string(),
    })
}

fn check_in_text(tag: TriggerTag) -> &'static str {
    match tag {
        TriggerTag::Crisis => "Checking in. Would it help to talk to someone you trust today?",
        TriggerTag::SelfDeprecation => "How are you feeling about yourself today?",
        TriggerTag::Overwhelm => "Want to pick just one small thing to focus on?",
        TriggerTag::Avoidance => "Ready to take a first small step on what you were putting off?",
        TriggerTag::Rumination => "Is that thought still looping? A short walk might help.",
        TriggerTag::AllOrNothing => "What is one thing that went okay recently?",
        TriggerTag::ImpulsiveSpending => "Want to look at this week's spending together?",
        TriggerTag::HelpRequest => "Did you find a way forward on what you asked about?",
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressReason {
    TopicBlocked,
    /// Dismissed events are never resurrected.
    TopicDismissed,
    /// The user snoozed this topic and the snooze has not elapsed.
    TopicSnoozed,
    AlreadyVisible,
    Cooldown,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "detail", rename_all = "snake_case")]
pub enum PresenceDecision {
    Skipped,
    Suppressed(SuppressReason),
    Emitted(PresenceEvent),
    Failed(String),
}

impl PresenceDecision {
    pub fn emitted(&self) -> Option<&PresenceEvent> {
        match self {
            PresenceDecision::Emitted(event) => Some(event),
            _ => None,
        }
    }
}

pub struct PresenceThrottle {
    cooldown: Duration,
    scan_window: usize,
}

impl Default for PresenceThrottle {
    fn default() -> Self {
        Self::new(&PresenceConfig::default())
    }
}

impl PresenceThrottle {
    pub fn new(config: &PresenceConfig) -> Self {
        Self {
            cooldown: Duration::seconds(config.cooldown_secs.max(0)),
            scan_window: config.scan_window,
        }
    }

    pub async fn decide<S: PresenceStore + ?Sized>(
        &self,
        store: &S,
        user: &UserId,
        suggestion: Option<&PresenceSuggestion>,
        now: DateTime<Utc>,
    ) -> PresenceDecision {
        let Some(suggestion) = suggestion else {
            return PresenceDecision::Skipped;
        };
        match self.try_decide(store, user, suggestion, now).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(user = %user, topic = %suggestion.topic, "presence store failed: {}", e);
                PresenceDecision::Failed(e.to_string())
            }
        }
    }

    async fn try_decide<S: PresenceStore + ?Sized>(
        &self,
        store: &S,
        user: &UserId,
        suggestion: &PresenceSuggestion,
        now: DateTime<Utc>,
    ) -> compass_store::StoreResult<PresenceDecision> {
        let topic = suggestion.topic.as_str();
        let suppressed = |reason: SuppressReason| -> compass_store::StoreResult<PresenceDecision> {
            debug!(user = %user, topic, ?reason, "presence suppressed");
            Ok(PresenceDecision::Suppressed(reason))
        };

        let meta = store.topic_meta(user, topic).await?;
        if meta.is_blocked(now) {
            return suppressed(SuppressReason::TopicBlocked);
        }

        if meta.dismissed {
            return suppressed(SuppressReason::TopicDismissed);
        }

        let events = store.recent_events(user, self.scan_window).await?;
        let same_topic: Vec<&PresenceEvent> = events.iter().filter(|e| e.topic == topic).collect();
        if same_topic.iter().any(|e| e.status == PresenceStatus::Dismissed) {
            return suppressed(SuppressReason::TopicDismissed);
        }
        if same_topic.iter().any(|e| is_visible(e, Some(&meta), now)) {
            return suppressed(SuppressReason::AlreadyVisible);
        }
        if same_topic.iter().any(|e| e.status == PresenceStatus::Snoozed) {
            return suppressed(SuppressReason::TopicSnoozed);
        }

        if let Some(last) = store.last_emitted_at(user).await? {
            if now < last + self.cooldown {
                return suppressed(SuppressReason::Cooldown);
            }
        }

        let event = PresenceEvent::pending(topic, suggestion.text.clone(), now);
        store.insert_event(user, event.clone()).await?;
        if let Err(e) = store.set_last_emitted_at(user, now).await {
            // The event is already stored; only the cooldown stamp is missing.
            warn!(user = %user, "presence cooldown stamp failed: {}", e);
        }
        info!(user = %user, topic, id = %event.id, "presence emitted");
        Ok(PresenceDecision::Emitted(event))
    }
}
