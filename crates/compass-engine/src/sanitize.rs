//! Completion output sanitation
//!
//! Runs on every reply before the guardrail sees it: strips control
//! characters, trims, drops malformed items and caps list sizes. Fact
//! timestamps are capped at the turn clock.

use chrono::{DateTime, Utc};
use compass_core::config::SanitizeConfig;
use compass_core::{CompletionReply, FactCandidate, PresenceSuggestion, ProposedAction, ProposedTask};
use tracing::debug;

/// Presence text is a one-liner.
pub const MAX_PRESENCE_CHARS: usize = 280;

pub fn sanitize(reply: CompletionReply, config: &SanitizeConfig, now: DateTime<Utc>) -> CompletionReply {
    let before = (reply.actions.len(), reply.tasks.len(), reply.new_facts.len());

    let sanitized = CompletionReply {
        text: truncate_chars(&clean_text(&reply.text), config.max_reply_chars),
        actions: reply
            .actions
            .into_iter()
            .filter_map(clean_action)
            .take(config.max_items)
            .collect(),
        tasks: reply
            .tasks
            .into_iter()
            .filter_map(clean_task)
            .take(config.max_items)
            .collect(),
        new_facts: reply
            .new_facts
            .into_iter()
            .filter_map(|fact| clean_fact(fact, now))
            .take(config.max_items)
            .collect(),
        presence: reply.presence.and_then(clean_presence),
    };

    let after = (sanitized.actions.len(), sanitized.tasks.len(), sanitized.new_facts.len());
    if before != after {
        debug!(?before, ?after, "sanitation dropped items");
    }
    sanitized
}

/// Drop control characters other than newline and tab, then trim.
pub fn clean_text(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect::<String>()
        .trim()
        .to_string()
}

pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].trim_end().to_string(),
        None => text.to_string(),
    }
}

fn clean_action(mut action: ProposedAction) -> Option<ProposedAction> {
    action.kind = clean_text(&action.kind);
    (!action.kind.is_empty()).then_some(action)
}

fn clean_task(mut task: ProposedTask) -> Option<ProposedTask> {
    task.title = clean_text(&task.title);
    if task.title.is_empty() {
        return None;
    }
    task.due = task.due.map(|d| clean_text(&d)).filter(|d| !d.is_empty());
    task.run_at = task.run_at.map(|d| clean_text(&d)).filter(|d| !d.is_empty());
    task.recurrence = task.recurrence.map(|d| clean_text(&d)).filter(|d| !d.is_empty());
    Some(task)
}

fn clean_fact(mut fact: FactCandidate, now: DateTime<Utc>) -> Option<FactCandidate> {
    fact.key.domain = clean_text(&fact.key.domain).to_lowercase();
    fact.key.key = clean_text(&fact.key.key).to_lowercase();
    fact.key.entity_id = clean_text(&fact.key.entity_id);
    if fact.key.domain.is_empty() || fact.key.key.is_empty() || fact.value.is_null() {
        return None;
    }
    // A future stamp would win recency against every later observation.
    fact.observed_at = fact.observed_at.min(now);
    fact.raw_text = clean_text(&fact.raw_text);
    fact.tags = fact
        .tags
        .iter()
        .map(|t| clean_text(t))
        .filter(|t| !t.is_empty())
        .collect();
    Some(fact)
}

fn clean_presence(mut suggestion: PresenceSuggestion) -> Option<PresenceSuggestion> {
    suggestion.topic = clean_text(&suggestion.topic).to_lowercase();
    if suggestion.topic.is_empty() {
        return None;
    }
    suggestion.text = truncate_chars(&clean_text(&suggestion.text), MAX_PRESENCE_CHARS);
    Some(suggestion)
}
