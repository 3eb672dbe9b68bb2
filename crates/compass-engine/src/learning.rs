//! Stance learning: explicit user feedback nudges the stance profile
//!
//! A message yields at most one feedback event. The event becomes an absolute
//! patch against the current profile, so replaying the same message is a no-op
//! once the profile has moved.

use compass_core::{StanceField, StancePatch, StanceProfile, UserId};
use compass_store::StanceStore;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::triggers::normalize;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackEvent {
    MoreDirect,
    LessDirect,
    DeeperIntervention,
    LighterIntervention,
    MorePatience,
    LessPatience,
    EscalateSooner,
    EscalateLater,
    MoreReflection,
    LessReflection,
}

impl FeedbackEvent {
    pub fn field(&self) -> StanceField {
        match self {
            FeedbackEvent::MoreDirect | FeedbackEvent::LessDirect => StanceField::Directness,
            FeedbackEvent::DeeperIntervention | FeedbackEvent::LighterIntervention => {
                StanceField::InterventionDepth
            }
            FeedbackEvent::MorePatience | FeedbackEvent::LessPatience => StanceField::Patience,
            FeedbackEvent::EscalateSooner | FeedbackEvent::EscalateLater => {
                StanceField::EscalationThreshold
            }
            FeedbackEvent::MoreReflection | FeedbackEvent::LessReflection => {
                StanceField::ReflectionLevel
            }
        }
    }

    /// Signed movement for a given step. The escalation threshold counts
    /// triggers, so it always moves by one, and "sooner" means lower.
    pub fn delta(&self, step: u8) -> i32 {
        let step = step as i32;
        match self {
            FeedbackEvent::MoreDirect
            | FeedbackEvent::DeeperIntervention
            | FeedbackEvent::MorePatience
            | FeedbackEvent::MoreReflection => step,
            FeedbackEvent::LessDirect
            | FeedbackEvent::LighterIntervention
            | FeedbackEvent::LessPatience
            | FeedbackEvent::LessReflection => -step,
            FeedbackEvent::EscalateSooner => -1,
            FeedbackEvent::EscalateLater => 1,
        }
    }
}

pub struct FeedbackRule {
    pub event: FeedbackEvent,
    patterns: Vec<Regex>,
}

impl FeedbackRule {
    fn new(event: FeedbackEvent, patterns: &[&str]) -> Self {
        Self {
            event,
            patterns: patterns
                .iter()
                .map(|p| Regex::new(p).expect("feedback pattern should compile"))
                .collect(),
        }
    }

    /// True when some pattern matches without a negation right before it,
    /// so "not less direct" does not count as asking for less directness.
    pub fn matches(&self, lowered: &str) -> bool {
        self.patterns.iter().any(|re| {
            re.find_iter(lowered)
                .any(|m| !NEGATED_TAIL.is_match(&lowered[..m.start()]))
        })
    }
}

/// A negating word ending the text that precedes a match.
static NEGATED_TAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\bnot|n't|\b(?:dont|never|cant|wont))\s+$").expect("negation pattern should compile")
});

/// Ordered feedback rules; the first match wins. Negated phrasings come
/// before the plain ones they contain ("don't push me" before "push me").
pub static FEEDBACK_RULES: Lazy<Vec<FeedbackRule>> = Lazy::new(|| {
    vec![
        FeedbackRule::new(
            FeedbackEvent::LessDirect,
            &[
                r"\b(be )?less (direct|blunt|harsh)\b",
                r"\b(too|so) (blunt|harsh|direct)\b",
                r"\bbe (gentler|softer|kinder)\b",
            ],
        ),
        FeedbackRule::new(
            FeedbackEvent::MoreDirect,
            &[
                r"\b(be )?more (direct|blunt|straightforward)\b",
                r"\bbe (blunt|direct|straight) with me\b",
                r"\b(stop|quit) sugar ?coating\b",
                r"\bjust tell me straight\b",
            ],
        ),
        FeedbackRule::new(
            FeedbackEvent::LighterIntervention,
            &[
                r"\b(back|ease) off\b",
                r"\bleave me alone\b",
                r"\bstop (pushing|lecturing|nagging)\b",
                r"\b(don'?t|stop) (push|challeng)(ing|e)? me\b",
            ],
        ),
        FeedbackRule::new(
            FeedbackEvent::DeeperIntervention,
            &[
                r"\b(push|challenge) me (more|harder)\b",
                r"\b(go|dig) deeper\b",
                r"\bhold me accountable\b",
            ],
        ),
        FeedbackRule::new(
            FeedbackEvent::LessPatience,
            &[
                r"\b(be )?less patient\b",
                r"\b(hurry|speed) (me )?up\b",
                r"\bstop waiting\b",
            ],
        ),
        FeedbackRule::new(
            FeedbackEvent::MorePatience,
            &[
                r"\b(be )?more patient\b",
                r"\b(slow|calm) down\b",
                r"\bgive me (more )?time\b",
            ],
        ),
        FeedbackRule::new(
            FeedbackEvent::EscalateLater,
            &[
                r"\b(escalate|flag (it|things)) (later|less)\b",
                r"\bdon'?t (escalate|overreact)\b",
                r"\bstop overreacting\b",
            ],
        ),
        FeedbackRule::new(
            FeedbackEvent::EscalateSooner,
            &[
                r"\b(escalate|flag (it|things)|call it out) (sooner|earlier|faster)\b",
                r"\bwarn me (sooner|earlier)\b",
            ],
        ),
        FeedbackRule::new(
            FeedbackEvent::LessReflection,
            &[
                r"\b(be )?less (reflection|reflective)\b",
                r"\b(fewer|no more) questions\b",
                r"\bstop asking (me )?questions\b",
                r"\bjust (give|tell) me the answer\b",
            ],
        ),
        FeedbackRule::new(
            FeedbackEvent::MoreReflection,
            &[
                r"\b(be )?more (reflection|reflective)\b",
                r"\bask me (more )?questions\b",
                r"\bhelp me reflect\b",
            ],
        ),
    ]
});

/// At most one feedback event per message.
pub fn detect_feedback(text: &str) -> Option<FeedbackEvent> {
    let lowered = normalize(text);
    FEEDBACK_RULES
        .iter()
        .find(|rule| rule.matches(&lowered))
        .map(|rule| rule.event)
}

/// Turn an event into an absolute, clamped patch. Empty when the field is
/// already at the bound the event pushes towards.
pub fn derive_patch(event: FeedbackEvent, profile: &StanceProfile, step: u8) -> StancePatch {
    let field = event.field();
    let current = profile.get(field);
    let target = field.clamp_value(current as i32 + event.delta(step));

    let mut patch = StancePatch::empty();
    if target != current {
        patch.set(field, target);
    }
    patch
}

/// What learning did for one message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LearningOutcome {
    pub feedback: Option<FeedbackEvent>,
    pub patch: StancePatch,
    /// Profile every later stage of the turn sees.
    pub profile: StanceProfile,
    pub persisted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LearningOutcome {
    fn unchanged(feedback: Option<FeedbackEvent>, profile: &StanceProfile) -> Self {
        Self {
            feedback,
            patch: StancePatch::empty(),
            profile: profile.clone(),
            persisted: false,
            error: None,
        }
    }

    pub fn changed(&self) -> bool {
        self.persisted && !self.patch.is_empty()
    }
}

pub struct LearningEngine {
    step: u8,
}

impl Default for LearningEngine {
    fn default() -> Self {
        Self::new(2)
    }
}

impl LearningEngine {
    pub fn new(step: u8) -> Self {
        Self { step: step.max(1) }
    }

    pub fn step(&self) -> u8 {
        self.step
    }

    /// Detect feedback, derive a patch and persist it. Never fails: a store
    /// error leaves the pre-learning profile in place and is reported in
    /// the outcome.
    pub async fn observe<S: StanceStore + ?Sized>(
        &self,
        store: &S,
        user: &UserId,
        message: &str,
        profile: &StanceProfile,
    ) -> LearningOutcome {
        let Some(event) = detect_feedback(message) else {
            return LearningOutcome::unchanged(None, profile);
        };

        let patch = derive_patch(event, profile, self.step);
        if patch.is_empty() {
            debug!(user = %user, ?event, "feedback at bound, nothing to write");
            return LearningOutcome::unchanged(Some(event), profile);
        }

        match store.merge_stance(user, &patch).await {
            Ok(stored) => {
                info!(user = %user, ?event, patch = ?patch, "stance patch applied");
                LearningOutcome {
                    feedback: Some(event),
                    patch,
                    profile: stored,
                    persisted: true,
                    error: None,
                }
            }
            Err(e) => {
                warn!(user = %user, ?event, "stance write failed, keeping prior profile: {}", e);
                LearningOutcome {
                    error: Some(e.to_string()),
                    ..LearningOutcome::unchanged(Some(event), profile)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_event_has_a_rule() {
        assert_eq!(FEEDBACK_RULES.len(), 10);
    }

    #[test]
    fn escalation_moves_by_one() {
        assert_eq!(FeedbackEvent::EscalateSooner.delta(4), -1);
        assert_eq!(FeedbackEvent::EscalateLater.delta(4), 1);
        assert_eq!(FeedbackEvent::LessDirect.delta(3), -3);
    }

    #[test]
    fn zero_step_is_raised_to_one() {
        assert_eq!(LearningEngine::new(0).step(), 1);
    }
}
