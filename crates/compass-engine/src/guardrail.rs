//! Guardrail enforcement on the sanitized completion reply
//!
//! Violations are data, not errors. Any violation replaces the reply text
//! with [`FALLBACK_REPLY`] and drops every proposed side effect.

use compass_core::{CompletionReply, ProposedAction, ProposedTask};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::triggers::normalize;

pub const FALLBACK_REPLY: &str = "I want to keep this supportive and in your hands. \
Let's slow down for a moment: what feels most important to you right now?";

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GuardRule {
    EscalatingLanguage,
    ManipulativePressure,
    Shaming,
    AutonomousActionClaim,
    AutonomousTask,
    DisallowedAction,
}

impl GuardRule {
    pub fn name(&self) -> &'static str {
        match self {
            GuardRule::EscalatingLanguage => "escalating_language",
            GuardRule::ManipulativePressure => "manipulative_pressure",
            GuardRule::Shaming => "shaming",
            GuardRule::AutonomousActionClaim => "autonomous_action_claim",
            GuardRule::AutonomousTask => "autonomous_task",
            GuardRule::DisallowedAction => "disallowed_action",
        }
    }
}

impl std::fmt::Display for GuardRule {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardViolation {
    pub rule: GuardRule,
    /// The matched phrase, task title or action kind.
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardResult {
    pub ok: bool,
    pub violations: Vec<GuardViolation>,
}

impl GuardResult {
    fn from_violations(violations: Vec<GuardViolation>) -> Self {
        Self {
            ok: violations.is_empty(),
            violations,
        }
    }

    pub fn has(&self, rule: GuardRule) -> bool {
        self.violations.iter().any(|v| v.rule == rule)
    }
}

/// The enforced reply and why it looks the way it does.
#[derive(Clone, Debug, PartialEq)]
pub struct GuardOutcome {
    pub result: GuardResult,
    pub reply: CompletionReply,
}

struct TextRule {
    rule: GuardRule,
    patterns: Vec<Regex>,
}

impl TextRule {
    fn new(rule: GuardRule, patterns: &[&str]) -> Self {
        Self {
            rule,
            patterns: patterns
                .iter()
                .map(|p| Regex::new(p).expect("guardrail pattern should compile"))
                .collect(),
        }
    }

    fn first_match<'t>(&self, lowered: &'t str) -> Option<&'t str> {
        self.patterns
            .iter()
            .find_map(|re| re.find(lowered).map(|m| m.as_str()))
    }
}

static TEXT_RULES: Lazy<Vec<TextRule>> = Lazy::new(|| {
    vec![
        TextRule::new(
            GuardRule::EscalatingLanguage,
            &[
                r"\b(this is|it'?s) (a |an )?(disaster|catastroph(e|ic)|emergency)\b",
                r"\byou('re| are) (doomed|ruined|in serious trouble)\b",
                r"\b(everything|your life) (is|will be) (ruined|over)\b",
                r"\bthere'?s no (hope|way out)\b",
            ],
        ),
        TextRule::new(
            GuardRule::ManipulativePressure,
            &[
                r"\byou (have to|must) (do this|act|decide) (right )?(now|immediately)\b",
                r"\bif you (really |truly )?cared\b",
                r"\byou('ll| will) regret (it|this)\b",
                r"\bonly i can\b",
                r"\byou need me\b",
                r"\b(act|decide) now or\b",
                r"\byou owe (it to )?me\b",
            ],
        ),
        TextRule::new(
            GuardRule::Shaming,
            &[
                r"\byou('re| are) (so |being |just )?(lazy|pathetic|stupid|useless|hopeless|an idiot|irresponsible)\b",
                r"\bshame on you\b",
                r"\bwhat'?s wrong with you\b",
                r"\byou should be ashamed\b",
            ],
        ),
        TextRule::new(
            GuardRule::AutonomousActionClaim,
            &[
                r"\bi('ve| have)? (already )?(scheduled|booked|sent|paid|deleted|cancell?ed|ordered|purchased|transferred|submitted)\b",
                r"\bi went ahead and\b",
                r"\bi('ve| have) taken care of\b",
                r"\bi('ll| will) (automatically|go ahead and)\b",
            ],
        ),
    ]
});

/// Action kinds the assistant may never propose, matched per `_`-separated token.
pub const DISALLOWED_ACTION_TOKENS: &[&str] = &[
    "pay", "payment", "transfer", "purchase", "buy", "send", "email", "sms", "message",
    "delete", "erase", "purge", "background", "cron", "job", "schedule",
];

pub fn is_disallowed_action(action: &ProposedAction) -> bool {
    action
        .kind
        .to_lowercase()
        .split(|c: char| c == '_' || c == '-' || c == '.' || c.is_whitespace())
        .any(|token| DISALLOWED_ACTION_TOKENS.contains(&token))
}

/// A task that carries its own schedule or claims to run unattended.
pub fn is_autonomous_task(task: &ProposedTask) -> bool {
    task.autonomous || task.run_at.is_some() || task.recurrence.is_some()
}

/// Check a reply against every rule. Reports all violations found.
pub fn evaluate(reply: &CompletionReply) -> GuardResult {
    let lowered = normalize(&reply.text);
    let mut violations = Vec::new();

    for rule in TEXT_RULES.iter() {
        if let Some(phrase) = rule.first_match(&lowered) {
            violations.push(GuardViolation {
                rule: rule.rule,
                detail: phrase.to_string(),
            });
        }
    }
    for task in reply.tasks.iter().filter(|t| is_autonomous_task(t)) {
        violations.push(GuardViolation {
            rule: GuardRule::AutonomousTask,
            detail: task.title.clone(),
        });
    }
    for action in reply.actions.iter().filter(|a| is_disallowed_action(a)) {
        violations.push(GuardViolation {
            rule: GuardRule::DisallowedAction,
            detail: action.kind.clone(),
        });
    }

    GuardResult::from_violations(violations)
}

/// Evaluate and, on any violation, replace the reply with the fallback.
pub fn enforce(reply: CompletionReply) -> GuardOutcome {
    let result = evaluate(&reply);
    if result.ok {
        return GuardOutcome { result, reply };
    }

    let rules: Vec<&str> = result.violations.iter().map(|v| v.rule.name()).collect();
    warn!(violations = ?rules, "reply blocked by guardrail");

    GuardOutcome {
        result,
        reply: CompletionReply::text(FALLBACK_REPLY),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_tokens() {
        let action = |kind: &str| ProposedAction { kind: kind.into(), params: serde_json::Value::Null };
        assert!(is_disallowed_action(&action("send_email")));
        assert!(is_disallowed_action(&action("Make-Payment")));
        assert!(is_disallowed_action(&action("delete_note")));
        assert!(!is_disallowed_action(&action("open_note")));
        assert!(!is_disallowed_action(&action("show_budget")));
    }

    #[test]
    fn fallback_itself_passes() {
        assert!(evaluate(&CompletionReply::text(FALLBACK_REPLY)).ok);
    }
}
