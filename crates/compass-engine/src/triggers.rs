//! Trigger detection: deterministic linguistic signals in a user message
//!
//! Rules are checked in order against the lowercased text. Each rule maps to
//! one tag, so the result lists tags in rule order without duplicates.

use compass_core::{TriggerResult, TriggerTag};
use once_cell::sync::Lazy;
use regex::Regex;

/// One detection rule: the tag and the patterns that raise it.
pub struct TriggerRule {
    pub tag: TriggerTag,
    patterns: Vec<Regex>,
}

impl TriggerRule {
    fn new(tag: TriggerTag, patterns: &[&str]) -> Self {
        Self {
            tag,
            patterns: patterns
                .iter()
                .map(|p| Regex::new(p).expect("trigger pattern should compile"))
                .collect(),
        }
    }

    pub fn matches(&self, lowered: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(lowered))
    }
}

pub static TRIGGER_RULES: Lazy<Vec<TriggerRule>> = Lazy::new(|| {
    vec![
        TriggerRule::new(
            TriggerTag::Crisis,
            &[
                r"\b(kill|hurt|harm)(ing)? myself\b",
                r"\bsuicid(e|al)\b",
                r"\b(want|wish) (to|i could) die\b",
                r"\bend (it all|my life)\b",
                r"\bno reason to (live|go on)\b",
                r"\bcan'?t go on\b",
            ],
        ),
        TriggerRule::new(
            TriggerTag::SelfDeprecation,
            &[
                r"\bi'?m (so |such an? |a )?(stupid|useless|worthless|pathetic|idiot|failure|loser)\b",
                r"\bi am (so |such an? |a )?(stupid|useless|worthless|pathetic|idiot|failure|loser)\b",
                r"\bi hate myself\b",
                r"\bi can'?t do anything right\b",
                r"\bwhat'?s wrong with me\b",
            ],
        ),
        TriggerRule::new(
            TriggerTag::Overwhelm,
            &[
                r"\boverwhelm(ed|ing)?\b",
                r"\btoo much (to handle|going on|on my plate)\b",
                r"\bdrowning in\b",
                r"\bcan'?t (cope|keep up|handle (it|this))\b",
                r"\bfalling apart\b",
            ],
        ),
        TriggerRule::new(
            TriggerTag::Avoidance,
            &[
                r"\b(keep |been )?put(ting)? (it |this |that )?off\b",
                r"\bprocrastinat(e|ing|ion)\b",
                r"\bavoid(ing)? (it|this|that|them|the)\b",
                r"\bdon'?t want to (deal|think) (with|about)\b",
                r"\b(i'?ll|i will) do it (later|tomorrow)\b",
            ],
        ),
        TriggerRule::new(
            TriggerTag::Rumination,
            &[
                r"\bcan'?t stop thinking\b",
                r"\bkeep (thinking|replaying|going over)\b",
                r"\bover and over\b",
                r"\bwhat if i\b",
                r"\bshould have\b",
            ],
        ),
        TriggerRule::new(
            TriggerTag::AllOrNothing,
            &[
                r"\b(always|never) (works|work out|goes right|get it right)\b",
                r"\beverything is (ruined|pointless|wrong|a mess)\b",
                r"\bnothing (ever )?(works|changes|goes right)\b",
                r"\bi (always|never) (fail|mess|screw)\b",
                r"\bcompletely (ruined|hopeless)\b",
            ],
        ),
        TriggerRule::new(
            TriggerTag::ImpulsiveSpending,
            &[
                r"\bimpulse (buy|bought|purchase|spending)\b",
                r"\bjust (bought|ordered|spent)\b",
                r"\bspent (all|too much|way too much)\b",
                r"\bmaxed out\b",
                r"\bretail therapy\b",
                r"\b(treat|treated) myself\b",
            ],
        ),
        TriggerRule::new(
            TriggerTag::HelpRequest,
            &[
                r"\bhelp me\b",
                r"\bi need help\b",
                r"\bwhat should i do\b",
                r"\bi don'?t know what to do\b",
                r"\bcan you help\b",
            ],
        ),
    ]
});

/// Detect triggers in `text`. Pure and total: unmatched text yields an empty result.
pub fn detect_triggers(text: &str) -> TriggerResult {
    let lowered = normalize(text);
    TriggerResult::from_tags(
        TRIGGER_RULES
            .iter()
            .filter(|rule| rule.matches(&lowered))
            .map(|rule| rule.tag),
    )
}

/// Lowercase and fold typographic apostrophes so patterns only handle `'`.
pub(crate) fn normalize(text: &str) -> String {
    text.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tag_has_a_rule() {
        assert_eq!(TRIGGER_RULES.len(), 8);
        let tags: Vec<TriggerTag> = TRIGGER_RULES.iter().map(|r| r.tag).collect();
        assert_eq!(tags[0], TriggerTag::Crisis);
        assert_eq!(tags[7], TriggerTag::HelpRequest);
    }

    #[test]
    fn curly_apostrophe_folded() {
        assert_eq!(normalize("I CAN\u{2019}T cope"), "i can't cope");
    }
}
