//! Intervention policy: stance + triggers -> how hard the reply should lean in
//!
//! An ordered rule table. The first rule whose predicate holds decides the
//! level and the reason codes. The decision depends only on its inputs.

use compass_core::{
    InterventionDecision, InterventionLevel, ReasonCode, StanceField, StanceProfile,
    TriggerResult, TriggerTag,
};
use serde_json::json;

/// Messages shorter than this never get an unprompted reflection nudge.
pub const REFLECTION_MIN_CHARS: usize = 240;

/// Everything a rule may look at.
pub struct PolicyInput<'a> {
    pub stance: &'a StanceProfile,
    pub triggers: &'a TriggerResult,
    pub message_chars: usize,
}

/// Which triggers a rule cites.
#[derive(Clone, Copy, Debug)]
pub enum TriggerReasons {
    None,
    All,
    Only(TriggerTag),
}

pub struct InterventionRule {
    pub name: &'static str,
    pub level: InterventionLevel,
    predicate: fn(&PolicyInput) -> bool,
    stance_reasons: &'static [StanceField],
    trigger_reasons: TriggerReasons,
    cites_length: bool,
}

impl InterventionRule {
    pub fn applies(&self, input: &PolicyInput) -> bool {
        (self.predicate)(input)
    }

    /// Stance fields first, then triggers.
    pub fn reasons(&self, input: &PolicyInput) -> Vec<ReasonCode> {
        let mut codes: Vec<ReasonCode> =
            self.stance_reasons.iter().copied().map(ReasonCode::Stance).collect();
        if self.cites_length {
            codes.push(ReasonCode::MessageLength);
        }
        match self.trigger_reasons {
            TriggerReasons::None => {}
            TriggerReasons::All => codes.extend(input.triggers.triggers.iter().copied().map(ReasonCode::Trigger)),
            TriggerReasons::Only(tag) => {
                if input.triggers.contains(tag) {
                    codes.push(ReasonCode::Trigger(tag));
                }
            }
        }
        codes
    }
}

fn crisis_signal(i: &PolicyInput) -> bool {
    i.triggers.contains(TriggerTag::Crisis)
}

fn escalation(i: &PolicyInput) -> bool {
    i.triggers.has_trigger && i.triggers.len() >= i.stance.escalation_threshold() as usize
}

fn deep_intervention(i: &PolicyInput) -> bool {
    i.triggers.has_trigger && i.stance.intervention_depth() >= 7
}

fn direct_challenge(i: &PolicyInput) -> bool {
    i.triggers.has_trigger && i.stance.directness() >= 7 && i.stance.patience() <= 3
}

fn light_touch(i: &PolicyInput) -> bool {
    i.triggers.has_trigger && i.stance.intervention_depth() <= 2
}

fn nudge(i: &PolicyInput) -> bool {
    i.triggers.has_trigger
}

fn reflection_prompt(i: &PolicyInput) -> bool {
    !i.triggers.has_trigger
        && i.stance.reflection_level() >= 8
        && i.message_chars >= REFLECTION_MIN_CHARS
}

fn baseline(_: &PolicyInput) -> bool {
    true
}

pub static INTERVENTION_RULES: [InterventionRule; 8] = [
    InterventionRule {
        name: "crisis_signal",
        level: InterventionLevel::High,
        predicate: crisis_signal,
        stance_reasons: &[],
        trigger_reasons: TriggerReasons::Only(TriggerTag::Crisis),
        cites_length: false,
    },
    InterventionRule {
        name: "escalation",
        level: InterventionLevel::High,
        predicate: escalation,
        stance_reasons: &[StanceField::EscalationThreshold],
        trigger_reasons: TriggerReasons::All,
        cites_length: false,
    },
    InterventionRule {
        name: "deep_intervention",
        level: InterventionLevel::Medium,
        predicate: deep_intervention,
        stance_reasons: &[StanceField::InterventionDepth],
        trigger_reasons: TriggerReasons::All,
        cites_length: false,
    },
    InterventionRule {
        name: "direct_challenge",
        level: InterventionLevel::Medium,
        predicate: direct_challenge,
        stance_reasons: &[StanceField::Directness, StanceField::Patience],
        trigger_reasons: TriggerReasons::All,
        cites_length: false,
    },
    InterventionRule {
        name: "light_touch",
        level: InterventionLevel::None,
        predicate: light_touch,
        stance_reasons: &[StanceField::InterventionDepth],
        trigger_reasons: TriggerReasons::All,
        cites_length: false,
    },
    InterventionRule {
        name: "nudge",
        level: InterventionLevel::Low,
        predicate: nudge,
        stance_reasons: &[],
        trigger_reasons: TriggerReasons::All,
        cites_length: false,
    },
    InterventionRule {
        name: "reflection_prompt",
        level: InterventionLevel::Low,
        predicate: reflection_prompt,
        stance_reasons: &[StanceField::ReflectionLevel],
        trigger_reasons: TriggerReasons::None,
        cites_length: true,
    },
    InterventionRule {
        name: "baseline",
        level: InterventionLevel::None,
        predicate: baseline,
        stance_reasons: &[],
        trigger_reasons: TriggerReasons::None,
        cites_length: false,
    },
];

/// Decide the intervention level for one message.
pub fn decide(message: &str, stance: &StanceProfile, triggers: &TriggerResult) -> InterventionDecision {
    let input = PolicyInput {
        stance,
        triggers,
        message_chars: message.chars().count(),
    };

    // The last rule always applies.
    let rule = INTERVENTION_RULES
        .iter()
        .find(|r| r.applies(&input))
        .unwrap_or(&INTERVENTION_RULES[INTERVENTION_RULES.len() - 1]);

    InterventionDecision {
        level: rule.level,
        reason_codes: rule.reasons(&input),
        debug: json!({
            "rule": rule.name,
            "trigger_count": triggers.len(),
            "message_chars": input.message_chars,
            "stance": stance,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_names_in_order() {
        let names: Vec<&str> = INTERVENTION_RULES.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec![
                "crisis_signal",
                "escalation",
                "deep_intervention",
                "direct_challenge",
                "light_touch",
                "nudge",
                "reflection_prompt",
                "baseline",
            ]
        );
    }

    #[test]
    fn baseline_always_applies() {
        let stance = StanceProfile::default();
        let triggers = TriggerResult::empty();
        let input = PolicyInput { stance: &stance, triggers: &triggers, message_chars: 0 };
        assert!(INTERVENTION_RULES[7].applies(&input));
        assert!(INTERVENTION_RULES[7].reasons(&input).is_empty());
    }
}
