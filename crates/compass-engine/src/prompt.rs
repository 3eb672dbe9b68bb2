//! Prompt assembly for the completion call

use compass_core::{
    CompletionRequest, FactRecord, InterventionDecision, InterventionHint, InterventionLevel,
    StanceProfile, TriggerResult,
};
use serde_json::json;

const BASE_PROMPT: &str = "You are Compass, a steady and respectful companion. \
You help the user think and decide; you never act on their behalf.";

const REPLY_CONTRACT: &str = "Reply with a single JSON object: \
{\"text\": string, \"actions\": [{\"kind\": string, \"params\": object}], \
\"tasks\": [{\"title\": string, \"due\": string?}], \
\"new_facts\": [{\"domain\": string, \"key\": string, \"entity_id\": string?, \"value\": any, \
\"raw_text\": string, \"source\": \"user_stated\"|\"assistant_inferred\"|\"document\", \
\"finality\": \"draft\"|\"tentative\"|\"confirmed\"|\"final\", \"user_override\": bool}], \
\"presence\": {\"topic\": string, \"text\": string}?}. \
Only propose tasks the user will do themselves. Never schedule, pay, send, or delete anything. \
Set user_override only when the user explicitly corrects a stored fact.";

fn scale(value: u8, low: &'static str, mid: &'static str, high: &'static str) -> &'static str {
    match value {
        0..=3 => low,
        4..=6 => mid,
        _ => high,
    }
}

fn level_guidance(level: InterventionLevel) -> &'static str {
    match level {
        InterventionLevel::None => "Do not steer. Answer what was asked.",
        InterventionLevel::Low => "Offer one gentle observation or question, then let it go.",
        InterventionLevel::Medium => "Name the pattern you notice and suggest one concrete next step.",
        InterventionLevel::High => {
            "Slow down and prioritise the user's wellbeing. Be calm and clear. \
             If there is any sign of danger, encourage reaching out to someone they trust \
             or local emergency services."
        }
    }
}

pub fn system_prompt(stance: &StanceProfile, decision: &InterventionDecision) -> String {
    let tone = [
        scale(stance.directness(), "Be gentle and indirect.", "Be clear but warm.", "Be direct and plain-spoken."),
        scale(stance.patience(), "Keep things moving.", "Give the user room.", "Be very patient; never rush."),
        scale(
            stance.reflection_level(),
            "Prefer concrete answers over questions.",
            "Mix answers with the occasional question.",
            "Invite reflection with open questions.",
        ),
    ];

    format!(
        "{}\n\nTone: {}\n\nIntervention level: {}. {}\n\n{}",
        BASE_PROMPT,
        tone.join(" "),
        decision.level,
        level_guidance(decision.level),
        REPLY_CONTRACT
    )
}

pub fn build_request(
    message: &str,
    stance: &StanceProfile,
    triggers: &TriggerResult,
    decision: &InterventionDecision,
    facts: &[FactRecord],
) -> CompletionRequest {
    let known: Vec<serde_json::Value> = facts
        .iter()
        .map(|f| json!({ "slot": f.key.to_string(), "value": f.value, "finality": f.finality }))
        .collect();

    CompletionRequest {
        system_prompt: system_prompt(stance, decision),
        payload: json!({
            "message": message,
            "triggers": triggers.triggers,
            "known_facts": known,
        }),
        hint: InterventionHint {
            level: decision.level,
            reason_codes: decision.reason_codes.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intervention::decide;
    use compass_core::{FactCandidate, FactKey, TriggerTag};

    #[test]
    fn request_carries_hint_and_facts() {
        let stance = StanceProfile::default();
        let triggers = TriggerResult::from_tags([TriggerTag::Avoidance]);
        let decision = decide("i keep putting it off", &stance, &triggers);
        let candidate = FactCandidate::new(
            FactKey::new("finance", "rent", ""),
            json!(800),
            chrono::Utc::now(),
        );
        let record = FactRecord::from_candidate(&candidate, chrono::Utc::now());

        let req = build_request("i keep putting it off", &stance, &triggers, &decision, &[record]);
        assert_eq!(req.hint.level, InterventionLevel::Low);
        assert_eq!(req.payload["triggers"][0], "avoidance");
        assert_eq!(req.payload["known_facts"][0]["slot"], "finance/rent");
        assert!(req.system_prompt.contains("Intervention level: low"));
    }
}
