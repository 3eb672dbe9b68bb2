//! Tests for compass-core: identifiers, stance bounds, triggers, reason codes,
//! fact axes, presence visibility primitives, turn validation, config

use chrono::{Duration, TimeZone, Utc};
use compass_core::*;

// ===========================================================================
// UserId
// ===========================================================================

#[test]
fn user_id_new_and_display() {
    let id = UserId::new("u-123");
    assert_eq!(id.as_str(), "u-123");
    assert_eq!(format!("{}", id), "u-123");
}

#[test]
fn user_id_equality_and_hash() {
    use std::collections::HashSet;
    let a = UserId::from("same");
    let b = UserId::from(String::from("same"));
    let c = UserId::new("other");
    assert_eq!(a, b);
    assert_ne!(a, c);
    let mut set = HashSet::new();
    set.insert(a.clone());
    assert!(set.contains(&b));
    assert!(!set.contains(&c));
}

#[test]
fn user_id_serializes_as_plain_string() {
    let json = serde_json::to_string(&UserId::new("u-1")).unwrap();
    assert_eq!(json, r#""u-1""#);
}

// ===========================================================================
// StanceProfile
// ===========================================================================

#[test]
fn stance_defaults_are_within_bounds() {
    let s = StanceProfile::default();
    for field in StanceField::all() {
        let (lo, hi) = field.bounds();
        let v = s.get(*field);
        assert!(v >= lo && v <= hi, "{} = {} out of bounds", field, v);
    }
    assert_eq!(s.directness(), 5);
    assert_eq!(s.escalation_threshold(), 3);
    assert_eq!(s.version(), STANCE_SCHEMA_VERSION);
}

#[test]
fn stance_field_clamp_value() {
    assert_eq!(StanceField::Directness.clamp_value(-4), 0);
    assert_eq!(StanceField::Directness.clamp_value(12), 10);
    assert_eq!(StanceField::EscalationThreshold.clamp_value(0), 1);
    assert_eq!(StanceField::EscalationThreshold.clamp_value(9), 6);
    assert_eq!(StanceField::Patience.clamp_value(7), 7);
}

#[test]
fn stance_apply_clamps_to_bounds() {
    let mut patch = StancePatch::empty();
    patch.set(StanceField::Directness, 250);
    patch.set(StanceField::EscalationThreshold, 0);
    let s = StanceProfile::default().apply(&patch);
    assert_eq!(s.directness(), 10);
    assert_eq!(s.escalation_threshold(), 1);
}

#[test]
fn stance_apply_is_idempotent() {
    let mut patch = StancePatch::empty();
    patch.set(StanceField::Patience, 8);
    let once = StanceProfile::default().apply(&patch);
    let twice = once.apply(&patch);
    assert_eq!(once, twice);
    assert!(!once.would_change(&patch));
}

#[test]
fn stance_would_change_detects_noop() {
    let s = StanceProfile::default();
    let mut patch = StancePatch::empty();
    patch.set(StanceField::Directness, 5);
    assert!(!s.would_change(&patch));
    patch.set(StanceField::Directness, 6);
    assert!(s.would_change(&patch));
    assert!(!s.would_change(&StancePatch::empty()));
}

#[test]
fn stance_deserialize_clamps_out_of_range() {
    let s: StanceProfile =
        serde_json::from_str(r#"{"directness": 99, "escalation_threshold": 0}"#).unwrap();
    assert_eq!(s.directness(), 10);
    assert_eq!(s.escalation_threshold(), 1);
    assert_eq!(s.patience(), 5);
}

#[test]
fn stance_patch_entries_in_field_order() {
    let mut patch = StancePatch::empty();
    patch.set(StanceField::ReflectionLevel, 3);
    patch.set(StanceField::Directness, 7);
    let entries: Vec<_> = patch.entries().collect();
    assert_eq!(
        entries,
        vec![(StanceField::Directness, 7), (StanceField::ReflectionLevel, 3)]
    );
    assert!(!patch.is_empty());
    assert!(StancePatch::empty().is_empty());
}

#[test]
fn stance_patch_skips_absent_fields_in_json() {
    let mut patch = StancePatch::empty();
    patch.set(StanceField::Directness, 7);
    let json = serde_json::to_string(&patch).unwrap();
    assert_eq!(json, r#"{"directness":7}"#);
}

#[test]
fn stance_field_parse() {
    assert_eq!("patience".parse::<StanceField>().unwrap(), StanceField::Patience);
    assert!("bogus".parse::<StanceField>().is_err());
}

// ===========================================================================
// TriggerResult / InterventionLevel / ReasonCode
// ===========================================================================

#[test]
fn trigger_result_dedups_and_keeps_order() {
    let r = TriggerResult::from_tags(vec![
        TriggerTag::Avoidance,
        TriggerTag::Crisis,
        TriggerTag::Avoidance,
    ]);
    assert!(r.has_trigger);
    assert_eq!(r.triggers, vec![TriggerTag::Avoidance, TriggerTag::Crisis]);
    assert!(!TriggerResult::empty().has_trigger);
}

#[test]
fn intervention_level_ordering() {
    assert!(InterventionLevel::None < InterventionLevel::Low);
    assert!(InterventionLevel::Low < InterventionLevel::Medium);
    assert!(InterventionLevel::Medium < InterventionLevel::High);
    assert_eq!(serde_json::to_string(&InterventionLevel::High).unwrap(), r#""high""#);
}

#[test]
fn reason_code_string_form() {
    let codes = vec![
        ReasonCode::Stance(StanceField::InterventionDepth),
        ReasonCode::Trigger(TriggerTag::SelfDeprecation),
        ReasonCode::MessageLength,
    ];
    let json = serde_json::to_string(&codes).unwrap();
    assert_eq!(
        json,
        r#"["stance:intervention_depth","trigger:self_deprecation","message:length"]"#
    );
    let back: Vec<ReasonCode> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, codes);
    assert!(serde_json::from_str::<ReasonCode>(r#""trigger:nope""#).is_err());
}

// ===========================================================================
// Facts
// ===========================================================================

#[test]
fn score_axes_fixed_and_only_override_dominates() {
    assert_eq!(ScoreAxis::all().len(), 8);
    let dominating: Vec<_> = ScoreAxis::all().iter().filter(|a| a.can_dominate()).collect();
    assert_eq!(dominating, vec![&ScoreAxis::UserOverride]);
    assert_eq!(ScoreAxis::UserOverride.domain(), AxisDomain::Boolean);
    assert_eq!(ScoreAxis::Recency.domain(), AxisDomain::Timestamp);
}

#[test]
fn fact_source_reliability_order() {
    assert!(FactSource::UserStated.reliability() > FactSource::Document.reliability());
    assert!(FactSource::Document.reliability() > FactSource::AssistantInferred.reliability());
    assert!(FactSource::AssistantInferred.reliability() > FactSource::SystemDerived.reliability());
    assert!(FactSource::SystemDerived.is_system_origin());
    assert!(!FactSource::UserStated.is_system_origin());
}

#[test]
fn finality_rank_order() {
    assert!(Finality::Final.rank() > Finality::Confirmed.rank());
    assert!(Finality::Confirmed.rank() > Finality::Tentative.rank());
    assert!(Finality::Tentative.rank() > Finality::Draft.rank());
}

#[test]
fn fact_candidate_flattens_key() {
    let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let c = FactCandidate::new(FactKey::new("finance", "rent", ""), serde_json::json!(800), at)
        .with_source(FactSource::UserStated);
    let json = serde_json::to_value(&c).unwrap();
    assert_eq!(json["domain"], "finance");
    assert_eq!(json["key"], "rent");
    assert_eq!(json["source"], "user_stated");
    let back: FactCandidate = serde_json::from_value(json).unwrap();
    assert_eq!(back, c);
}

#[test]
fn fact_candidate_defaults_when_fields_missing() {
    let c: FactCandidate =
        serde_json::from_str(r#"{"domain":"profile","key":"city","value":"Lisbon"}"#).unwrap();
    assert_eq!(c.key.entity_id, "");
    assert_eq!(c.finality, Finality::Draft);
    assert_eq!(c.source, FactSource::AssistantInferred);
    assert!(!c.user_override);
}

#[test]
fn fact_key_display() {
    assert_eq!(FactKey::new("finance", "rent", "").to_string(), "finance/rent");
    assert_eq!(FactKey::new("people", "birthday", "sam").to_string(), "people/birthday#sam");
}

#[test]
fn fact_record_from_candidate_carries_evidence() {
    let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let c = FactCandidate::new(FactKey::new("finance", "rent", ""), serde_json::json!(800), at)
        .with_raw_text("rent is 800");
    let r = FactRecord::from_candidate(&c, at + Duration::seconds(1));
    assert_eq!(r.value, serde_json::json!(800));
    assert_eq!(r.evidence.len(), 1);
    assert_eq!(r.evidence[0].raw_text, "rent is 800");
    assert!(r.history.is_empty());
    assert_eq!(r.as_candidate().value, c.value);
}

// ===========================================================================
// Presence
// ===========================================================================

#[test]
fn topic_meta_blocking_window() {
    let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    assert!(!PresenceTopicMeta::default().is_blocked(now));
    assert!(PresenceTopicMeta::blocked_until(now + Duration::minutes(5)).is_blocked(now));
    assert!(!PresenceTopicMeta::blocked_until(now - Duration::minutes(5)).is_blocked(now));
}

#[test]
fn topic_meta_dismissed_flag_serialization() {
    let plain = serde_json::to_value(PresenceTopicMeta::default()).unwrap();
    assert_eq!(plain, serde_json::json!({}));

    let meta = PresenceTopicMeta { blocked_until: None, dismissed: true };
    let json = serde_json::to_value(&meta).unwrap();
    assert_eq!(json, serde_json::json!({ "dismissed": true }));
    let back: PresenceTopicMeta = serde_json::from_value(json).unwrap();
    assert_eq!(back, meta);
}

#[test]
fn presence_status_parse_and_display() {
    for s in ["pending", "shown", "snoozed", "dismissed"] {
        let status: PresenceStatus = s.parse().unwrap();
        assert_eq!(status.to_string(), s);
    }
    assert!("gone".parse::<PresenceStatus>().is_err());
}

#[test]
fn pending_event_gets_unique_id() {
    let now = Utc::now();
    let a = PresenceEvent::pending("budget", "Check in on the budget?", now);
    let b = PresenceEvent::pending("budget", "Check in on the budget?", now);
    assert_ne!(a.id, b.id);
    assert_eq!(a.status, PresenceStatus::Pending);
    assert!(a.snoozed_until.is_none());
}

// ===========================================================================
// TurnRequest validation
// ===========================================================================

#[test]
fn turn_request_valid() {
    assert!(TurnRequest::new("u-1", "hello").validate().is_ok());
}

#[test]
fn turn_request_rejects_missing_fields() {
    assert!(matches!(
        TurnRequest::new("", "hello").validate(),
        Err(Error::InvalidTurn(_))
    ));
    assert!(matches!(
        TurnRequest::new("u-1", "   ").validate(),
        Err(Error::InvalidTurn(_))
    ));
    assert!(TurnRequest::new("u 1", "hello").validate().is_err());
}

#[test]
fn turn_request_rejects_oversized_message() {
    let long = "a".repeat(MAX_MESSAGE_CHARS + 1);
    assert!(TurnRequest::new("u-1", long).validate().is_err());
}

#[test]
fn turn_request_missing_json_field_fails_to_parse() {
    assert!(serde_json::from_str::<TurnRequest>(r#"{"user_id":"u-1"}"#).is_err());
}

// ===========================================================================
// CompletionReply
// ===========================================================================

#[test]
fn completion_reply_defaults() {
    let r: CompletionReply = serde_json::from_str(r#"{"text":"hi"}"#).unwrap();
    assert_eq!(r.text, "hi");
    assert!(!r.has_side_effects());
    let r = CompletionReply {
        tasks: vec![ProposedTask::titled("file taxes")],
        ..CompletionReply::text("ok")
    };
    assert!(r.has_side_effects());
}

// ===========================================================================
// Errors
// ===========================================================================

#[test]
fn error_display_and_fatality() {
    let e = Error::completion("anthropic", "timeout");
    assert_eq!(e.to_string(), "completion error: anthropic - timeout");
    assert!(e.is_turn_fatal());
    let e = Error::store("memory", "poisoned");
    assert_eq!(e.to_string(), "store error: memory - poisoned");
    assert!(!e.is_turn_fatal());
    assert!(Error::invalid_turn("x").is_turn_fatal());
}

#[test]
fn error_from_json() {
    let json_err = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
    let e: Error = json_err.into();
    assert!(e.to_string().starts_with("json error:"));
}

// ===========================================================================
// Config
// ===========================================================================

#[test]
fn config_defaults() {
    let c = CompassConfig::default();
    assert_eq!(c.stance.step, 2);
    assert_eq!(c.presence.scan_window, 50);
    assert_eq!(c.presence.cooldown_secs, 1_800);
    assert_eq!(c.facts.max_history, 8);
}

#[test]
fn config_partial_toml_fills_defaults() {
    let c = CompassConfig::from_toml("[presence]\ncooldown_secs = 60\n").unwrap();
    assert_eq!(c.presence.cooldown_secs, 60);
    assert_eq!(c.presence.scan_window, 50);
    assert_eq!(c.stance.step, 2);
}

#[test]
fn config_toml_roundtrip() {
    let c = CompassConfig::default();
    let text = c.to_toml();
    assert!(text.contains("[stance]"));
    let back = CompassConfig::from_toml(&text).unwrap();
    assert_eq!(back.completion.model, c.completion.model);
}

#[test]
fn config_load_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let c = CompassConfig::load(&dir.path().join("absent.toml"));
    assert_eq!(c.stance.step, 2);
}

#[test]
fn config_load_invalid_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("compass.toml");
    std::fs::write(&path, "stance = [not toml").unwrap();
    let c = CompassConfig::load(&path);
    assert_eq!(c.stance.step, 2);
}
