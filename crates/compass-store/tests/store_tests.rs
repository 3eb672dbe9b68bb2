//! Tests for compass-store: memory store semantics and JSON file persistence

use chrono::{Duration, TimeZone, Utc};
use compass_core::*;
use compass_store::*;
use std::sync::Arc;

fn user() -> UserId {
    UserId::from("u-1")
}

fn at(minute: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, minute, 0).unwrap()
}

fn record(key: &str, value: serde_json::Value) -> FactRecord {
    let candidate = FactCandidate::new(FactKey::new("budget", key, ""), value, at(0));
    FactRecord::from_candidate(&candidate, at(0))
}

// ===========================================================================
// Stance
// ===========================================================================

#[tokio::test]
async fn stance_absent_for_new_user() {
    let store = MemoryStore::new();
    assert!(store.load_stance(&user()).await.unwrap().is_none());
}

#[tokio::test]
async fn merge_stance_creates_default_then_patches() {
    let store = MemoryStore::new();
    let mut patch = StancePatch::empty();
    patch.set(StanceField::Directness, 7);

    let merged = store.merge_stance(&user(), &patch).await.unwrap();
    assert_eq!(merged.directness(), 7);
    assert_eq!(merged.patience(), 5);
    assert_eq!(store.load_stance(&user()).await.unwrap(), Some(merged));
}

#[tokio::test]
async fn merge_stance_touches_only_present_fields() {
    let store = MemoryStore::new();
    let mut first = StancePatch::empty();
    first.set(StanceField::Patience, 2);
    store.merge_stance(&user(), &first).await.unwrap();

    let mut second = StancePatch::empty();
    second.set(StanceField::ReflectionLevel, 9);
    let merged = store.merge_stance(&user(), &second).await.unwrap();

    assert_eq!(merged.patience(), 2);
    assert_eq!(merged.reflection_level(), 9);
}

#[tokio::test]
async fn merge_stance_clamps() {
    let store = MemoryStore::new();
    let mut patch = StancePatch::empty();
    patch.set(StanceField::EscalationThreshold, 40);
    let merged = store.merge_stance(&user(), &patch).await.unwrap();
    assert_eq!(merged.escalation_threshold(), 6);
}

#[tokio::test]
async fn concurrent_identical_patches_converge() {
    let store = Arc::new(MemoryStore::new());
    let mut patch = StancePatch::empty();
    patch.set(StanceField::Directness, 9);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        let patch = patch.clone();
        handles.push(tokio::spawn(async move {
            store.merge_stance(&user(), &patch).await.unwrap()
        }));
    }
    for h in handles {
        assert_eq!(h.await.unwrap().directness(), 9);
    }
}

// ===========================================================================
// Facts
// ===========================================================================

#[tokio::test]
async fn facts_put_get_and_replace_slot() {
    let store = MemoryStore::new();
    let rent = record("rent", serde_json::json!(800));
    store.put_fact(&user(), rent.clone()).await.unwrap();
    assert_eq!(store.get_fact(&user(), &rent.key).await.unwrap(), Some(rent.clone()));

    let newer = record("rent", serde_json::json!(950));
    store.put_fact(&user(), newer.clone()).await.unwrap();
    let all = store.load_facts(&user()).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].value, serde_json::json!(950));
}

#[tokio::test]
async fn facts_loaded_in_key_order() {
    let store = MemoryStore::new();
    store.put_fact(&user(), record("utilities", serde_json::json!(120))).await.unwrap();
    store.put_fact(&user(), record("rent", serde_json::json!(800))).await.unwrap();
    let keys: Vec<String> = store
        .load_facts(&user())
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.key.key)
        .collect();
    assert_eq!(keys, vec!["rent", "utilities"]);
}

#[tokio::test]
async fn facts_isolated_per_user() {
    let store = MemoryStore::new();
    store.put_fact(&user(), record("rent", serde_json::json!(800))).await.unwrap();
    assert!(store.load_facts(&UserId::from("u-2")).await.unwrap().is_empty());
}

// ===========================================================================
// Presence
// ===========================================================================

#[tokio::test]
async fn recent_events_most_recent_first_and_limited() {
    let store = MemoryStore::new();
    for m in [5, 1, 9, 3] {
        store
            .insert_event(&user(), PresenceEvent::pending("t", format!("m{}", m), at(m)))
            .await
            .unwrap();
    }
    let recent = store.recent_events(&user(), 3).await.unwrap();
    let texts: Vec<&str> = recent.iter().map(|e| e.text.as_str()).collect();
    assert_eq!(texts, vec!["m9", "m5", "m3"]);
}

#[tokio::test]
async fn update_event_sets_status_and_snooze() {
    let store = MemoryStore::new();
    let event = PresenceEvent::pending("bills", "Check the bill list?", at(0));
    let id = event.id.clone();
    store.insert_event(&user(), event).await.unwrap();

    let snoozed = store
        .update_event(&user(), &id, PresenceStatus::Snoozed, Some(at(30)))
        .await
        .unwrap();
    assert_eq!(snoozed.status, PresenceStatus::Snoozed);
    assert_eq!(snoozed.snoozed_until, Some(at(30)));

    let shown = store
        .update_event(&user(), &id, PresenceStatus::Shown, Some(at(45)))
        .await
        .unwrap();
    assert_eq!(shown.status, PresenceStatus::Shown);
    assert!(shown.snoozed_until.is_none());
}

#[tokio::test]
async fn dismissed_event_cannot_be_revived() {
    let store = MemoryStore::new();
    let event = PresenceEvent::pending("bills", "Check the bill list?", at(0));
    let id = event.id.clone();
    store.insert_event(&user(), event).await.unwrap();
    store.update_event(&user(), &id, PresenceStatus::Dismissed, None).await.unwrap();

    for status in [PresenceStatus::Pending, PresenceStatus::Shown, PresenceStatus::Snoozed] {
        let err = store
            .update_event(&user(), &id, status, Some(at(30)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition(_)), "{:?}", err);
    }

    // Dismissing again is accepted.
    let again = store
        .update_event(&user(), &id, PresenceStatus::Dismissed, None)
        .await
        .unwrap();
    assert_eq!(again.status, PresenceStatus::Dismissed);

    let events = store.recent_events(&user(), 10).await.unwrap();
    assert_eq!(events[0].status, PresenceStatus::Dismissed);
    assert!(events[0].snoozed_until.is_none());
}

#[tokio::test]
async fn dismissal_marks_topic_meta() {
    let store = MemoryStore::new();
    store
        .set_topic_meta(&user(), "bills", PresenceTopicMeta::blocked_until(at(50)))
        .await
        .unwrap();
    let event = PresenceEvent::pending("bills", "Check the bill list?", at(0));
    let id = event.id.clone();
    store.insert_event(&user(), event).await.unwrap();

    assert!(!store.topic_meta(&user(), "bills").await.unwrap().dismissed);
    store.update_event(&user(), &id, PresenceStatus::Dismissed, None).await.unwrap();

    let meta = store.topic_meta(&user(), "bills").await.unwrap();
    assert!(meta.dismissed);
    assert_eq!(meta.blocked_until, Some(at(50)));
    assert!(!store.topic_meta(&user(), "sleep").await.unwrap().dismissed);
}

#[tokio::test]
async fn update_unknown_event_is_not_found() {
    let store = MemoryStore::new();
    let err = store
        .update_event(&user(), "nope", PresenceStatus::Dismissed, None)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn topic_meta_defaults_and_set() {
    let store = MemoryStore::new();
    assert_eq!(store.topic_meta(&user(), "bills").await.unwrap(), PresenceTopicMeta::default());

    store
        .set_topic_meta(&user(), "bills", PresenceTopicMeta::blocked_until(at(50)))
        .await
        .unwrap();
    assert!(store.topic_meta(&user(), "bills").await.unwrap().is_blocked(at(10)));
    assert_eq!(store.all_topic_meta(&user()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn last_emitted_roundtrip() {
    let store = MemoryStore::new();
    assert!(store.last_emitted_at(&user()).await.unwrap().is_none());
    store.set_last_emitted_at(&user(), at(12)).await.unwrap();
    assert_eq!(store.last_emitted_at(&user()).await.unwrap(), Some(at(12)));
}

// ===========================================================================
// Errors
// ===========================================================================

#[test]
fn store_error_maps_to_non_fatal_core_error() {
    let core: compass_core::Error = StoreError::Backend("disk full".into()).into();
    assert!(!core.is_turn_fatal());
    assert!(core.to_string().contains("disk full"));
}

// ===========================================================================
// JsonFileStore
// ===========================================================================

#[tokio::test]
async fn file_store_starts_empty_without_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::open(dir.path().join("state.json")).await.unwrap();
    assert!(store.load_stance(&user()).await.unwrap().is_none());
    assert!(!store.path().exists());
}

#[tokio::test]
async fn file_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("state.json");

    let event_id = {
        let store = JsonFileStore::open(&path).await.unwrap();
        let mut patch = StancePatch::empty();
        patch.set(StanceField::Directness, 9);
        store.merge_stance(&user(), &patch).await.unwrap();
        store.put_fact(&user(), record("rent", serde_json::json!(950))).await.unwrap();

        let event = PresenceEvent::pending("bills", "Check in?", at(3));
        let id = event.id.clone();
        store.insert_event(&user(), event).await.unwrap();
        store.update_event(&user(), &id, PresenceStatus::Dismissed, None).await.unwrap();
        store
            .set_topic_meta(&user(), "sleep", PresenceTopicMeta::blocked_until(at(59)))
            .await
            .unwrap();
        store.set_last_emitted_at(&user(), at(3)).await.unwrap();
        id
    };

    let reopened = JsonFileStore::open(&path).await.unwrap();
    assert_eq!(reopened.load_stance(&user()).await.unwrap().unwrap().directness(), 9);
    assert_eq!(reopened.load_facts(&user()).await.unwrap()[0].value, serde_json::json!(950));
    let events = reopened.recent_events(&user(), 10).await.unwrap();
    assert_eq!(events[0].id, event_id);
    assert_eq!(events[0].status, PresenceStatus::Dismissed);
    assert!(reopened.topic_meta(&user(), "sleep").await.unwrap().is_blocked(at(0)));
    assert!(reopened.topic_meta(&user(), "bills").await.unwrap().dismissed);
    assert_eq!(reopened.last_emitted_at(&user()).await.unwrap(), Some(at(3)));
}

#[tokio::test]
async fn file_store_rejects_corrupt_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, "{ not json").unwrap();
    let err = JsonFileStore::open(&path).await.err().unwrap();
    assert!(matches!(err, StoreError::Encoding(_)));
}

#[tokio::test]
async fn snapshot_clamps_out_of_range_stance() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(
        &path,
        r#"{ "version": 1, "users": { "u-1": { "stance": { "directness": 99 } } } }"#,
    )
    .unwrap();
    let store = JsonFileStore::open(&path).await.unwrap();
    let stance = store.load_stance(&user()).await.unwrap().unwrap();
    assert_eq!(stance.directness(), 10);
    assert_eq!(stance.escalation_threshold(), 3);
}

#[tokio::test]
async fn snapshot_serializes_users_by_id() {
    let store = MemoryStore::new();
    store.set_last_emitted_at(&user(), at(0) + Duration::minutes(1)).await.unwrap();
    let json = serde_json::to_value(store.snapshot()).unwrap();
    assert_eq!(json["version"], 1);
    assert!(json["users"]["u-1"]["last_emitted_at"].is_string());
}
