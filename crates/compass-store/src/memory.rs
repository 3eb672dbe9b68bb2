//! In-memory store on DashMap shards

use crate::{FactStore, PresenceStore, StanceStore, StoreError, StoreResult};
use chrono::{DateTime, Utc};
use compass_core::{
    FactKey, FactRecord, PresenceEvent, PresenceStatus, PresenceTopicMeta, StancePatch,
    StanceProfile, UserId,
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Default)]
pub struct MemoryStore {
    stances: DashMap<UserId, StanceProfile>,
    facts: DashMap<UserId, BTreeMap<FactKey, FactRecord>>,
    /// Kept in insertion order, which is creation order.
    events: DashMap<UserId, Vec<PresenceEvent>>,
    topics: DashMap<UserId, HashMap<String, PresenceTopicMeta>>,
    last_emitted: DashMap<UserId, DateTime<Utc>>,
}

/// Serializable image of the whole store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default = "snapshot_version")]
    pub version: u32,
    #[serde(default)]
    pub users: BTreeMap<UserId, UserState>,
}

fn snapshot_version() -> u32 {
    SNAPSHOT_VERSION
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stance: Option<StanceProfile>,
    #[serde(default)]
    pub facts: Vec<FactRecord>,
    #[serde(default)]
    pub presence_events: Vec<PresenceEvent>,
    #[serde(default)]
    pub topics: BTreeMap<String, PresenceTopicMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_emitted_at: Option<DateTime<Utc>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let store = Self::new();
        for (user, state) in snapshot.users {
            if let Some(stance) = state.stance {
                store.stances.insert(user.clone(), stance);
            }
            if !state.facts.is_empty() {
                let slots = state.facts.into_iter().map(|r| (r.key.clone(), r)).collect();
                store.facts.insert(user.clone(), slots);
            }
            if !state.presence_events.is_empty() {
                let mut events = state.presence_events;
                events.sort_by_key(|e| e.created_at);
                store.events.insert(user.clone(), events);
            }
            if !state.topics.is_empty() {
                store.topics.insert(user.clone(), state.topics.into_iter().collect());
            }
            if let Some(at) = state.last_emitted_at {
                store.last_emitted.insert(user, at);
            }
        }
        store
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let mut users: BTreeMap<UserId, UserState> = BTreeMap::new();

        for entry in self.stances.iter() {
            users.entry(entry.key().clone()).or_default().stance = Some(entry.value().clone());
        }
        for entry in self.facts.iter() {
            users.entry(entry.key().clone()).or_default().facts = entry.value().values().cloned().collect();
        }
        for entry in self.events.iter() {
            users.entry(entry.key().clone()).or_default().presence_events = entry.value().clone();
        }
        for entry in self.topics.iter() {
            users.entry(entry.key().clone()).or_default().topics =
                entry.value().iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        }
        for entry in self.last_emitted.iter() {
            users.entry(entry.key().clone()).or_default().last_emitted_at = Some(*entry.value());
        }

        StoreSnapshot {
            version: SNAPSHOT_VERSION,
            users,
        }
    }
}

#[async_trait::async_trait]
impl StanceStore for MemoryStore {
    async fn load_stance(&self, user: &UserId) -> StoreResult<Option<StanceProfile>> {
        Ok(self.stances.get(user).map(|s| s.clone()))
    }

    async fn merge_stance(&self, user: &UserId, patch: &StancePatch) -> StoreResult<StanceProfile> {
        // The entry guard holds the shard lock, so the read-modify-write is atomic per user.
        let mut entry = self.stances.entry(user.clone()).or_default();
        let next = entry.apply(patch);
        *entry = next.clone();
        debug!(user = %user, "stance merged");
        Ok(next)
    }
}

#[async_trait::async_trait]
impl FactStore for MemoryStore {
    async fn load_facts(&self, user: &UserId) -> StoreResult<Vec<FactRecord>> {
        Ok(self
            .facts
            .get(user)
            .map(|slots| slots.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_fact(&self, user: &UserId, key: &FactKey) -> StoreResult<Option<FactRecord>> {
        Ok(self.facts.get(user).and_then(|slots| slots.get(key).cloned()))
    }

    async fn put_fact(&self, user: &UserId, record: FactRecord) -> StoreResult<()> {
        self.facts
            .entry(user.clone())
            .or_default()
            .insert(record.key.clone(), record);
        Ok(())
    }
}

#[async_trait::async_trait]
impl PresenceStore for MemoryStore {
    async fn recent_events(&self, user: &UserId, limit: usize) -> StoreResult<Vec<PresenceEvent>> {
        let Some(events) = self.events.get(user) else {
            return Ok(Vec::new());
        };
        let mut recent: Vec<PresenceEvent> = events.iter().rev().take(limit).cloned().collect();
        // Stable: equal timestamps keep the newer insertion first.
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(recent)
    }

    async fn insert_event(&self, user: &UserId, event: PresenceEvent) -> StoreResult<()> {
        let mut events = self.events.entry(user.clone()).or_default();
        let pos = events
            .iter()
            .rposition(|e| e.created_at <= event.created_at)
            .map(|i| i + 1)
            .unwrap_or(0);
        events.insert(pos, event);
        Ok(())
    }

    async fn update_event(
        &self,
        user: &UserId,
        id: &str,
        status: PresenceStatus,
        snoozed_until: Option<DateTime<Utc>>,
    ) -> StoreResult<PresenceEvent> {
        let updated = {
            let mut events = self
                .events
                .get_mut(user)
                .ok_or_else(|| StoreError::NotFound(format!("presence event {}", id)))?;
            let event = events
                .iter_mut()
                .find(|e| e.id == id)
                .ok_or_else(|| StoreError::NotFound(format!("presence event {}", id)))?;

            if event.status == PresenceStatus::Dismissed && status != PresenceStatus::Dismissed {
                return Err(StoreError::InvalidTransition(format!(
                    "presence event {} is dismissed, cannot become {}",
                    id, status
                )));
            }
            event.status = status;
            event.snoozed_until = match status {
                PresenceStatus::Snoozed => snoozed_until,
                _ => None,
            };
            event.clone()
        };

        if status == PresenceStatus::Dismissed {
            self.topics
                .entry(user.clone())
                .or_default()
                .entry(updated.topic.clone())
                .or_default()
                .dismissed = true;
            debug!(user = %user, topic = %updated.topic, "presence topic dismissed");
        }
        Ok(updated)
    }

    async fn topic_meta(&self, user: &UserId, topic: &str) -> StoreResult<PresenceTopicMeta> {
        Ok(self
            .topics
            .get(user)
            .and_then(|topics| topics.get(topic).cloned())
            .unwrap_or_default())
    }

    async fn all_topic_meta(&self, user: &UserId) -> StoreResult<HashMap<String, PresenceTopicMeta>> {
        Ok(self.topics.get(user).map(|t| t.clone()).unwrap_or_default())
    }

    async fn set_topic_meta(&self, user: &UserId, topic: &str, meta: PresenceTopicMeta) -> StoreResult<()> {
        self.topics
            .entry(user.clone())
            .or_default()
            .insert(topic.to_string(), meta);
        Ok(())
    }

    async fn last_emitted_at(&self, user: &UserId) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(self.last_emitted.get(user).map(|at| *at))
    }

    async fn set_last_emitted_at(&self, user: &UserId, at: DateTime<Utc>) -> StoreResult<()> {
        self.last_emitted.insert(user.clone(), at);
        Ok(())
    }
}
