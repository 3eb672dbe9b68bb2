//! Compass Store - persistence contracts for stance, facts and presence
//!
//! Writes are partial merges: `merge_stance` touches only the fields present
//! in the patch, `put_fact` replaces a single slot, presence writes touch a
//! single event or topic. There are no cross-call transactions.

pub mod file;
pub mod memory;

pub use file::JsonFileStore;
pub use memory::{MemoryStore, StoreSnapshot, UserState};

use chrono::{DateTime, Utc};
use compass_core::{
    FactKey, FactRecord, PresenceEvent, PresenceStatus, PresenceTopicMeta, StancePatch,
    StanceProfile, UserId,
};
use std::collections::HashMap;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),
}

impl From<StoreError> for compass_core::Error {
    fn from(e: StoreError) -> Self {
        compass_core::Error::store("store", e.to_string())
    }
}

#[async_trait::async_trait]
pub trait StanceStore: Send + Sync {
    /// `None` when the user has never been seen.
    async fn load_stance(&self, user: &UserId) -> StoreResult<Option<StanceProfile>>;

    /// Apply only the fields present in `patch`, creating a default profile
    /// first if none exists. Returns the stored result.
    async fn merge_stance(&self, user: &UserId, patch: &StancePatch) -> StoreResult<StanceProfile>;
}

#[async_trait::async_trait]
pub trait FactStore: Send + Sync {
    /// All records for a user, ordered by key.
    async fn load_facts(&self, user: &UserId) -> StoreResult<Vec<FactRecord>>;

    async fn get_fact(&self, user: &UserId, key: &FactKey) -> StoreResult<Option<FactRecord>>;

    /// Write the record into its slot, replacing whatever was there.
    async fn put_fact(&self, user: &UserId, record: FactRecord) -> StoreResult<()>;
}

#[async_trait::async_trait]
pub trait PresenceStore: Send + Sync {
    /// Up to `limit` events, most recently created first.
    async fn recent_events(&self, user: &UserId, limit: usize) -> StoreResult<Vec<PresenceEvent>>;

    async fn insert_event(&self, user: &UserId, event: PresenceEvent) -> StoreResult<()>;

    /// User interaction: mark an event shown, snoozed or dismissed.
    /// Dismissal is final: moving a dismissed event to any other status is
    /// an `InvalidTransition`, and dismissing marks the topic meta
    /// `dismissed`.
    async fn update_event(
        &self,
        user: &UserId,
        id: &str,
        status: PresenceStatus,
        snoozed_until: Option<DateTime<Utc>>,
    ) -> StoreResult<PresenceEvent>;

    /// Default (unblocked) meta when the topic has none.
    async fn topic_meta(&self, user: &UserId, topic: &str) -> StoreResult<PresenceTopicMeta>;

    async fn all_topic_meta(&self, user: &UserId) -> StoreResult<HashMap<String, PresenceTopicMeta>>;

    async fn set_topic_meta(&self, user: &UserId, topic: &str, meta: PresenceTopicMeta) -> StoreResult<()>;

    async fn last_emitted_at(&self, user: &UserId) -> StoreResult<Option<DateTime<Utc>>>;

    async fn set_last_emitted_at(&self, user: &UserId, at: DateTime<Utc>) -> StoreResult<()>;
}

/// Everything the turn pipeline needs from persistence.
pub trait Store: StanceStore + FactStore + PresenceStore {}

impl<T: StanceStore + FactStore + PresenceStore> Store for T {}
