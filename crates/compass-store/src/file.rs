//! JSON file store: a MemoryStore mirrored to a snapshot on disk
//!
//! The snapshot is read once at open and rewritten after every write.
//! Rewrites go through a temp file and a rename, serialized by a mutex.

use crate::memory::{MemoryStore, StoreSnapshot};
use crate::{FactStore, PresenceStore, StanceStore, StoreResult};
use chrono::{DateTime, Utc};
use compass_core::{
    FactKey, FactRecord, PresenceEvent, PresenceStatus, PresenceTopicMeta, StancePatch,
    StanceProfile, UserId,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open the snapshot at `path`, starting empty if it does not exist.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let inner = match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let snapshot: StoreSnapshot = serde_json::from_str(&content)?;
                info!("Loaded state for {} users from {}", snapshot.users.len(), path.display());
                MemoryStore::from_snapshot(snapshot)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No state at {}, starting empty", path.display());
                MemoryStore::new()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            inner,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let json = serde_json::to_string_pretty(&self.inner.snapshot())?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!("State written to {}", self.path.display());
        Ok(())
    }
}

#[async_trait::async_trait]
impl StanceStore for JsonFileStore {
    async fn load_stance(&self, user: &UserId) -> StoreResult<Option<StanceProfile>> {
        self.inner.load_stance(user).await
    }

    async fn merge_stance(&self, user: &UserId, patch: &StancePatch) -> StoreResult<StanceProfile> {
        let merged = self.inner.merge_stance(user, patch).await?;
        self.persist().await?;
        Ok(merged)
    }
}

#[async_trait::async_trait]
impl FactStore for JsonFileStore {
    async fn load_facts(&self, user: &UserId) -> StoreResult<Vec<FactRecord>> {
        self.inner.load_facts(user).await
    }

    async fn get_fact(&self, user: &UserId, key: &FactKey) -> StoreResult<Option<FactRecord>> {
        self.inner.get_fact(user, key).await
    }

    async fn put_fact(&self, user: &UserId, record: FactRecord) -> StoreResult<()> {
        self.inner.put_fact(user, record).await?;
        self.persist().await
    }
}

#[async_trait::async_trait]
impl PresenceStore for JsonFileStore {
    async fn recent_events(&self, user: &UserId, limit: usize) -> StoreResult<Vec<PresenceEvent>> {
        self.inner.recent_events(user, limit).await
    }

    async fn insert_event(&self, user: &UserId, event: PresenceEvent) -> StoreResult<()> {
        self.inner.insert_event(user, event).await?;
        self.persist().await
    }

    async fn update_event(
        &self,
        user: &UserId,
        id: &str,
        status: PresenceStatus,
        snoozed_until: Option<DateTime<Utc>>,
    ) -> StoreResult<PresenceEvent> {
        let event = self.inner.update_event(user, id, status, snoozed_until).await?;
        self.persist().await?;
        Ok(event)
    }

    async fn topic_meta(&self, user: &UserId, topic: &str) -> StoreResult<PresenceTopicMeta> {
        self.inner.topic_meta(user, topic).await
    }

    async fn all_topic_meta(&self, user: &UserId) -> StoreResult<HashMap<String, PresenceTopicMeta>> {
        self.inner.all_topic_meta(user).await
    }

    async fn set_topic_meta(&self, user: &UserId, topic: &str, meta: PresenceTopicMeta) -> StoreResult<()> {
        self.inner.set_topic_meta(user, topic, meta).await?;
        self.persist().await
    }

    async fn last_emitted_at(&self, user: &UserId) -> StoreResult<Option<DateTime<Utc>>> {
        self.inner.last_emitted_at(user).await
    }

    async fn set_last_emitted_at(&self, user: &UserId, at: DateTime<Utc>) -> StoreResult<()> {
        self.inner.set_last_emitted_at(user, at).await?;
        self.persist().await
    }
}
