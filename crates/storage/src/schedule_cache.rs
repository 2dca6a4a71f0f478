use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use mentor_core::model::{MenteeCacheEntry, MenteeId, SessionId};
use tokio::sync::Mutex;
use tracing::warn;

use crate::MENTEE_SCHEDULES_KEY;
use crate::repository::{KeyValueStore, StorageError};

/// Entries older than this are dropped by [`ScheduleCache::evict_expired`].
pub const DEFAULT_CACHE_TTL_DAYS: i64 = 14;

type ScheduleMap = BTreeMap<MenteeId, MenteeCacheEntry>;

/// Per-mentee side cache of the most recently scheduled session.
///
/// The whole map lives as one JSON object under `menteeSchedules` and is
/// re-parsed on every access; the store is the only source of truth. All
/// read-modify-write cycles go through one async mutex so concurrent pollers
/// and scheduling calls apply in a deterministic order.
pub struct ScheduleCache {
    kv: Arc<dyn KeyValueStore>,
    ttl: Duration,
    write_lock: Mutex<()>,
}

impl ScheduleCache {
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            ttl: Duration::days(DEFAULT_CACHE_TTL_DAYS),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fetch the cached entry for a mentee.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    pub async fn get(&self, mentee: &MenteeId) -> Result<Option<MenteeCacheEntry>, StorageError> {
        Ok(self.load().await?.remove(mentee))
    }

    /// All cached entries, ordered by mentee id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    pub async fn entries(&self) -> Result<Vec<(MenteeId, MenteeCacheEntry)>, StorageError> {
        Ok(self.load().await?.into_iter().collect())
    }

    /// Overwrite the entry for a mentee, stamping it with `now`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the map cannot be read or written back.
    pub async fn set(
        &self,
        mentee: &MenteeId,
        mut entry: MenteeCacheEntry,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        entry.cached_at = Some(now);
        self.modify(|map| {
            map.insert(mentee.clone(), entry);
            true
        })
        .await
        .map(|_| ())
    }

    /// Flip `completed` on the mentee's entry if it still refers to `session`.
    ///
    /// Returns `true` when the flag changed. An entry that was overwritten by
    /// a newer schedule in the meantime is left alone.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the map cannot be read or written back.
    pub async fn mark_completed(
        &self,
        mentee: &MenteeId,
        session: Option<&SessionId>,
    ) -> Result<bool, StorageError> {
        self.modify(|map| {
            let Some(entry) = map.get_mut(mentee) else {
                return false;
            };
            if entry.completed || entry.session_id.as_ref() != session {
                return false;
            }
            entry.completed = true;
            true
        })
        .await
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the map cannot be read or written back.
    pub async fn remove(&self, mentee: &MenteeId) -> Result<bool, StorageError> {
        self.modify(|map| map.remove(mentee).is_some()).await
    }

    /// Drop entries stamped more than the TTL before `now`. Entries without a
    /// stamp are treated as written at `now` and stamped, so they age from the
    /// first eviction pass that sees them.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the map cannot be read or written back.
    pub async fn evict_expired(&self, now: DateTime<Utc>) -> Result<usize, StorageError> {
        let ttl = self.ttl;
        let mut evicted = 0;
        self.modify(|map| {
            let before = map.len();
            let mut stamped = false;
            map.retain(|_, entry| match entry.cached_at {
                Some(at) => now - at <= ttl,
                None => {
                    entry.cached_at = Some(now);
                    stamped = true;
                    true
                }
            });
            evicted = before - map.len();
            evicted > 0 || stamped
        })
        .await?;
        Ok(evicted)
    }

    /// Drop entries the authoritative mentee list has superseded.
    ///
    /// `known` maps each mentee returned by the server to the session id the
    /// server reports as next (if any). Entries for unknown mentees, and
    /// entries whose session the server already reports, are removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the map cannot be read or written back.
    pub async fn reconcile_with(
        &self,
        known: &BTreeMap<MenteeId, Option<SessionId>>,
    ) -> Result<usize, StorageError> {
        let mut dropped = 0;
        self.modify(|map| {
            let before = map.len();
            map.retain(|mentee, entry| match known.get(mentee) {
                None => false,
                Some(server_session) => {
                    server_session.is_none() || server_session.as_ref() != entry.session_id.as_ref()
                }
            });
            dropped = before - map.len();
            dropped > 0
        })
        .await?;
        Ok(dropped)
    }

    async fn load(&self) -> Result<ScheduleMap, StorageError> {
        let Some(raw) = self.kv.get(MENTEE_SCHEDULES_KEY).await? else {
            return Ok(ScheduleMap::new());
        };
        match serde_json::from_str(&raw) {
            Ok(map) => Ok(map),
            Err(err) => {
                warn!(error = %err, "Discarding unreadable mentee schedule cache");
                Ok(ScheduleMap::new())
            }
        }
    }

    async fn store(&self, map: &ScheduleMap) -> Result<(), StorageError> {
        let raw =
            serde_json::to_string(map).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.kv.set(MENTEE_SCHEDULES_KEY, &raw).await
    }

    /// Runs `f` on a freshly loaded map and writes it back when `f` reports a
    /// change.
    async fn modify<F>(&self, f: F) -> Result<bool, StorageError>
    where
        F: FnOnce(&mut ScheduleMap) -> bool,
    {
        let _guard = self.write_lock.lock().await;
        let mut map = self.load().await?;
        let changed = f(&mut map);
        if changed {
            self.store(&map).await?;
        }
        Ok(changed)
    }
}
