//! Eligible-list storage.
//!
//! [`EligibleCacheStore`] is the seam between the ad-slot service and whatever
//! holds cached id lists. [`MemoryEligibleStore`] keeps them in a per-process
//! LRU; the Postgres adapter lives in `infra::db`.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use lru::LruCache;
use metrics::{counter, gauge};
use time::{Duration, OffsetDateTime};

use crate::application::repos::RepoError;
use crate::domain::entities::ItemId;

use super::clock::Clock;
use super::config::CacheConfig;
use super::keys::EligibleKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

#[async_trait]
pub trait EligibleCacheStore: Send + Sync {
    /// The cached list, or `None` when absent or expired.
    async fn get(&self, key: &EligibleKey) -> Result<Option<Vec<ItemId>>, RepoError>;

    async fn put(&self, key: &EligibleKey, ids: &[ItemId], ttl: Duration)
    -> Result<(), RepoError>;

    async fn remove(&self, key: &EligibleKey) -> Result<(), RepoError>;
}

#[derive(Debug, Clone)]
struct CachedIds {
    ids: Vec<ItemId>,
    expires_at: OffsetDateTime,
}

pub struct MemoryEligibleStore {
    entries: RwLock<LruCache<EligibleKey, CachedIds>>,
    clock: Arc<dyn Clock>,
}

impl MemoryEligibleStore {
    pub fn new(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        rw_write(&self.entries, SOURCE, "clear").clear();
    }
}

#[async_trait]
impl EligibleCacheStore for MemoryEligibleStore {
    async fn get(&self, key: &EligibleKey) -> Result<Option<Vec<ItemId>>, RepoError> {
        let now = self.clock.now();
        // `LruCache::get` promotes the entry, so even reads take the write lock.
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > now => return Ok(Some(entry.ids.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        Ok(None)
    }

    async fn put(
        &self,
        key: &EligibleKey,
        ids: &[ItemId],
        ttl: Duration,
    ) -> Result<(), RepoError> {
        let entry = CachedIds {
            ids: ids.to_vec(),
            expires_at: self.clock.now() + ttl,
        };
        let mut entries = rw_write(&self.entries, SOURCE, "put");
        let evicted = entries.push(key.clone(), entry);
        gauge!("sponsorship_eligible_cache_entries").set(entries.len() as f64);
        drop(entries);
        if let Some((evicted_key, _)) = evicted {
            if &evicted_key != key {
                counter!("sponsorship_eligible_cache_evict_total").increment(1);
            }
        }
        Ok(())
    }

    async fn remove(&self, key: &EligibleKey) -> Result<(), RepoError> {
        rw_write(&self.entries, SOURCE, "remove").pop(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::ManualClock;

    fn store(capacity: usize) -> (MemoryEligibleStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(OffsetDateTime::UNIX_EPOCH));
        let config = CacheConfig {
            capacity,
            ..Default::default()
        };
        (MemoryEligibleStore::new(&config, clock.clone()), clock)
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let (store, clock) = store(8);
        let key = EligibleKey::for_slot("sidebar", None);
        store
            .put(&key, &[42, 7], Duration::minutes(15))
            .await
            .expect("put");

        clock.advance(Duration::minutes(14));
        assert_eq!(store.get(&key).await.expect("get"), Some(vec![42, 7]));

        clock.advance(Duration::minutes(1));
        assert_eq!(store.get(&key).await.expect("get"), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn empty_lists_are_cached() {
        let (store, _) = store(8);
        let key = EligibleKey::for_slot("footer", None);
        store
            .put(&key, &[], Duration::minutes(15))
            .await
            .expect("put");
        assert_eq!(store.get(&key).await.expect("get"), Some(Vec::new()));
    }

    #[tokio::test]
    async fn least_recent_entry_is_evicted() {
        let (store, _) = store(1);
        let first = EligibleKey::for_slot("a", None);
        let second = EligibleKey::for_slot("b", None);
        store.put(&first, &[1], Duration::minutes(1)).await.expect("put");
        store.put(&second, &[2], Duration::minutes(1)).await.expect("put");

        assert_eq!(store.get(&first).await.expect("get"), None);
        assert_eq!(store.get(&second).await.expect("get"), Some(vec![2]));
    }
}
