//! In-memory result cache implementation using moka

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;

use crate::application::services::{CacheError, ResultCache};
use crate::domain::entities::ScanSnapshot;

#[derive(Clone)]
struct CachedResult {
    data: Vec<u8>,
    ttl: Duration,
}

/// Each entry carries the TTL it was stored with.
struct PerEntryTtl;

impl Expiry<String, CachedResult> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedResult,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// moka-backed [`ResultCache`] with per-entry TTL.
pub struct MokaResultCache {
    cache: Cache<String, CachedResult>,
}

impl MokaResultCache {
    /// Create a cache holding at most `max_entries` snapshots.
    pub fn new(max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(PerEntryTtl)
            .build();
        Self { cache }
    }
}

#[async_trait]
impl ResultCache for MokaResultCache {
    async fn get(&self, key: &str) -> Result<Option<ScanSnapshot>, CacheError> {
        match self.cache.get(key).await {
            Some(entry) => serde_json::from_slice(&entry.data)
                .map(Some)
                .map_err(|e| CacheError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &str,
        snapshot: &ScanSnapshot,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let data =
            serde_json::to_vec(snapshot).map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.cache
            .insert(key.to_string(), CachedResult { data, ttl })
            .await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.cache.invalidate(key).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::ScanJob;
    use crate::domain::value_objects::ScanProvider;

    fn snapshot() -> ScanSnapshot {
        ScanSnapshot::from(&ScanJob::new(
            "https://github.com/acme/app.git",
            ScanProvider::GitHub,
        ))
    }

    #[tokio::test]
    async fn roundtrip_and_delete() {
        let cache = MokaResultCache::new(16);
        let snap = snapshot();

        cache
            .set("scan:github:abc", &snap, Duration::from_secs(60))
            .await
            .unwrap();
        let got = cache.get("scan:github:abc").await.unwrap().unwrap();
        assert_eq!(got.id, snap.id);

        cache.delete("scan:github:abc").await.unwrap();
        assert!(cache.get("scan:github:abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn entries_expire_after_their_own_ttl() {
        let cache = MokaResultCache::new(16);
        cache
            .set("short", &snapshot(), Duration::from_millis(50))
            .await
            .unwrap();
        cache
            .set("long", &snapshot(), Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(cache.get("short").await.unwrap().is_none());
        assert!(cache.get("long").await.unwrap().is_some());
    }
}
