//! Distributed Cache Contract
//!
//! The object-safe surface the HTTP layer and the backend registry work with.
//! Every engine is one, whatever store and timestamp type it runs on.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::cache::{CacheStats, CacheStore, ContextCache, ExpirationOptions};
use crate::error::Result;

// == Distributed Cache ==
#[async_trait]
pub trait DistributedCache: Send + Sync {
    /// Tag of the backend serving this cache.
    fn backend(&self) -> &'static str;

    async fn get(&self, key: &str, cancel: &CancellationToken) -> Result<Option<Vec<u8>>>;

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        options: &ExpirationOptions,
        cancel: &CancellationToken,
    ) -> Result<()>;

    async fn refresh(&self, key: &str, cancel: &CancellationToken) -> Result<()>;

    async fn remove(&self, key: &str, cancel: &CancellationToken) -> Result<()>;

    /// Runs a cleanup sweep now and waits for it.
    async fn remove_expired_entries(&self) -> Result<usize>;

    fn stats(&self) -> CacheStats;
}

#[async_trait]
impl<S: CacheStore> DistributedCache for ContextCache<S> {
    fn backend(&self) -> &'static str {
        self.store().name()
    }

    async fn get(&self, key: &str, cancel: &CancellationToken) -> Result<Option<Vec<u8>>> {
        self.get_async(key, cancel).await
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        options: &ExpirationOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.set_async(key, value, options, cancel).await
    }

    async fn refresh(&self, key: &str, cancel: &CancellationToken) -> Result<()> {
        self.refresh_async(key, cancel).await
    }

    async fn remove(&self, key: &str, cancel: &CancellationToken) -> Result<()> {
        self.remove_async(key, cancel).await
    }

    async fn remove_expired_entries(&self) -> Result<usize> {
        self.remove_expired_entries_async().await
    }

    fn stats(&self) -> CacheStats {
        ContextCache::stats(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{DateTime, FixedOffset};

    use crate::cache::{MemoryStore, SqliteStore};
    use crate::config::CacheOptions;

    async fn exercise(cache: Arc<dyn DistributedCache>) {
        let cancel = CancellationToken::new();

        cache
            .set("Key", b"value".to_vec(), &ExpirationOptions::new(), &cancel)
            .await
            .unwrap();
        assert_eq!(cache.get("Key", &cancel).await.unwrap(), Some(b"value".to_vec()));

        cache.refresh("Key", &cancel).await.unwrap();
        cache.remove("Key", &cancel).await.unwrap();
        assert_eq!(cache.get("Key", &cancel).await.unwrap(), None);
        assert_eq!(cache.remove_expired_entries().await.unwrap(), 0);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.sets, 1);
    }

    #[tokio::test]
    async fn test_memory_engine_as_trait_object() {
        let store = MemoryStore::<DateTime<FixedOffset>>::new();
        let cache: Arc<dyn DistributedCache> =
            Arc::new(ContextCache::new(store, CacheOptions::default()));
        assert_eq!(cache.backend(), "memory");
        exercise(cache).await;
    }

    #[tokio::test]
    async fn test_sqlite_engine_as_trait_object() {
        let store = SqliteStore::open_in_memory().unwrap();
        let cache: Arc<dyn DistributedCache> =
            Arc::new(ContextCache::new(store, CacheOptions::default()));
        assert_eq!(cache.backend(), "sqlite");
        exercise(cache).await;
    }
}
