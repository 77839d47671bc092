// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Read/write API: store, fetch, clear.

use tracing::{debug, warn};

use crate::cache_item::CacheItem;
use crate::metrics::LatencyTimer;
use crate::remote::LoaderError;
use crate::resilience::timeout::{with_timeout, GuardError};
use crate::storage::traits::StorageError;

use super::{CacheError, CacheInner, TieredCache};

impl<T: CacheItem> TieredCache<T> {
    /// Persist `item` under `key`.
    ///
    /// The name enters the persisted-key index only after the blob store
    /// write succeeds. The memory tier is not touched.
    pub async fn store(&self, item: &T, key: &str) -> Result<(), CacheError> {
        self.ensure_ready()?;
        let _timer = LatencyTimer::new("disk", "store");
        let mut inner = self.inner.lock().await;
        self.persist_locked(&mut inner, item, key).await
    }

    /// Get the item for `key`: memory, then persisted blob, then remote.
    ///
    /// Only a remote failure is returned. A persisted blob that cannot be
    /// read or decoded falls through to the remote loader, and a failure to
    /// persist the remote result is logged and ignored.
    pub async fn fetch(&self, key: &str) -> Result<T, CacheError> {
        self.ensure_ready()?;
        let mut timer = LatencyTimer::new("memory", "fetch");

        {
            let mut inner = self.inner.lock().await;

            if let Some(item) = inner.memory.get(key) {
                debug!(key, "Served from memory");
                crate::metrics::record_hit("memory");
                return Ok(item.clone());
            }

            let name = self.storage_name(key);
            if inner.index.contains(&name) {
                timer.set_tier("disk");
                if let Some(item) = self.read_locked(&mut inner, key, &name).await {
                    let count = self.access.increment();
                    inner.memory.insert(key.to_string(), item.clone());
                    debug!(key, count, "Served from disk");
                    crate::metrics::record_hit("disk");
                    crate::metrics::set_access_count(count);
                    crate::metrics::set_memory_entries(inner.memory.len());
                    return Ok(item);
                }
            }
        }

        timer.set_tier("remote");
        let item = self.fetch_remote(key).await?;
        crate::metrics::record_hit("remote");

        let mut inner = self.inner.lock().await;
        if let Err(e) = self.persist_locked(&mut inner, &item, key).await {
            warn!(key, error = %e, "Could not persist remote item, serving it anyway");
        }
        inner.memory.insert(key.to_string(), item.clone());
        crate::metrics::set_memory_entries(inner.memory.len());
        Ok(item)
    }

    /// Remove every indexed blob, empty the index and reset the access count.
    ///
    /// Removal is best effort: a failing name is logged and skipped. The
    /// memory tier is left alone; use [`clear_memory`](Self::clear_memory).
    pub async fn clear(&self) -> Result<(), CacheError> {
        self.ensure_ready()?;
        let mut inner = self.inner.lock().await;

        let mut failed = 0usize;
        for name in inner.index.iter() {
            if let Err(source) = self.blob_store.remove(name).await {
                let err = CacheError::StoreRemove { name: name.clone(), source };
                warn!(error = %err, "Skipping blob during clear");
                crate::metrics::record_error("disk", "clear", err.kind());
                failed += 1;
            }
        }
        let removed = inner.index.len() - failed;
        inner.index.clear();
        self.access.reset();

        crate::metrics::set_index_entries(0);
        crate::metrics::set_access_count(0);
        debug!(removed, failed, "Persistent tier cleared");
        Ok(())
    }

    /// Empty the memory tier (and the loader's own memo). The index and
    /// access count are unchanged.
    pub async fn clear_memory(&self) -> Result<(), CacheError> {
        self.ensure_ready()?;
        let mut inner = self.inner.lock().await;
        let dropped = inner.memory.len();
        inner.memory.clear();
        self.loader.clear();
        crate::metrics::set_memory_entries(0);
        debug!(dropped, "Memory tier cleared");
        Ok(())
    }

    /// Encode and write `item`, then index it. Caller holds the lock.
    async fn persist_locked(
        &self,
        inner: &mut CacheInner<T>,
        item: &T,
        key: &str,
    ) -> Result<(), CacheError> {
        let bytes = item.to_bytes().map_err(|source| {
            crate::metrics::record_error("disk", "store", "encode");
            CacheError::Encode { key: key.to_string(), source }
        })?;

        let name = self.storage_name(key);
        self.blob_store.write(&bytes, &name).await.map_err(|source| {
            crate::metrics::record_error("disk", "store", source.kind());
            CacheError::StoreWrite { key: key.to_string(), source }
        })?;

        inner.index.insert(name);
        crate::metrics::record_bytes_written(bytes.len());
        crate::metrics::set_index_entries(inner.index.len());
        Ok(())
    }

    /// Read and decode an indexed blob. Caller holds the lock.
    ///
    /// A blob that is gone is dropped from the index; one that is present
    /// but unreadable stays indexed so `clear` still removes it.
    async fn read_locked(&self, inner: &mut CacheInner<T>, key: &str, name: &str) -> Option<T> {
        let bytes = match self.blob_store.read(name).await {
            Ok(bytes) => bytes,
            Err(StorageError::NotFound(_)) => {
                warn!(key, name, "Indexed blob is missing, falling back to remote");
                crate::metrics::record_error("disk", "fetch", "not_found");
                inner.index.remove(name);
                crate::metrics::set_index_entries(inner.index.len());
                return None;
            }
            Err(e) => {
                warn!(key, error = %e, "Failed to read indexed blob, falling back to remote");
                crate::metrics::record_error("disk", "fetch", e.kind());
                return None;
            }
        };
        crate::metrics::record_bytes_read(bytes.len());

        match T::from_bytes(&bytes) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(key, error = %e, "Failed to decode indexed blob, falling back to remote");
                crate::metrics::record_error("disk", "fetch", "decode");
                None
            }
        }
    }

    /// Ask the remote loader, bounded by `remote_timeout_ms` when set.
    async fn fetch_remote(&self, key: &str) -> Result<T, CacheError> {
        let result = match self.config.remote_timeout() {
            None => self.loader.fetch(key).await,
            Some(timeout) => {
                let loader = self.loader.clone();
                let owned = key.to_string();
                match with_timeout(timeout, move || async move { loader.fetch(&owned).await }).await {
                    Ok(item) => Ok(item),
                    Err(GuardError::Operation(e)) => Err(e),
                    Err(GuardError::Timeout(_)) => Err(LoaderError::Timeout {
                        key: key.to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                    }),
                    Err(GuardError::Cancelled) => Err(LoaderError::Cancelled(key.to_string())),
                }
            }
        };

        match result {
            Ok(item) => {
                crate::metrics::record_remote_fetch("success");
                Ok(item)
            }
            Err(source) => {
                warn!(key, error = %source, "Remote fetch failed");
                crate::metrics::record_remote_fetch("error");
                crate::metrics::record_error("remote", "fetch", "loader");
                Err(CacheError::RemoteFetch { key: key.to_string(), source })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use async_trait::async_trait;

    use crate::cache_item::CachedBlob;
    use crate::config::TieredCacheConfig;
    use crate::remote::{LoaderError, RemoteLoader};
    use crate::storage::memory::InMemoryBlobStore;
    use crate::storage::traits::BlobStore;

    use super::super::{CacheError, CacheState, TieredCache};

    /// Loader without its own memo, counting calls.
    struct CountingLoader {
        calls: AtomicU64,
    }

    #[async_trait]
    impl RemoteLoader<CachedBlob> for CountingLoader {
        async fn fetch(&self, key: &str) -> Result<CachedBlob, LoaderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if key == "unreachable" {
                return Err(LoaderError::Fetch { key: key.into(), reason: "offline".into() });
            }
            Ok(CachedBlob::new(key, format!("remote:{}", key).into_bytes()))
        }

        fn contains(&self, _key: &str) -> bool {
            false
        }
    }

    async fn ready_cache(
        store: Arc<InMemoryBlobStore>,
    ) -> (TieredCache<CachedBlob>, Arc<CountingLoader>) {
        let loader = Arc::new(CountingLoader { calls: AtomicU64::new(0) });
        let mut cache = TieredCache::new(TieredCacheConfig::default(), store, loader.clone());
        cache.set_up().await.unwrap();
        (cache, loader)
    }

    #[tokio::test]
    async fn test_operations_before_set_up_are_rejected() {
        let loader = Arc::new(CountingLoader { calls: AtomicU64::new(0) });
        let cache: TieredCache<CachedBlob> = TieredCache::new(
            TieredCacheConfig::default(),
            Arc::new(InMemoryBlobStore::new()),
            loader.clone(),
        );

        assert!(matches!(cache.fetch("x").await, Err(CacheError::NotReady(CacheState::Created))));
        assert!(matches!(cache.clear().await, Err(CacheError::NotReady(_))));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_store_then_fetch_reads_disk_once() {
        let (cache, loader) = ready_cache(Arc::new(InMemoryBlobStore::new())).await;
        let item = CachedBlob::new("k", b"stored".to_vec());

        cache.store(&item, "k").await.unwrap();
        assert!(cache.is_persisted("k").await);
        assert_eq!(cache.memory_len().await, 0);

        assert_eq!(cache.fetch("k").await.unwrap().content, b"stored");
        assert_eq!(cache.access_count(), 1);

        // Second fetch is a memory hit.
        assert_eq!(cache.fetch("k").await.unwrap().content, b"stored");
        assert_eq!(cache.access_count(), 1);
        assert_eq!(loader.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_remote_result_is_persisted_and_memoized() {
        let store = Arc::new(InMemoryBlobStore::new());
        let (cache, loader) = ready_cache(store.clone()).await;

        let item = cache.fetch("fresh").await.unwrap();
        assert_eq!(item.content, b"remote:fresh");
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        assert!(store.contains(&cache.storage_name("fresh")));
        assert!(cache.is_persisted("fresh").await);

        cache.fetch("fresh").await.unwrap();
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.access_count(), 0);
    }

    #[tokio::test]
    async fn test_remote_failure_propagates() {
        let (cache, _) = ready_cache(Arc::new(InMemoryBlobStore::new())).await;

        match cache.fetch("unreachable").await {
            Err(CacheError::RemoteFetch { key, .. }) => assert_eq!(key, "unreachable"),
            other => panic!("expected remote fetch error, got {:?}", other.map(|i| i.key)),
        }
        assert!(!cache.is_persisted("unreachable").await);
    }

    #[tokio::test]
    async fn test_missing_indexed_blob_is_unindexed_and_refetched() {
        let store = Arc::new(InMemoryBlobStore::new());
        let (cache, loader) = ready_cache(store.clone()).await;
        cache.store(&CachedBlob::new("k", b"v".to_vec()), "k").await.unwrap();

        store.remove(&cache.storage_name("k")).await.unwrap();

        let item = cache.fetch("k").await.unwrap();
        assert_eq!(item.content, b"remote:k");
        assert_eq!(cache.access_count(), 0);
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);
        // Re-persisted by the remote path.
        assert!(store.contains(&cache.storage_name("k")));
        assert!(cache.is_persisted("k").await);
    }

    #[tokio::test]
    async fn test_clear_memory_keeps_index_and_count() {
        let (cache, _) = ready_cache(Arc::new(InMemoryBlobStore::new())).await;
        cache.store(&CachedBlob::new("k", b"v".to_vec()), "k").await.unwrap();
        cache.fetch("k").await.unwrap();

        cache.clear_memory().await.unwrap();
        assert_eq!(cache.memory_len().await, 0);
        assert_eq!(cache.persisted_len().await, 1);
        assert_eq!(cache.access_count(), 1);

        cache.fetch("k").await.unwrap();
        assert_eq!(cache.access_count(), 2);
    }

    #[tokio::test]
    async fn test_clear_empties_index_and_store() {
        let store = Arc::new(InMemoryBlobStore::new());
        let (cache, _) = ready_cache(store.clone()).await;
        for key in ["a", "b", "c"] {
            cache.store(&CachedBlob::new(key, key.as_bytes().to_vec()), key).await.unwrap();
        }
        cache.fetch("a").await.unwrap();

        cache.clear().await.unwrap();
        assert_eq!(cache.persisted_len().await, 0);
        assert_eq!(cache.access_count(), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_contains_checks_every_tier() {
        let (cache, _) = ready_cache(Arc::new(InMemoryBlobStore::new())).await;
        assert!(!cache.contains("k").await);

        cache.store(&CachedBlob::new("k", b"v".to_vec()), "k").await.unwrap();
        assert!(cache.contains("k").await);
    }
}
