//! Chaos Testing for Tiered Cache
//!
//! Failure injection through wrapper stores and loaders:
//! 1. **FailingBlobStore** - switchable enumerate/write/read/remove failures
//! 2. **Data corruption** - garbage bytes under an indexed name
//! 3. **Slow origins** - remote fetches that outlive the configured deadline
//!
//! # Running Chaos Tests
//! ```bash
//! cargo test --test chaos
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;

use tiered_cache::{
    BlobStore, CacheError, CacheItem, CacheState, CachedBlob, CodecError, InMemoryBlobStore,
    LoaderError, RemoteLoader, StorageError, TieredCache, TieredCacheConfig,
};

// =============================================================================
// Failing Wrappers - Precise Error Injection
// =============================================================================

/// Wraps a store and fails selected operations while their switch is on.
#[derive(Default)]
pub struct FailingBlobStore {
    inner: InMemoryBlobStore,
    fail_enumerate: AtomicBool,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    /// Names whose removal fails
    fail_removes: Mutex<HashSet<String>>,
    reads: AtomicU64,
}

impl FailingBlobStore {
    fn new() -> Self {
        Self::default()
    }

    fn set(flag: &AtomicBool, on: bool) {
        flag.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for FailingBlobStore {
    async fn enumerate(&self) -> Result<Vec<String>, StorageError> {
        if self.fail_enumerate.load(Ordering::SeqCst) {
            return Err(StorageError::Enumeration("disk unmounted".into()));
        }
        self.inner.enumerate().await
    }

    async fn write(&self, bytes: &[u8], name: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Write { name: name.into(), reason: "disk full".into() });
        }
        self.inner.write(bytes, name).await
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Read { name: name.into(), reason: "I/O error".into() });
        }
        self.inner.read(name).await
    }

    async fn remove(&self, name: &str) -> Result<(), StorageError> {
        if self.fail_removes.lock().unwrap().contains(name) {
            return Err(StorageError::Remove { name: name.into(), reason: "permission denied".into() });
        }
        self.inner.remove(name).await
    }
}

/// Loader with no memo. Optionally slow.
struct StubLoader {
    calls: AtomicU64,
    delay: Duration,
}

impl StubLoader {
    fn new() -> Self {
        Self { calls: AtomicU64::new(0), delay: Duration::ZERO }
    }

    fn slow(delay: Duration) -> Self {
        Self { calls: AtomicU64::new(0), delay }
    }

    fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteLoader<CachedBlob> for StubLoader {
    async fn fetch(&self, key: &str) -> Result<CachedBlob, LoaderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(CachedBlob::new(key, format!("remote:{}", key).into_bytes()))
    }

    fn contains(&self, _key: &str) -> bool {
        false
    }
}

async fn ready_cache(
    store: Arc<FailingBlobStore>,
    loader: Arc<StubLoader>,
    config: TieredCacheConfig,
) -> TieredCache<CachedBlob> {
    let mut cache: TieredCache<CachedBlob> = TieredCache::new(config, store, loader);
    cache.set_up().await.expect("set up");
    cache
}

// =============================================================================
// Persistent Tier Failures
// =============================================================================

#[tokio::test]
async fn failure_enumeration_fails_set_up() {
    let store = Arc::new(FailingBlobStore::new());
    FailingBlobStore::set(&store.fail_enumerate, true);

    let mut cache: TieredCache<CachedBlob> =
        TieredCache::new(TieredCacheConfig::default(), store.clone(), Arc::new(StubLoader::new()));

    assert!(matches!(cache.set_up().await, Err(CacheError::StoreInit(StorageError::Enumeration(_)))));
    assert_eq!(cache.state(), CacheState::Created);

    // Store comes back, set up can be retried.
    FailingBlobStore::set(&store.fail_enumerate, false);
    cache.set_up().await.unwrap();
    assert!(cache.is_ready());
}

#[tokio::test]
async fn failure_store_write_leaves_index_untouched() {
    let store = Arc::new(FailingBlobStore::new());
    let cache = ready_cache(store.clone(), Arc::new(StubLoader::new()), TieredCacheConfig::default()).await;
    FailingBlobStore::set(&store.fail_writes, true);

    let result = cache.store(&CachedBlob::new("k", b"v".to_vec()), "k").await;
    assert!(matches!(result, Err(CacheError::StoreWrite { ref key, .. }) if key == "k"));
    assert!(!cache.is_persisted("k").await);
    assert_eq!(cache.persisted_len().await, 0);
}

#[tokio::test]
async fn failure_post_fetch_store_still_returns_item() {
    let store = Arc::new(FailingBlobStore::new());
    let loader = Arc::new(StubLoader::new());
    let cache = ready_cache(store.clone(), loader.clone(), TieredCacheConfig::default()).await;
    FailingBlobStore::set(&store.fail_writes, true);

    let item = cache.fetch("k").await.expect("persistence failure must not surface");
    assert_eq!(item.content, b"remote:k");
    assert_eq!(loader.calls(), 1);
    assert!(!cache.is_persisted("k").await);
    assert!(store.inner.is_empty());
}

#[tokio::test]
async fn failure_read_error_falls_back_to_remote() {
    let store = Arc::new(FailingBlobStore::new());
    let loader = Arc::new(StubLoader::new());
    let cache = ready_cache(store.clone(), loader.clone(), TieredCacheConfig::default()).await;
    cache.store(&CachedBlob::new("k", b"disk".to_vec()), "k").await.unwrap();

    FailingBlobStore::set(&store.fail_reads, true);
    let item = cache.fetch("k").await.unwrap();

    assert_eq!(item.content, b"remote:k");
    assert_eq!(cache.access_count(), 0);
    assert_eq!(loader.calls(), 1);
    assert_eq!(store.reads.load(Ordering::SeqCst), 1);
    assert!(cache.is_persisted("k").await);
}

#[tokio::test]
async fn failure_corrupted_blob_is_replaced_by_remote_copy() {
    let store = Arc::new(FailingBlobStore::new());
    let loader = Arc::new(StubLoader::new());
    let cache = ready_cache(store.clone(), loader.clone(), TieredCacheConfig::default()).await;
    cache.store(&CachedBlob::new("k", b"disk".to_vec()), "k").await.unwrap();

    let name = cache.storage_name("k");
    store.inner.tamper(&name, b"\xff\xfe garbage".to_vec());

    let item = cache.fetch("k").await.unwrap();
    assert_eq!(item.content, b"remote:k");
    assert_eq!(cache.access_count(), 0);

    // The write-back healed the blob.
    let healed = CachedBlob::from_bytes(&store.inner.read(&name).await.unwrap()).unwrap();
    assert_eq!(healed.content, b"remote:k");
}

#[tokio::test]
async fn failure_clear_skips_unremovable_blobs() {
    let store = Arc::new(FailingBlobStore::new());
    let cache = ready_cache(store.clone(), Arc::new(StubLoader::new()), TieredCacheConfig::default()).await;
    for key in ["a", "b", "c"] {
        cache.store(&CachedBlob::new(key, key.as_bytes().to_vec()), key).await.unwrap();
    }
    cache.fetch("a").await.unwrap();
    let stuck = cache.storage_name("b");
    store.fail_removes.lock().unwrap().insert(stuck.clone());

    cache.clear().await.expect("clear is best effort");

    assert_eq!(cache.persisted_len().await, 0);
    assert_eq!(cache.access_count(), 0);
    assert_eq!(store.inner.len(), 1);
    assert!(store.inner.contains(&stuck));
}

// =============================================================================
// Encoding Failures
// =============================================================================

#[derive(Clone)]
struct Unencodable;

impl CacheItem for Unencodable {
    fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        Err(CodecError::Encode("no byte form".into()))
    }

    fn from_bytes(_bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(Unencodable)
    }
}

struct UnencodableLoader;

#[async_trait]
impl RemoteLoader<Unencodable> for UnencodableLoader {
    async fn fetch(&self, _key: &str) -> Result<Unencodable, LoaderError> {
        Ok(Unencodable)
    }

    fn contains(&self, _key: &str) -> bool {
        false
    }
}

#[tokio::test]
async fn failure_encode_error_is_reported_by_store_but_not_fetch() {
    let store = Arc::new(InMemoryBlobStore::new());
    let mut cache: TieredCache<Unencodable> =
        TieredCache::new(TieredCacheConfig::default(), store.clone(), Arc::new(UnencodableLoader));
    cache.set_up().await.unwrap();

    assert!(matches!(cache.store(&Unencodable, "k").await, Err(CacheError::Encode { .. })));
    assert!(cache.fetch("k").await.is_ok());
    assert!(store.is_empty());
    assert_eq!(cache.persisted_len().await, 0);
}

// =============================================================================
// Remote Deadline
// =============================================================================

#[tokio::test(start_paused = true)]
async fn failure_slow_remote_times_out() {
    let loader = Arc::new(StubLoader::slow(Duration::from_secs(30)));
    let config = TieredCacheConfig { remote_timeout_ms: Some(1_000), ..Default::default() };
    let cache = ready_cache(Arc::new(FailingBlobStore::new()), loader.clone(), config).await;

    match cache.fetch("k").await {
        Err(CacheError::RemoteFetch { source: LoaderError::Timeout { timeout_ms, .. }, .. }) => {
            assert_eq!(timeout_ms, 1_000);
        }
        other => panic!("expected timeout, got {:?}", other.map(|i| i.key)),
    }
    assert_eq!(loader.calls(), 1);
    assert!(!cache.is_persisted("k").await);
}

#[tokio::test(start_paused = true)]
async fn happy_remote_within_deadline() {
    let loader = Arc::new(StubLoader::slow(Duration::from_millis(200)));
    let config = TieredCacheConfig { remote_timeout_ms: Some(1_000), ..Default::default() };
    let cache = ready_cache(Arc::new(FailingBlobStore::new()), loader, config).await;

    assert_eq!(cache.fetch("k").await.unwrap().content, b"remote:k");
    assert!(cache.is_persisted("k").await);
}
