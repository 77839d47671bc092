// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Tiered cache coordinator.
//!
//! The [`TieredCache`] serves items through three layers:
//! - memory: items already fetched in this process
//! - persistent: the [`BlobStore`], consulted only for names in the
//!   persisted-key index
//! - remote: the [`RemoteLoader`], whose results are written back
//!
//! # Lifecycle
//!
//! ```text
//! Created → SettingUp → Ready → ShutDown
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use tiered_cache::{
//!     CacheState, CachedBlob, CachingLoader, InMemoryBlobStore, LoaderError, Origin,
//!     TieredCache, TieredCacheConfig,
//! };
//!
//! struct Static;
//!
//! #[async_trait]
//! impl Origin<CachedBlob> for Static {
//!     async fn download(&self, key: &str) -> Result<CachedBlob, LoaderError> {
//!         Ok(CachedBlob::new(key, key.as_bytes().to_vec()))
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = Arc::new(InMemoryBlobStore::new());
//! let loader = Arc::new(CachingLoader::new(Static));
//! let mut cache: TieredCache<CachedBlob> =
//!     TieredCache::new(TieredCacheConfig::default(), store, loader);
//!
//! cache.set_up().await.unwrap();
//! assert_eq!(cache.state(), CacheState::Ready);
//!
//! let item = cache.fetch("hello").await.unwrap();
//! assert_eq!(item.content, b"hello");
//! # }
//! ```

mod types;
mod lifecycle;
mod api;

pub use types::{CacheState, CacheError};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use sha2::{Digest, Sha256};
use tokio::sync::{watch, Mutex};

use crate::access::{AccessCounter, AccessStream};
use crate::cache_item::CacheItem;
use crate::config::TieredCacheConfig;
use crate::remote::RemoteLoader;
use crate::storage::traits::BlobStore;

/// Derive the blob store name for `key`: hex SHA-256 plus `.{extension}`.
///
/// ```
/// let name = tiered_cache::storage_name("a", "cache");
/// assert!(name.ends_with(".cache"));
/// assert_eq!(name.len(), 64 + ".cache".len());
/// ```
#[must_use]
pub fn storage_name(key: &str, extension: &str) -> String {
    let digest = hex::encode(Sha256::digest(key.as_bytes()));
    if extension.is_empty() {
        digest
    } else {
        format!("{}.{}", digest, extension)
    }
}

/// State mutated by cache operations. Always accessed under one lock.
pub(super) struct CacheInner<T> {
    /// Storage names known to be in the blob store
    pub(super) index: HashSet<String>,
    /// Memory tier, by cache key
    pub(super) memory: HashMap<String, T>,
}

impl<T> Default for CacheInner<T> {
    fn default() -> Self {
        Self {
            index: HashSet::new(),
            memory: HashMap::new(),
        }
    }
}

/// Two-tier object cache with remote fallback.
///
/// # Thread Safety
///
/// Share it behind an `Arc` after [`set_up`](Self::set_up). Index, memory
/// tier and access counter change only while the internal lock is held, so
/// every operation observes them in a single total order. Remote fetches run
/// without the lock; concurrent misses on the same key may each reach the
/// remote loader.
pub struct TieredCache<T> {
    pub(super) config: TieredCacheConfig,

    /// Lifecycle state (broadcast to watchers)
    pub(super) state: watch::Sender<CacheState>,
    pub(super) state_rx: watch::Receiver<CacheState>,

    pub(super) inner: Mutex<CacheInner<T>>,

    /// Disk-hit counter and its broadcast
    pub(super) access: AccessCounter,

    pub(super) blob_store: Arc<dyn BlobStore>,
    pub(super) loader: Arc<dyn RemoteLoader<T>>,
}

impl<T: CacheItem> TieredCache<T> {
    /// Create a cache. Call [`set_up`](Self::set_up) before using it.
    pub fn new(
        config: TieredCacheConfig,
        blob_store: Arc<dyn BlobStore>,
        loader: Arc<dyn RemoteLoader<T>>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(CacheState::Created);
        Self {
            config,
            state: state_tx,
            state_rx,
            inner: Mutex::new(CacheInner::default()),
            access: AccessCounter::new(),
            blob_store,
            loader,
        }
    }

    #[must_use]
    pub fn config(&self) -> &TieredCacheConfig {
        &self.config
    }

    /// Get current lifecycle state.
    #[must_use]
    pub fn state(&self) -> CacheState {
        *self.state_rx.borrow()
    }

    /// Get a receiver to watch state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<CacheState> {
        self.state_rx.clone()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state() == CacheState::Ready
    }

    /// Storage name for `key` under this cache's extension.
    #[must_use]
    pub fn storage_name(&self, key: &str) -> String {
        storage_name(key, &self.config.file_extension)
    }

    /// Successful disk reads since set up or the last [`clear`](Self::clear).
    #[must_use]
    pub fn access_count(&self) -> u64 {
        self.access.get()
    }

    /// Live stream of the access count. Only values emitted after this call
    /// are delivered; the stream ends on shutdown or drop.
    #[must_use]
    pub fn subscribe_access(&self) -> AccessStream {
        self.access.subscribe()
    }

    /// Number of names in the persisted-key index.
    pub async fn persisted_len(&self) -> usize {
        self.inner.lock().await.index.len()
    }

    /// Whether `key` is believed to be in the blob store.
    pub async fn is_persisted(&self, key: &str) -> bool {
        let name = self.storage_name(key);
        self.inner.lock().await.index.contains(&name)
    }

    /// Number of items in the memory tier.
    pub async fn memory_len(&self) -> usize {
        self.inner.lock().await.memory.len()
    }

    /// Whether any tier can serve `key` without a remote round trip.
    pub async fn contains(&self, key: &str) -> bool {
        let name = self.storage_name(key);
        {
            let inner = self.inner.lock().await;
            if inner.memory.contains_key(key) || inner.index.contains(&name) {
                return true;
            }
        }
        self.loader.contains(key)
    }

    pub(super) fn ensure_ready(&self) -> Result<(), CacheError> {
        match self.state() {
            CacheState::Ready => Ok(()),
            other => Err(CacheError::NotReady(other)),
        }
    }
}
