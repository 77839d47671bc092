// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Remote tier: the authoritative source behind the cache.
//!
//! [`RemoteLoader`] is what [`crate::TieredCache`] talks to. It keeps its own
//! memory cache, independent of the cache's memory tier. [`CachingLoader`]
//! is the shipped implementation: it memoizes whatever an [`Origin`] returns.

use std::sync::atomic::{AtomicU64, Ordering};
use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoaderError {
    #[error("Remote fetch failed for '{key}': {reason}")]
    Fetch { key: String, reason: String },
    #[error("Remote fetch for '{key}' timed out after {timeout_ms}ms")]
    Timeout { key: String, timeout_ms: u64 },
    #[error("Remote fetch for '{0}' was cancelled")]
    Cancelled(String),
}

#[async_trait]
pub trait RemoteLoader<T>: Send + Sync {
    /// Prepare the loader. Called once from [`crate::TieredCache::set_up`].
    async fn set_up(&self) {}

    async fn fetch(&self, key: &str) -> Result<T, LoaderError>;

    /// Whether the loader's own memory cache holds `key`.
    fn contains(&self, key: &str) -> bool;

    /// Drop the loader's own memory cache.
    fn clear(&self) {}
}

/// Uncached source of items, e.g. an HTTP client.
#[async_trait]
pub trait Origin<T>: Send + Sync {
    async fn download(&self, key: &str) -> Result<T, LoaderError>;
}

/// [`RemoteLoader`] that memoizes an [`Origin`].
///
/// Concurrent misses on the same key each hit the origin; the last
/// result wins the memo slot.
pub struct CachingLoader<T, O> {
    origin: O,
    cache: DashMap<String, T>,
    downloads: AtomicU64,
}

impl<T, O> CachingLoader<T, O>
where
    T: Clone + Send + Sync + 'static,
    O: Origin<T>,
{
    pub fn new(origin: O) -> Self {
        Self {
            origin,
            cache: DashMap::new(),
            downloads: AtomicU64::new(0),
        }
    }

    /// Seed the memo without going to the origin.
    pub fn add(&self, key: &str, item: T) {
        self.cache.insert(key.to_string(), item);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Number of origin round trips so far.
    #[must_use]
    pub fn downloads(&self) -> u64 {
        self.downloads.load(Ordering::Acquire)
    }

    pub fn origin(&self) -> &O {
        &self.origin
    }
}

#[async_trait]
impl<T, O> RemoteLoader<T> for CachingLoader<T, O>
where
    T: Clone + Send + Sync + 'static,
    O: Origin<T>,
{
    async fn set_up(&self) {
        debug!(memoized = self.cache.len(), "Remote loader ready");
    }

    async fn fetch(&self, key: &str) -> Result<T, LoaderError> {
        let memoized = self.cache.get(key).map(|hit| hit.value().clone());
        if let Some(hit) = memoized {
            return Ok(hit);
        }

        self.downloads.fetch_add(1, Ordering::AcqRel);
        let item = self.origin.download(key).await?;
        self.cache.insert(key.to_string(), item.clone());
        Ok(item)
    }

    fn contains(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }

    fn clear(&self) {
        self.cache.clear();
    }
}
