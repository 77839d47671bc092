// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Tiered Cache
//!
//! A two-tier (memory + persistent) object cache that populates itself from
//! a remote source, plus a deadline guard that resolves exactly once.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Memory tier                             │
//! │  • Items already served in this process                    │
//! │  • No disk access, no counter change                       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ miss
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Persistent tier                           │
//! │  • BlobStore (filesystem or in-memory)                     │
//! │  • Persisted-key index avoids probing absent names         │
//! │  • Every successful read bumps the access counter          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ miss / unreadable
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Remote tier                             │
//! │  • RemoteLoader with its own memo                          │
//! │  • Optional deadline via TimeoutGuard                      │
//! │  • Result written back (best effort)                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use tiered_cache::{
//!     CachedBlob, CachingLoader, FsBlobStore, LoaderError, Origin, TieredCache,
//!     TieredCacheConfig,
//! };
//!
//! struct Cdn;
//!
//! #[async_trait]
//! impl Origin<CachedBlob> for Cdn {
//!     async fn download(&self, key: &str) -> Result<CachedBlob, LoaderError> {
//!         Ok(CachedBlob::new(key, vec![]))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = TieredCacheConfig {
//!         storage_dir: Some("./cache".into()),
//!         remote_timeout_ms: Some(5_000),
//!         ..Default::default()
//!     };
//!     let store = Arc::new(FsBlobStore::from_config(&config).await.unwrap());
//!     let loader = Arc::new(CachingLoader::new(Cdn));
//!
//!     let mut cache: TieredCache<CachedBlob> = TieredCache::new(config, store, loader);
//!     cache.set_up().await.expect("blob store unreadable");
//!
//!     let item = cache.fetch("avatars/42.png").await.unwrap();
//!     println!("{} bytes, {} disk hits", item.len(), cache.access_count());
//!
//!     cache.shutdown().await;
//! }
//! ```
//!
//! ## Modules
//!
//! - [`cache`]: the [`TieredCache`] coordinator
//! - [`storage`]: persistent tier backends
//! - [`remote`]: remote loader contract and memoizing loader
//! - [`access`]: disk-access counter stream
//! - [`resilience`]: [`TimeoutGuard`]

pub mod config;
pub mod cache_item;
pub mod storage;
pub mod remote;
pub mod access;
pub mod resilience;
pub mod cache;
pub mod metrics;

pub use config::TieredCacheConfig;
pub use cache::{storage_name, TieredCache, CacheState, CacheError};
pub use cache_item::{CacheItem, CachedBlob, CodecError};
pub use storage::traits::{BlobStore, StorageError};
pub use storage::{FsBlobStore, InMemoryBlobStore};
pub use remote::{CachingLoader, LoaderError, Origin, RemoteLoader};
pub use access::{AccessCounter, AccessStream};
pub use resilience::timeout::{with_timeout, CancelHandle, GuardError, TimeoutGuard};
pub use metrics::LatencyTimer;
