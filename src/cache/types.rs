// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types for the tiered cache.

use thiserror::Error;

use crate::cache_item::CodecError;
use crate::remote::LoaderError;
use crate::storage::traits::StorageError;

/// Cache lifecycle state.
///
/// Use [`super::TieredCache::state()`] to check the current state or
/// [`super::TieredCache::state_receiver()`] to watch for changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Just created, not yet set up
    Created,
    /// Scanning the blob store
    SettingUp,
    /// Serving requests
    Ready,
    /// Access stream closed, no longer serving
    ShutDown,
}

impl std::fmt::Display for CacheState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::SettingUp => write!(f, "SettingUp"),
            Self::Ready => write!(f, "Ready"),
            Self::ShutDown => write!(f, "ShutDown"),
        }
    }
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache is not ready (state: {0})")]
    NotReady(CacheState),
    #[error("Failed to index blob store: {0}")]
    StoreInit(#[source] StorageError),
    #[error("Failed to encode '{key}': {source}")]
    Encode { key: String, source: CodecError },
    #[error("Failed to persist '{key}': {source}")]
    StoreWrite { key: String, source: StorageError },
    #[error("Remote fetch failed for '{key}': {source}")]
    RemoteFetch { key: String, source: LoaderError },
    #[error("Failed to remove '{name}': {source}")]
    StoreRemove { name: String, source: StorageError },
}

impl CacheError {
    /// Short label used for metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotReady(_) => "not_ready",
            Self::StoreInit(_) => "store_init",
            Self::Encode { .. } => "encode",
            Self::StoreWrite { .. } => "store_write",
            Self::RemoteFetch { .. } => "remote_fetch",
            Self::StoreRemove { .. } => "store_remove",
        }
    }
}
