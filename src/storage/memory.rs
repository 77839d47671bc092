// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use dashmap::DashMap;
use super::traits::{BlobStore, StorageError};

/// Process-local blob store. Survives cache restarts as long as the
/// store itself is kept alive (share it through an `Arc`).
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: DashMap<String, Vec<u8>>,
}

impl InMemoryBlobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Membership check without going through the async trait.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.blobs.contains_key(name)
    }

    /// Put raw bytes under `name`, bypassing any cache bookkeeping. Used to
    /// simulate foreign files and on-disk corruption.
    pub fn tamper(&self, name: &str, bytes: Vec<u8>) {
        self.blobs.insert(name.to_string(), bytes);
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn enumerate(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.blobs.iter().map(|entry| entry.key().clone()).collect())
    }

    async fn write(&self, bytes: &[u8], name: &str) -> Result<(), StorageError> {
        self.blobs.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        self.blobs
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    async fn remove(&self, name: &str) -> Result<(), StorageError> {
        self.blobs.remove(name);
        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.contains(name))
    }
}
