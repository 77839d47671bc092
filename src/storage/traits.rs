// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to enumerate blob store: {0}")]
    Enumeration(String),
    #[error("Failed to write '{name}': {reason}")]
    Write { name: String, reason: String },
    #[error("Blob '{0}' not found")]
    NotFound(String),
    #[error("Failed to read '{name}': {reason}")]
    Read { name: String, reason: String },
    #[error("Failed to remove '{name}': {reason}")]
    Remove { name: String, reason: String },
}

impl StorageError {
    /// Short label used for metrics and log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Enumeration(_) => "enumeration",
            Self::Write { .. } => "write",
            Self::NotFound(_) => "not_found",
            Self::Read { .. } => "read",
            Self::Remove { .. } => "remove",
        }
    }
}

/// Durable name -> bytes storage backing the persistent tier.
///
/// Names are opaque to the store; the cache derives them from keys via
/// [`crate::storage_name`]. Implementations must be safe to share across
/// tasks, but the cache never issues two calls concurrently.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// List every name currently held by the store.
    async fn enumerate(&self) -> Result<Vec<String>, StorageError>;
    async fn write(&self, bytes: &[u8], name: &str) -> Result<(), StorageError>;
    async fn read(&self, name: &str) -> Result<Vec<u8>, StorageError>;
    async fn remove(&self, name: &str) -> Result<(), StorageError>;

    /// Whether `name` is present. Default implementation falls back to a read.
    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        match self.read(name).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
