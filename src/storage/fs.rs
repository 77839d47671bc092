// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Filesystem blob store.
//!
//! One file per name, flat under a root directory. Writes go to a hidden
//! temporary file first and are renamed into place, so a crash mid-write
//! never leaves a truncated blob under its real name.

use std::io;
use std::path::{Path, PathBuf};
use async_trait::async_trait;
use tracing::debug;

use crate::config::TieredCacheConfig;
use super::traits::{BlobStore, StorageError};

const DEFAULT_ROOT: &str = "./tiered_cache";

pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::Enumeration(format!("cannot create {}: {}", root.display(), e))
        })?;
        debug!(root = %root.display(), "Filesystem blob store opened");
        Ok(Self { root })
    }

    /// Open the store at `config.storage_dir`, or `./tiered_cache` when unset.
    pub async fn from_config(config: &TieredCacheConfig) -> Result<Self, StorageError> {
        let root = config.storage_dir.as_deref().unwrap_or(DEFAULT_ROOT);
        Self::open(root).await
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Option<PathBuf> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(['/', '\\']);
        valid.then(|| self.root.join(name))
    }
}

fn is_not_found(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::NotFound
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn enumerate(&self) -> Result<Vec<String>, StorageError> {
        let mut dir = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| StorageError::Enumeration(format!("{}: {}", self.root.display(), e)))?;

        let mut names = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| StorageError::Enumeration(e.to_string()))?
        {
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }
            // Non UTF-8 and hidden (in-flight) files are never ours.
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }

    async fn write(&self, bytes: &[u8], name: &str) -> Result<(), StorageError> {
        let write_err = |reason: String| StorageError::Write { name: name.to_string(), reason };

        let path = self
            .path_for(name)
            .ok_or_else(|| write_err("invalid blob name".into()))?;
        let tmp = self.root.join(format!(".{}.tmp", name));

        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| write_err(e.to_string()))?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(write_err(e.to_string()));
        }
        Ok(())
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self
            .path_for(name)
            .ok_or_else(|| StorageError::NotFound(name.to_string()))?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if is_not_found(&e) => Err(StorageError::NotFound(name.to_string())),
            Err(e) => Err(StorageError::Read { name: name.to_string(), reason: e.to_string() }),
        }
    }

    async fn remove(&self, name: &str) -> Result<(), StorageError> {
        let Some(path) = self.path_for(name) else {
            return Ok(());
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(StorageError::Remove { name: name.to_string(), reason: e.to_string() }),
        }
    }

    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        match self.path_for(name) {
            Some(path) => tokio::fs::try_exists(&path)
                .await
                .map_err(|e| StorageError::Read { name: name.to_string(), reason: e.to_string() }),
            None => Ok(false),
        }
    }
}
