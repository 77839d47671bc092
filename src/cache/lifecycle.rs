// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache lifecycle: set up and shutdown.

use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::cache_item::CacheItem;

use super::{CacheError, CacheState, TieredCache};

impl<T: CacheItem> TieredCache<T> {
    /// Build the persisted-key index and open the access stream.
    ///
    /// 1. Enumerate the blob store; every name carrying this cache's
    ///    extension goes into the index
    /// 2. Set up the remote loader
    /// 3. Open the access-count broadcast
    ///
    /// Calling this on a ready cache rescans the store. Fails with
    /// [`CacheError::StoreInit`] when the store cannot be enumerated; the
    /// cache is then back in `Created`.
    #[tracing::instrument(skip(self), fields(indexed = tracing::field::Empty))]
    pub async fn set_up(&mut self) -> Result<(), CacheError> {
        let start = Instant::now();
        let _ = self.state.send(CacheState::SettingUp);

        let names = match self.blob_store.enumerate().await {
            Ok(names) => names,
            Err(e) => {
                error!(error = %e, "Failed to enumerate blob store");
                crate::metrics::record_error("disk", "set_up", e.kind());
                let _ = self.state.send(CacheState::Created);
                return Err(CacheError::StoreInit(e));
            }
        };

        let suffix = format!(".{}", self.config.file_extension);
        let index: HashSet<String> = names
            .into_iter()
            .filter(|name| self.config.file_extension.is_empty() || name.ends_with(&suffix))
            .collect();
        let indexed = index.len();

        // &mut self: nobody else can hold the lock.
        self.inner.get_mut().index = index;
        tracing::Span::current().record("indexed", indexed);
        crate::metrics::set_index_entries(indexed);

        self.loader.set_up().await;
        debug!("Remote loader set up");

        self.access.open(self.config.access_channel_capacity);
        crate::metrics::set_access_count(self.access.get());

        let _ = self.state.send(CacheState::Ready);
        crate::metrics::record_latency("disk", "set_up", start.elapsed());
        info!(indexed, elapsed_ms = start.elapsed().as_millis() as u64, "Tiered cache ready");
        Ok(())
    }

    /// Close the access stream and stop serving.
    ///
    /// Subscribers see their streams end. Dropping the cache has the same
    /// effect on the stream.
    pub async fn shutdown(&self) {
        // Wait out any in-flight locked operation so its emission lands first.
        let _inner = self.inner.lock().await;
        self.access.close();
        let _ = self.state.send(CacheState::ShutDown);
        info!("Tiered cache shut down");
    }
}
