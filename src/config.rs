// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the tiered cache.
//!
//! # Example
//!
//! ```
//! use tiered_cache::TieredCacheConfig;
//!
//! // Minimal config (uses defaults)
//! let config = TieredCacheConfig::default();
//! assert_eq!(config.file_extension, "cache");
//! assert_eq!(config.remote_timeout_ms, None);
//!
//! // Full config
//! let config = TieredCacheConfig {
//!     storage_dir: Some("/var/cache/app".into()),
//!     remote_timeout_ms: Some(2_000),
//!     ..Default::default()
//! };
//! ```

use std::time::Duration;
use serde::Deserialize;

/// Configuration for the tiered cache.
///
/// All fields have sensible defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct TieredCacheConfig {
    /// Root directory for [`crate::FsBlobStore::from_config`]
    #[serde(default)]
    pub storage_dir: Option<String>,

    /// Extension appended to every derived storage name (without the dot)
    #[serde(default = "default_file_extension")]
    pub file_extension: String,

    /// Buffer size of the disk-access broadcast; slow subscribers skip
    /// values once they fall this far behind
    #[serde(default = "default_access_channel_capacity")]
    pub access_channel_capacity: usize,

    /// Upper bound on a single remote fetch (None = unbounded)
    #[serde(default)]
    pub remote_timeout_ms: Option<u64>,
}

fn default_file_extension() -> String { "cache".to_string() }
fn default_access_channel_capacity() -> usize { 64 }

impl Default for TieredCacheConfig {
    fn default() -> Self {
        Self {
            storage_dir: None,
            file_extension: default_file_extension(),
            access_channel_capacity: default_access_channel_capacity(),
            remote_timeout_ms: None,
        }
    }
}

impl TieredCacheConfig {
    /// Remote fetch deadline, if configured.
    #[must_use]
    pub fn remote_timeout(&self) -> Option<Duration> {
        self.remote_timeout_ms.map(Duration::from_millis)
    }
}
