// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Persistent tier backends.
//!
//! - [`traits::BlobStore`]: the durable name -> bytes contract
//! - [`memory::InMemoryBlobStore`]: DashMap-backed, process lifetime
//! - [`fs::FsBlobStore`]: one file per blob under a root directory

pub mod traits;
pub mod memory;
pub mod fs;

pub use traits::{BlobStore, StorageError};
pub use memory::InMemoryBlobStore;
pub use fs::FsBlobStore;
