// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cached item data structures.
//!
//! The [`CacheItem`] trait is what the cache needs from a value: a clone for
//! the memory tier and a byte encoding for the persistent tier.
//! [`CachedBlob`] is the shipped implementation: raw content plus a SHA-256
//! hash that is verified on decode, so a corrupted blob is rejected instead
//! of being served.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Failed to encode item: {0}")]
    Encode(String),
    #[error("Failed to decode item: {0}")]
    Decode(String),
    #[error("Data corruption detected for '{key}': expected hash {expected}, got {actual}")]
    Corruption {
        key: String,
        expected: String,
        actual: String,
    },
}

/// A value that can live in both cache tiers.
pub trait CacheItem: Clone + Send + Sync + 'static {
    fn to_bytes(&self) -> Result<Vec<u8>, CodecError>;
    fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError>;
}

/// Opaque payload fetched for a key, with an integrity hash.
///
/// # Example
///
/// ```
/// use tiered_cache::{CachedBlob, CacheItem};
///
/// let blob = CachedBlob::new("images/cat.png", b"\x89PNG...".to_vec());
/// let bytes = blob.to_bytes().unwrap();
/// let back = CachedBlob::from_bytes(&bytes).unwrap();
///
/// assert_eq!(back.key, "images/cat.png");
/// assert_eq!(back.content, blob.content);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedBlob {
    /// Cache key this payload was fetched for
    pub key: String,
    /// Raw payload (hex on the wire)
    #[serde(with = "hex_content")]
    pub content: Vec<u8>,
    /// Lowercase hex SHA-256 of `content`
    pub content_hash: String,
    /// Fetch timestamp (epoch millis)
    pub fetched_at: i64,
}

impl CachedBlob {
    pub fn new(key: impl Into<String>, content: Vec<u8>) -> Self {
        let content_hash = content_hash(&content);
        Self {
            key: key.into(),
            content,
            content_hash,
            fetched_at: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as i64,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.content.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Recompute the content hash and compare with the stored one.
    pub fn verify(&self) -> Result<(), CodecError> {
        let actual = content_hash(&self.content);
        if actual == self.content_hash {
            Ok(())
        } else {
            Err(CodecError::Corruption {
                key: self.key.clone(),
                expected: self.content_hash.clone(),
                actual,
            })
        }
    }
}

impl CacheItem for CachedBlob {
    fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(self).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let blob: CachedBlob =
            serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))?;
        blob.verify()?;
        Ok(blob)
    }
}

fn content_hash(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

mod hex_content {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_hashes_content() {
        let blob = CachedBlob::new("k", b"hello".to_vec());
        assert_eq!(
            blob.content_hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(blob.len(), 5);
        assert!(!blob.is_empty());
        assert!(blob.verify().is_ok());
    }

    #[test]
    fn test_content_is_hex_on_the_wire() {
        let blob = CachedBlob::new("k", vec![0xde, 0xad]);
        let json: serde_json::Value = serde_json::from_slice(&blob.to_bytes().unwrap()).unwrap();
        assert_eq!(json["content"], "dead");
    }

    #[test]
    fn test_tampered_content_is_corruption() {
        let mut blob = CachedBlob::new("k", b"original".to_vec());
        blob.content = b"tampered".to_vec();
        let bytes = serde_json::to_vec(&blob).unwrap();

        match CachedBlob::from_bytes(&bytes) {
            Err(CodecError::Corruption { key, .. }) => assert_eq!(key, "k"),
            other => panic!("expected corruption, got {:?}", other),
        }
    }

    #[test]
    fn test_garbage_is_decode_error() {
        assert!(matches!(
            CachedBlob::from_bytes(b"\x00\x01 not json"),
            Err(CodecError::Decode(_))
        ));
    }

    #[test]
    fn test_bad_hex_is_decode_error() {
        let bytes = br#"{"key":"k","content":"zz","content_hash":"","fetched_at":0}"#;
        assert!(matches!(CachedBlob::from_bytes(bytes), Err(CodecError::Decode(_))));
    }
}
