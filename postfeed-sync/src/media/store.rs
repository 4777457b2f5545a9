//! Blob store abstraction trait.

use async_trait::async_trait;
use postfeed_types::MediaKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for blob store calls.
pub type BlobResult<T> = Result<T, BlobError>;

/// Errors reported by a blob store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlobError {
    /// No blob under this key.
    #[error("blob not found: {0}")]
    NotFound(String),

    /// The store failed.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Something a renderer can load the blob from (a URL or a file path).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaLocator(String);

impl MediaLocator {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Abstract blob storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Returns the name of the storage backend.
    fn provider_name(&self) -> &'static str;

    /// Stores `bytes` under a key derived from `name`, overwriting any blob
    /// already stored under that key.
    async fn put(&self, name: &str, bytes: &[u8]) -> BlobResult<MediaKey>;

    /// Resolves a key into a locator.
    async fn get(&self, key: &MediaKey) -> BlobResult<MediaLocator>;

    /// Removes a blob. Reports [`BlobError::NotFound`] for unknown keys.
    async fn remove(&self, key: &MediaKey) -> BlobResult<()>;
}

/// Derives the storage key for an uploaded file name.
///
/// Only the final path component is kept, so `photos/dog.png` and `dog.png`
/// share the key `dog.png`.
pub fn key_for_name(name: &str) -> BlobResult<MediaKey> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if base.is_empty() || base == "." || base == ".." {
        return Err(BlobError::Storage(format!("invalid blob name: {name:?}")));
    }
    Ok(MediaKey::new(base))
}
