//! Media lifecycle coordination.
//!
//! Ordering rules:
//! - create: store the blob, then create the record. A failed store aborts
//!   the creation before the record exists.
//! - delete: remove the blob, then remove the record. A failed removal aborts
//!   the delete and leaves the record intact. A blob that is already gone
//!   counts as removed.
//! - compensation: a blob stored for a record that was never created is
//!   discarded, unless the upload replaced a blob that was already there.

use super::store::{key_for_name, BlobError, BlobStore, MediaLocator};
use crate::error::{FeedError, FeedResult};
use postfeed_types::{MediaBlob, MediaKey};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of storing one attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    pub key: MediaKey,
    /// A blob already existed under `key` and was overwritten. Other posts
    /// may still reference it.
    pub replaced: bool,
}

/// Ties blob storage to the post lifecycle.
#[derive(Clone)]
pub struct MediaCoordinator {
    store: Arc<dyn BlobStore>,
}

impl MediaCoordinator {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Stores the attachment, if any, and returns its key.
    pub async fn store_media(&self, blob: Option<&MediaBlob>) -> FeedResult<Option<StoredMedia>> {
        let Some(blob) = blob else {
            return Ok(None);
        };
        let replaced = match key_for_name(&blob.name) {
            Ok(existing) => self.store.get(&existing).await.is_ok(),
            Err(_) => false,
        };
        let key = self
            .store
            .put(&blob.name, &blob.bytes)
            .await
            .map_err(storage_failure)?;
        info!(
            "Stored {} bytes of media as {} ({})",
            blob.bytes.len(),
            key,
            self.store.provider_name()
        );
        if replaced {
            debug!("Media {} replaced an existing blob", key);
        }
        Ok(Some(StoredMedia { key, replaced }))
    }

    /// Removes the attachment, if any. Must succeed before the record goes.
    pub async fn release_media(&self, key: Option<&MediaKey>) -> FeedResult<()> {
        let Some(key) = key else {
            return Ok(());
        };
        match self.store.remove(key).await {
            Ok(()) => {
                info!("Removed media {}", key);
                Ok(())
            }
            Err(BlobError::NotFound(_)) => {
                debug!("Media {} already gone", key);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to remove media {}: {}", key, e);
                Err(storage_failure(e))
            }
        }
    }

    /// Best-effort removal of a blob whose record was never created.
    pub async fn discard_media(&self, key: &MediaKey) {
        match self.store.remove(key).await {
            Ok(()) | Err(BlobError::NotFound(_)) => {
                info!("Discarded media {} after failed creation", key)
            }
            Err(e) => warn!("Media {} is orphaned, cleanup failed: {}", key, e),
        }
    }

    /// Resolves a key into something a renderer can load.
    pub async fn resolve(&self, key: &MediaKey) -> FeedResult<MediaLocator> {
        self.store.get(key).await.map_err(storage_failure)
    }
}

fn storage_failure(err: BlobError) -> FeedError {
    FeedError::Storage(err.to_string())
}
