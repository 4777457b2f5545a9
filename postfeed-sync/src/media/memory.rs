//! In-process blob store.

use super::store::{key_for_name, BlobError, BlobResult, BlobStore, MediaLocator};
use crate::remote::memory::{Call, CallLog};
use async_trait::async_trait;
use postfeed_types::MediaKey;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct StoreState {
    blobs: HashMap<MediaKey, Vec<u8>>,
    fail_put: Option<BlobError>,
    fail_remove: Option<BlobError>,
}

/// Blob store that keeps everything in a map. Supports failure injection and
/// records calls into a [`CallLog`].
#[derive(Default)]
pub struct MemoryBlobStore {
    state: Mutex<StoreState>,
    log: CallLog,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records calls into a shared log.
    pub fn with_call_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    pub fn call_log(&self) -> &CallLog {
        &self.log
    }

    /// Makes the next `put` fail.
    pub fn fail_next_put(&self, err: BlobError) {
        self.lock().fail_put = Some(err);
    }

    /// Makes the next `remove` fail.
    pub fn fail_next_remove(&self, err: BlobError) {
        self.lock().fail_remove = Some(err);
    }

    pub fn contains(&self, key: &MediaKey) -> bool {
        self.lock().blobs.contains_key(key)
    }

    pub fn read(&self, key: &MediaKey) -> Option<Vec<u8>> {
        self.lock().blobs.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn provider_name(&self) -> &'static str {
        "Memory"
    }

    async fn put(&self, name: &str, bytes: &[u8]) -> BlobResult<MediaKey> {
        self.log.record(Call::BlobPut {
            name: name.to_string(),
        });
        let mut state = self.lock();
        if let Some(err) = state.fail_put.take() {
            return Err(err);
        }
        let key = key_for_name(name)?;
        state.blobs.insert(key.clone(), bytes.to_vec());
        Ok(key)
    }

    async fn get(&self, key: &MediaKey) -> BlobResult<MediaLocator> {
        if self.contains(key) {
            Ok(MediaLocator::new(format!("memory://{key}")))
        } else {
            Err(BlobError::NotFound(key.to_string()))
        }
    }

    async fn remove(&self, key: &MediaKey) -> BlobResult<()> {
        self.log.record(Call::BlobRemove { key: key.clone() });
        let mut state = self.lock();
        if let Some(err) = state.fail_remove.take() {
            return Err(err);
        }
        match state.blobs.remove(key) {
            Some(_) => Ok(()),
            None => Err(BlobError::NotFound(key.to_string())),
        }
    }
}
