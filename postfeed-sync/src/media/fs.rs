//! Directory-backed blob store.
//!
//! Each blob is one file directly under the configured root, named after its
//! key. Writing an existing key replaces the file.

use super::store::{key_for_name, BlobError, BlobResult, BlobStore, MediaLocator};
use async_trait::async_trait;
use postfeed_types::MediaKey;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Configuration for [`FsBlobStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsBlobStoreConfig {
    /// Directory holding the blobs.
    pub root: PathBuf,
    /// When set, locators are `<public_base_url>/<key>` instead of `file://`
    /// paths.
    #[serde(default)]
    pub public_base_url: Option<String>,
}

impl Default for FsBlobStoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("postfeed-media"),
            public_base_url: None,
        }
    }
}

/// Blob store backed by a local directory.
pub struct FsBlobStore {
    config: FsBlobStoreConfig,
}

impl FsBlobStore {
    pub fn new(config: FsBlobStoreConfig) -> Self {
        Self { config }
    }

    /// Convenience constructor for a bare root directory.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self::new(FsBlobStoreConfig {
            root: root.into(),
            public_base_url: None,
        })
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    fn path_for(&self, key: &MediaKey) -> BlobResult<PathBuf> {
        // Keys handed in from outside must not escape the root either.
        let checked = key_for_name(key.as_str())?;
        if checked != *key {
            return Err(BlobError::Storage(format!("invalid media key: {key}")));
        }
        Ok(self.config.root.join(key.as_str()))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    fn provider_name(&self) -> &'static str {
        "Local Directory"
    }

    async fn put(&self, name: &str, bytes: &[u8]) -> BlobResult<MediaKey> {
        let key = key_for_name(name)?;
        let path = self.path_for(&key)?;

        if !fs::try_exists(&self.config.root).await.unwrap_or(false) {
            fs::create_dir_all(&self.config.root)
                .await
                .map_err(|e| BlobError::Storage(format!("failed to create media folder: {e}")))?;
            info!("Created media folder: {:?}", self.config.root);
        }

        fs::write(&path, bytes)
            .await
            .map_err(|e| BlobError::Storage(format!("failed to write {key}: {e}")))?;
        debug!("Stored {} bytes as {}", bytes.len(), key);
        Ok(key)
    }

    async fn get(&self, key: &MediaKey) -> BlobResult<MediaLocator> {
        let path = self.path_for(key)?;
        if !fs::try_exists(&path)
            .await
            .map_err(|e| BlobError::Storage(format!("failed to stat {key}: {e}")))?
        {
            return Err(BlobError::NotFound(key.to_string()));
        }

        Ok(match &self.config.public_base_url {
            Some(base) => MediaLocator::new(format!("{}/{}", base.trim_end_matches('/'), key)),
            None => MediaLocator::new(format!("file://{}", path.display())),
        })
    }

    async fn remove(&self, key: &MediaKey) -> BlobResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Removed blob {}", key);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(BlobError::NotFound(key.to_string())),
            Err(e) => Err(BlobError::Storage(format!("failed to remove {key}: {e}"))),
        }
    }
}
