//! The feed facade exposed to the UI layer.
//!
//! Mutations go out through the gateway with the media coordinator wrapped
//! around them; the view only moves when the remote echoes the change back.

use crate::error::{FeedError, FeedResult};
use crate::gateway::MutationGateway;
use crate::media::{BlobStore, FsBlobStoreConfig, MediaCoordinator, MediaLocator, StoredMedia};
use crate::remote::graphql::GraphqlConfig;
use crate::remote::{EventSource, IdentityProvider, PostCollection};
use crate::subscriber::ChangeEventSubscriber;
use crate::synchronizer::{CollectionSynchronizer, SyncConfig, SyncPhase, SyncWarning, ViewChanges};
use crate::view::LocalView;
use postfeed_types::{Identity, MediaBlob, MediaKey, NewPost, PostId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Configuration bundle for a feed and its adapters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub media: FsBlobStoreConfig,
    /// Remote GraphQL endpoint. Without it the feed runs against an
    /// in-process remote.
    #[serde(default)]
    pub graphql: Option<GraphqlConfig>,
}

/// The external collaborators a feed is wired to.
pub struct FeedBackends {
    pub collection: Arc<dyn PostCollection>,
    pub events: Arc<dyn EventSource>,
    pub blobs: Arc<dyn BlobStore>,
    pub identity: Arc<dyn IdentityProvider>,
}

/// A shared post feed for one signed-in user.
pub struct PostFeed {
    identity: Arc<dyn IdentityProvider>,
    gateway: MutationGateway,
    media: MediaCoordinator,
    synchronizer: CollectionSynchronizer,
}

impl PostFeed {
    pub fn new(config: SyncConfig, backends: FeedBackends) -> Self {
        let gateway = MutationGateway::new(backends.collection);
        let synchronizer = CollectionSynchronizer::new(
            gateway.clone(),
            ChangeEventSubscriber::new(backends.events),
            config,
        );
        Self {
            identity: backends.identity,
            gateway,
            media: MediaCoordinator::new(backends.blobs),
            synchronizer,
        }
    }

    /// Checks the session and starts synchronizing.
    pub async fn activate(&self) -> FeedResult<Identity> {
        let user = self.current_user().await?;
        info!("Activating feed for {}", user);
        self.synchronizer.activate().await?;
        Ok(user)
    }

    /// Stops synchronizing.
    pub async fn deactivate(&self) {
        self.synchronizer.deactivate().await;
    }

    pub fn phase(&self) -> SyncPhase {
        self.synchronizer.phase()
    }

    pub async fn wait_until_live(&self) -> SyncPhase {
        self.synchronizer.wait_until_live().await
    }

    pub fn current_view(&self) -> LocalView {
        self.synchronizer.current_view()
    }

    pub fn changes(&self) -> ViewChanges {
        self.synchronizer.changes()
    }

    pub fn warnings(&self) -> Vec<SyncWarning> {
        self.synchronizer.warnings()
    }

    /// Publishes a new post, storing the attachment first.
    ///
    /// The post shows up in the view once its created event arrives. If the
    /// remote rejects the record, a newly stored blob is discarded again.
    pub async fn submit_new_post(
        &self,
        title: &str,
        description: &str,
        blob: Option<MediaBlob>,
    ) -> FeedResult<()> {
        self.current_user().await?;
        let input = NewPost::new(title, description)?;

        let stored = self.media.store_media(blob.as_ref()).await?;
        let input = input.with_media(stored.as_ref().map(|media| media.key.clone()));

        if let Err(e) = self.gateway.create(&input).await {
            if let Some(media) = &stored {
                self.compensate(media).await;
            }
            return Err(e);
        }
        self.log_if_closed("submit");
        Ok(())
    }

    /// Removes a post from the view, deleting its attachment first.
    ///
    /// The post leaves the view once its deleted event arrives.
    pub async fn remove_post(&self, id: &PostId) -> FeedResult<()> {
        self.current_user().await?;
        let post = self
            .current_view()
            .get(id)
            .cloned()
            .ok_or_else(|| FeedError::UnknownPost(id.clone()))?;

        self.media.release_media(post.media_key.as_ref()).await?;
        self.gateway.remove(&post.id).await?;
        self.log_if_closed("remove");
        Ok(())
    }

    /// Discards a blob stored for a record that was never created.
    ///
    /// Keys are shared by file name, so a blob that replaced an earlier one
    /// or that a visible post references is left in place.
    async fn compensate(&self, media: &StoredMedia) {
        let referenced = self
            .current_view()
            .posts()
            .iter()
            .any(|post| post.media_key.as_ref() == Some(&media.key));
        if media.replaced || referenced {
            debug!("Keeping media {} after failed creation; still in use", media.key);
            return;
        }
        self.media.discard_media(&media.key).await;
    }

    /// Resolves an attachment into something a renderer can load.
    pub async fn media_locator(&self, key: &MediaKey) -> FeedResult<MediaLocator> {
        self.media.resolve(key).await
    }

    async fn current_user(&self) -> FeedResult<Identity> {
        self.identity
            .current_user()
            .await
            .ok_or(FeedError::NotAuthenticated)
    }

    fn log_if_closed(&self, operation: &str) {
        if self.phase() == SyncPhase::Closed {
            debug!("{} finished after the session closed; result not reflected", operation);
        }
    }
}
