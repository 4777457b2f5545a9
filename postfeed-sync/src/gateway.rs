//! Remote mutation gateway.
//!
//! Wraps the remote collection and turns its rejections into
//! [`FeedError::Remote`]. Calls are fire-and-confirm: they wait for the
//! remote's acknowledgement, but nothing they return reaches the local view.
//! The view only changes when the matching event comes back on a stream.

use crate::error::{FeedError, FeedResult};
use crate::remote::{PostCollection, RemoteError, Snapshot};
use postfeed_types::{NewPost, PostId};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Message used when the remote failed without giving any reason.
pub const GENERIC_REMOTE_FAILURE: &str = "Oops! Something went wrong!";

/// Issues queries and mutations against the remote collection.
#[derive(Clone)]
pub struct MutationGateway {
    collection: Arc<dyn PostCollection>,
}

impl MutationGateway {
    pub fn new(collection: Arc<dyn PostCollection>) -> Self {
        Self { collection }
    }

    /// Fetches the current collection.
    pub async fn fetch_all(&self) -> FeedResult<Snapshot> {
        let snapshot = self
            .collection
            .list_posts()
            .await
            .map_err(remote_failure)?;
        debug!(
            "Fetched snapshot of {} posts (truncated: {})",
            snapshot.posts.len(),
            snapshot.truncated
        );
        Ok(snapshot)
    }

    /// Creates a post and waits for the remote to acknowledge it.
    pub async fn create(&self, input: &NewPost) -> FeedResult<()> {
        match self.collection.create_post(input).await {
            Ok(()) => {
                info!("Remote accepted new post {:?}", input.title);
                Ok(())
            }
            Err(e) => {
                warn!("Remote rejected new post {:?}: {}", input.title, e);
                Err(remote_failure(e))
            }
        }
    }

    /// Deletes a post and waits for the remote to acknowledge it.
    pub async fn remove(&self, id: &PostId) -> FeedResult<()> {
        match self.collection.delete_post(id).await {
            Ok(()) => {
                info!("Remote accepted removal of post {}", id);
                Ok(())
            }
            Err(e) => {
                warn!("Remote rejected removal of post {}: {}", id, e);
                Err(remote_failure(e))
            }
        }
    }
}

/// Joins every reason the remote gave into one message.
pub(crate) fn remote_failure(err: RemoteError) -> FeedError {
    let messages: Vec<&str> = err
        .messages
        .iter()
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .collect();
    if messages.is_empty() {
        FeedError::Remote(GENERIC_REMOTE_FAILURE.to_string())
    } else {
        FeedError::Remote(messages.join("\n"))
    }
}
