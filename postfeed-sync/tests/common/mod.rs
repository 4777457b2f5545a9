//! Shared test helpers for feed tests.

#![allow(dead_code)]

use postfeed_sync::media::MemoryBlobStore;
use postfeed_sync::remote::memory::{CallLog, InMemoryRemote};
use postfeed_sync::{
    ChangeEventSubscriber, CollectionSynchronizer, FeedBackends, LocalView, MutationGateway,
    PostFeed, StaticIdentity, SyncConfig, ViewChanges,
};
use postfeed_types::{Post, PostId};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

pub fn id(s: &str) -> PostId {
    PostId::parse(s).unwrap()
}

pub fn post(s: &str, title: &str, description: &str) -> Post {
    Post::new(id(s), title, description)
}

pub fn ids(view: &LocalView) -> Vec<String> {
    view.ids().map(|id| id.to_string()).collect()
}

/// Synchronizer over one in-process remote for both collection and events.
pub fn synchronizer(remote: Arc<InMemoryRemote>) -> CollectionSynchronizer {
    synchronizer_with_config(remote, SyncConfig::default())
}

pub fn synchronizer_with_config(
    remote: Arc<InMemoryRemote>,
    config: SyncConfig,
) -> CollectionSynchronizer {
    CollectionSynchronizer::new(
        MutationGateway::new(remote.clone()),
        ChangeEventSubscriber::new(remote),
        config,
    )
}

/// A remote, a blob store and a feed sharing one call log.
pub struct Harness {
    pub remote: Arc<InMemoryRemote>,
    pub blobs: Arc<MemoryBlobStore>,
    pub log: CallLog,
    pub feed: PostFeed,
}

pub fn harness(posts: Vec<Post>) -> Harness {
    let log = CallLog::new();
    let remote = Arc::new(
        InMemoryRemote::new()
            .with_owner("alice")
            .with_posts(posts)
            .with_call_log(log.clone()),
    );
    let blobs = Arc::new(MemoryBlobStore::new().with_call_log(log.clone()));
    let feed = PostFeed::new(
        SyncConfig::default(),
        FeedBackends {
            collection: remote.clone(),
            events: remote.clone(),
            blobs: blobs.clone(),
            identity: Arc::new(StaticIdentity::signed_in("alice")),
        },
    );
    Harness {
        remote,
        blobs,
        log,
        feed,
    }
}

/// Waits (bounded) until the view satisfies `pred`.
pub async fn wait_for_view(
    changes: &mut ViewChanges,
    pred: impl FnMut(&LocalView) -> bool,
) -> LocalView {
    tokio::time::timeout(WAIT, changes.wait_for(pred))
        .await
        .expect("timed out waiting for view")
        .expect("synchronizer dropped")
}

/// Polls `check` until it holds.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "condition never held");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Runs a future with the shared timeout.
pub async fn bounded<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(WAIT, fut).await.expect("timed out")
}
