mod common;

use async_trait::async_trait;
use common::{bounded, eventually, id, ids, post, synchronizer, synchronizer_with_config, wait_for_view};
use postfeed_sync::remote::memory::InMemoryRemote;
use postfeed_sync::remote::RemoteResult;
use postfeed_sync::{
    ChangeEventSubscriber, CollectionSynchronizer, EventSource, FeedError, MutationGateway,
    PostCollection, RawSubscription, RemoteError, Snapshot, SyncConfig, SyncPhase, WarningSource,
};
use postfeed_types::{EventKind, NewPost, Post, PostId};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Notify;

/// Collection whose snapshot read blocks until the gate opens.
struct GatedCollection {
    inner: Arc<InMemoryRemote>,
    gate: Arc<Notify>,
}

#[async_trait]
impl PostCollection for GatedCollection {
    async fn list_posts(&self) -> RemoteResult<Snapshot> {
        self.gate.notified().await;
        self.inner.list_posts().await
    }

    async fn create_post(&self, input: &NewPost) -> RemoteResult<()> {
        self.inner.create_post(input).await
    }

    async fn delete_post(&self, id: &PostId) -> RemoteResult<()> {
        self.inner.delete_post(id).await
    }
}

/// Collection that only ever returns the first page.
struct FirstPageOnly(Vec<Post>);

#[async_trait]
impl PostCollection for FirstPageOnly {
    async fn list_posts(&self) -> RemoteResult<Snapshot> {
        Ok(Snapshot::truncated(self.0.clone()))
    }

    async fn create_post(&self, _input: &NewPost) -> RemoteResult<()> {
        Ok(())
    }

    async fn delete_post(&self, _id: &PostId) -> RemoteResult<()> {
        Ok(())
    }
}

struct Unreachable;

#[async_trait]
impl EventSource for Unreachable {
    async fn subscribe(&self, _kind: EventKind) -> RemoteResult<RawSubscription> {
        Err(RemoteError::new("connection refused"))
    }
}

fn gated(remote: &Arc<InMemoryRemote>, config: SyncConfig) -> (Arc<Notify>, CollectionSynchronizer) {
    let gate = Arc::new(Notify::new());
    let collection = Arc::new(GatedCollection {
        inner: remote.clone(),
        gate: gate.clone(),
    });
    let sync = CollectionSynchronizer::new(
        MutationGateway::new(collection),
        ChangeEventSubscriber::new(remote.clone()),
        config,
    );
    (gate, sync)
}

// ── Lifecycle ────────────────────────────────────────────────────

#[tokio::test]
async fn starts_uninitialized_and_empty() {
    let sync = synchronizer(Arc::new(InMemoryRemote::new()));

    assert_eq!(sync.phase(), SyncPhase::Uninitialized);
    assert!(sync.current_view().is_empty());
    assert_eq!(sync.wait_until_live().await, SyncPhase::Uninitialized);
}

#[tokio::test]
async fn activation_seeds_from_snapshot() {
    let remote = Arc::new(
        InMemoryRemote::new().with_posts(vec![post("1", "A", "a"), post("2", "B", "b")]),
    );
    let sync = synchronizer(remote.clone());

    sync.activate().await.unwrap();
    assert_eq!(bounded(sync.wait_until_live()).await, SyncPhase::Live);

    assert_eq!(ids(&sync.current_view()), vec!["1", "2"]);
    assert!(sync.warnings().is_empty());
    assert_eq!(remote.open_subscriptions(), 2);
}

#[tokio::test]
async fn activating_an_active_session_fails() {
    let sync = synchronizer(Arc::new(InMemoryRemote::new()));
    sync.activate().await.unwrap();

    let err = sync.activate().await.unwrap_err();
    assert!(matches!(err, FeedError::InvalidState(_)));
}

#[tokio::test]
async fn deactivate_closes_each_subscription_once() {
    let remote = Arc::new(InMemoryRemote::new().with_posts(vec![post("1", "A", "a")]));
    let sync = synchronizer(remote.clone());
    sync.activate().await.unwrap();
    bounded(sync.wait_until_live()).await;

    sync.deactivate().await;
    sync.deactivate().await;

    assert_eq!(sync.phase(), SyncPhase::Closed);
    assert_eq!(remote.open_subscriptions(), 2);
    assert_eq!(remote.closed_subscriptions(), 2);
}

#[tokio::test]
async fn view_is_frozen_after_close() {
    let remote = Arc::new(InMemoryRemote::new().with_posts(vec![post("1", "A", "a")]));
    let sync = synchronizer(remote.clone());
    sync.activate().await.unwrap();
    bounded(sync.wait_until_live()).await;
    sync.deactivate().await;

    remote.publish_created(&post("2", "B", "b"));
    remote.publish_deleted(&id("1"));
    tokio::task::yield_now().await;

    assert_eq!(ids(&sync.current_view()), vec!["1"]);
}

#[tokio::test]
async fn deactivate_while_loading_discards_snapshot() {
    let remote = Arc::new(InMemoryRemote::new().with_posts(vec![post("1", "A", "a")]));
    let (gate, sync) = gated(&remote, SyncConfig::default());
    sync.activate().await.unwrap();
    assert_eq!(sync.phase(), SyncPhase::Loading);

    sync.deactivate().await;
    gate.notify_one();
    tokio::task::yield_now().await;

    assert_eq!(sync.phase(), SyncPhase::Closed);
    assert!(sync.current_view().is_empty());
    assert_eq!(remote.closed_subscriptions(), 2);
}

#[tokio::test]
async fn reactivation_starts_over() {
    let remote = Arc::new(InMemoryRemote::new().with_posts(vec![post("1", "A", "a")]));
    let sync = synchronizer(remote.clone());
    sync.activate().await.unwrap();
    bounded(sync.wait_until_live()).await;
    sync.deactivate().await;

    remote.fail_next_list(RemoteError::new("down"));
    sync.activate().await.unwrap();
    assert_eq!(bounded(sync.wait_until_live()).await, SyncPhase::Live);

    // The failed snapshot leaves nothing behind from the first session.
    assert!(sync.current_view().is_empty());
    assert_eq!(sync.warnings().len(), 1);
    assert_eq!(remote.open_subscriptions(), 4);
}

// ── Merging ──────────────────────────────────────────────────────

#[tokio::test]
async fn snapshot_then_events_with_redelivery() {
    let remote = Arc::new(InMemoryRemote::new().with_posts(vec![post("1", "A", "a")]));
    let sync = synchronizer(remote.clone());
    let mut changes = sync.changes();
    sync.activate().await.unwrap();
    bounded(sync.wait_until_live()).await;
    assert_eq!(ids(&sync.current_view()), vec!["1"]);

    remote.publish_created(&post("2", "B", "b"));
    let view = wait_for_view(&mut changes, |v| v.contains(&id("2"))).await;
    assert_eq!(ids(&view), vec!["2", "1"]);

    remote.publish_deleted(&id("1"));
    let view = wait_for_view(&mut changes, |v| !v.contains(&id("1"))).await;
    assert_eq!(ids(&view), vec!["2"]);

    // Redelivery followed by a sentinel on the same stream.
    remote.publish_created(&post("2", "B", "b"));
    remote.publish_created(&post("s", "S", "s"));
    let view = wait_for_view(&mut changes, |v| v.contains(&id("s"))).await;
    assert_eq!(ids(&view), vec!["s", "2"]);
}

#[tokio::test]
async fn deleting_unknown_id_changes_nothing() {
    let remote = Arc::new(InMemoryRemote::new().with_posts(vec![post("1", "A", "a")]));
    let sync = synchronizer(remote.clone());
    let mut changes = sync.changes();
    sync.activate().await.unwrap();
    bounded(sync.wait_until_live()).await;

    remote.publish_deleted(&id("404"));
    remote.publish_deleted(&id("1"));
    let view = wait_for_view(&mut changes, |v| v.is_empty()).await;
    assert!(view.is_empty());
    assert!(sync.warnings().is_empty());
}

#[tokio::test]
async fn events_during_loading_survive_the_snapshot() {
    let remote = Arc::new(
        InMemoryRemote::new().with_posts(vec![post("1", "A", "a"), post("2", "B", "b")]),
    );
    let (gate, sync) = gated(&remote, SyncConfig::default());
    let mut changes = sync.changes();
    sync.activate().await.unwrap();

    remote.publish_created(&post("3", "C", "c"));
    wait_for_view(&mut changes, |v| v.contains(&id("3"))).await;

    // Removal of an id the snapshot still carries.
    remote.publish_created(&post("1", "A", "a"));
    wait_for_view(&mut changes, |v| v.contains(&id("1"))).await;
    remote.publish_deleted(&id("1"));
    wait_for_view(&mut changes, |v| !v.contains(&id("1"))).await;
    assert_eq!(sync.phase(), SyncPhase::Loading);

    gate.notify_one();
    assert_eq!(bounded(sync.wait_until_live()).await, SyncPhase::Live);
    assert_eq!(ids(&sync.current_view()), vec!["3", "2"]);
}

#[tokio::test]
async fn malformed_events_are_skipped() {
    let remote = Arc::new(InMemoryRemote::new());
    let sync = synchronizer(remote.clone());
    let mut changes = sync.changes();
    sync.activate().await.unwrap();
    bounded(sync.wait_until_live()).await;

    remote.publish_raw(EventKind::Created, json!({ "data": { "onCreatePost": {} } }));
    remote.publish_created(&post("1", "A", "a"));

    let view = wait_for_view(&mut changes, |v| !v.is_empty()).await;
    assert_eq!(ids(&view), vec!["1"]);
    assert!(sync.warnings().is_empty());
}

// ── Degraded sessions ────────────────────────────────────────────

#[tokio::test]
async fn snapshot_failure_is_a_warning() {
    let remote = Arc::new(InMemoryRemote::new().with_posts(vec![post("1", "A", "a")]));
    remote.fail_next_list(RemoteError::new("Network error"));
    let sync = synchronizer(remote.clone());
    let mut changes = sync.changes();

    sync.activate().await.unwrap();
    assert_eq!(bounded(sync.wait_until_live()).await, SyncPhase::Live);
    assert!(sync.current_view().is_empty());

    let warnings = sync.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].source, WarningSource::Snapshot);
    assert!(warnings[0].message.contains("Network error"));

    remote.publish_created(&post("2", "B", "b"));
    let view = wait_for_view(&mut changes, |v| !v.is_empty()).await;
    assert_eq!(ids(&view), vec!["2"]);
}

#[tokio::test]
async fn truncated_snapshot_is_a_warning() {
    let remote = Arc::new(InMemoryRemote::new());
    let sync = CollectionSynchronizer::new(
        MutationGateway::new(Arc::new(FirstPageOnly(vec![post("1", "A", "a")]))),
        ChangeEventSubscriber::new(remote),
        SyncConfig::default(),
    );

    sync.activate().await.unwrap();
    assert_eq!(bounded(sync.wait_until_live()).await, SyncPhase::Live);

    assert_eq!(ids(&sync.current_view()), vec!["1"]);
    let warnings = sync.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].source, WarningSource::Snapshot);
    assert_eq!(warnings[0].message, FeedError::TruncatedSnapshot(1).to_string());
}

#[tokio::test(start_paused = true)]
async fn slow_snapshot_times_out() {
    let remote = Arc::new(InMemoryRemote::new().with_posts(vec![post("1", "A", "a")]));
    let (_gate, sync) = gated(
        &remote,
        SyncConfig {
            snapshot_timeout_ms: 1_000,
        },
    );

    sync.activate().await.unwrap();
    assert_eq!(bounded(sync.wait_until_live()).await, SyncPhase::Live);

    assert!(sync.current_view().is_empty());
    let warnings = sync.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].source, WarningSource::Snapshot);
    assert_eq!(warnings[0].message, FeedError::Timeout.to_string());
}

#[tokio::test]
async fn failed_stream_leaves_the_other_running() {
    let remote = Arc::new(InMemoryRemote::new().with_posts(vec![post("1", "A", "a")]));
    let sync = synchronizer(remote.clone());
    let mut changes = sync.changes();
    sync.activate().await.unwrap();
    bounded(sync.wait_until_live()).await;

    remote.fail_stream(EventKind::Created, RemoteError::new("socket reset"));
    eventually(|| {
        sync.warnings()
            .iter()
            .any(|w| w.source == WarningSource::Stream(EventKind::Created))
    })
    .await;
    assert_eq!(sync.phase(), SyncPhase::Live);
    assert_eq!(remote.closed_subscriptions(), 1);

    remote.publish_deleted(&id("1"));
    let view = wait_for_view(&mut changes, |v| v.is_empty()).await;
    assert!(view.is_empty());

    // The failed stream was already closed; shutdown closes only the other.
    sync.deactivate().await;
    assert_eq!(remote.closed_subscriptions(), 2);
}

#[tokio::test]
async fn unopened_streams_are_warnings() {
    let remote = Arc::new(InMemoryRemote::new().with_posts(vec![post("1", "A", "a")]));
    let sync = CollectionSynchronizer::new(
        MutationGateway::new(remote.clone()),
        ChangeEventSubscriber::new(Arc::new(Unreachable)),
        SyncConfig::default(),
    );

    sync.activate().await.unwrap();
    assert_eq!(bounded(sync.wait_until_live()).await, SyncPhase::Live);

    assert_eq!(ids(&sync.current_view()), vec!["1"]);
    let sources: Vec<_> = sync.warnings().iter().map(|w| w.source).collect();
    assert_eq!(
        sources,
        vec![
            WarningSource::Stream(EventKind::Created),
            WarningSource::Stream(EventKind::Deleted),
        ]
    );
}

#[tokio::test]
async fn changes_notify_after_merge() {
    let remote = Arc::new(InMemoryRemote::new());
    let sync = synchronizer_with_config(remote.clone(), SyncConfig::default());
    sync.activate().await.unwrap();
    bounded(sync.wait_until_live()).await;

    let mut changes = sync.changes();
    remote.publish_created(&post("1", "A", "a"));

    assert!(bounded(changes.changed()).await);
    assert_eq!(ids(&changes.current()), vec!["1"]);
}
