//! In-process remote collection.
//!
//! Holds the collection in memory and broadcasts every accepted mutation to
//! the open subscriptions, the same way a hosted backend echoes mutations
//! back to all sessions. Failures can be injected per call, and every call is
//! appended to a [`CallLog`] that can be shared with a blob store to assert
//! cross-component ordering.

use super::{EventSource, PostCollection, RawSubscription, RemoteError, RemoteResult, Snapshot};
use async_trait::async_trait;
use futures::StreamExt;
use postfeed_types::{EventKind, MediaKey, NewPost, Post, PostId};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 256;

/// A call observed by an in-process backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListPosts,
    CreatePost { title: String },
    DeletePost { id: PostId },
    Subscribe(EventKind),
    BlobPut { name: String },
    BlobRemove { key: MediaKey },
}

/// Append-only, shareable record of calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: Call) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(call);
    }

    /// All calls so far, oldest first.
    pub fn entries(&self) -> Vec<Call> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Index of the first call matching `pred`.
    pub fn position(&self, pred: impl Fn(&Call) -> bool) -> Option<usize> {
        self.entries().iter().position(pred)
    }

    /// Number of calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.entries().iter().filter(|call| pred(call)).count()
    }
}

#[derive(Default)]
struct RemoteState {
    posts: Vec<Post>,
    fail_list: Option<RemoteError>,
    fail_create: Option<RemoteError>,
    fail_delete: Option<RemoteError>,
    open_subscriptions: usize,
    closed_subscriptions: usize,
}

/// In-process remote collection and event surface.
pub struct InMemoryRemote {
    state: Arc<Mutex<RemoteState>>,
    created_tx: broadcast::Sender<RemoteResult<Value>>,
    deleted_tx: broadcast::Sender<RemoteResult<Value>>,
    owner: Option<String>,
    log: CallLog,
}

impl Default for InMemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRemote {
    /// Creates an empty remote.
    pub fn new() -> Self {
        let (created_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (deleted_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(RemoteState::default())),
            created_tx,
            deleted_tx,
            owner: None,
            log: CallLog::new(),
        }
    }

    /// Stamps created posts with this owner.
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Seeds the collection without emitting events.
    pub fn with_posts(self, posts: Vec<Post>) -> Self {
        self.lock().posts = posts;
        self
    }

    /// Records calls into a shared log.
    pub fn with_call_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    pub fn call_log(&self) -> &CallLog {
        &self.log
    }

    /// Current contents of the collection.
    pub fn posts(&self) -> Vec<Post> {
        self.lock().posts.clone()
    }

    /// Makes the next `list_posts` call fail.
    pub fn fail_next_list(&self, err: RemoteError) {
        self.lock().fail_list = Some(err);
    }

    /// Makes the next `create_post` call fail.
    pub fn fail_next_create(&self, err: RemoteError) {
        self.lock().fail_create = Some(err);
    }

    /// Makes the next `delete_post` call fail.
    pub fn fail_next_delete(&self, err: RemoteError) {
        self.lock().fail_delete = Some(err);
    }

    /// Emits a created event without touching the collection, as a
    /// redelivery or another session's echo would.
    pub fn publish_created(&self, post: &Post) {
        let _ = self.created_tx.send(Ok(envelope(EventKind::Created, post)));
    }

    /// Emits a deleted event without touching the collection.
    pub fn publish_deleted(&self, id: &PostId) {
        let _ = self
            .deleted_tx
            .send(Ok(envelope(EventKind::Deleted, &json!({ "id": id }))));
    }

    /// Emits an arbitrary payload on one stream.
    pub fn publish_raw(&self, kind: EventKind, payload: Value) {
        let _ = self.sender(kind).send(Ok(payload));
    }

    /// Fails one stream. Subscribers see the error as the stream's last item.
    pub fn fail_stream(&self, kind: EventKind, err: RemoteError) {
        let _ = self.sender(kind).send(Err(err));
    }

    /// Subscriptions opened so far.
    pub fn open_subscriptions(&self) -> usize {
        self.lock().open_subscriptions
    }

    /// Subscriptions closed so far.
    pub fn closed_subscriptions(&self) -> usize {
        self.lock().closed_subscriptions
    }

    fn sender(&self, kind: EventKind) -> &broadcast::Sender<RemoteResult<Value>> {
        match kind {
            EventKind::Created => &self.created_tx,
            EventKind::Deleted => &self.deleted_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RemoteState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Wraps a payload the way the hosted backend delivers subscription data.
fn envelope(kind: EventKind, payload: &impl serde::Serialize) -> Value {
    let mut data = serde_json::Map::new();
    data.insert(
        kind.subscription_field().to_string(),
        serde_json::to_value(payload).unwrap_or(Value::Null),
    );
    json!({ "data": data })
}

#[async_trait]
impl PostCollection for InMemoryRemote {
    async fn list_posts(&self) -> RemoteResult<Snapshot> {
        self.log.record(Call::ListPosts);
        let mut state = self.lock();
        if let Some(err) = state.fail_list.take() {
            return Err(err);
        }
        Ok(Snapshot::complete(state.posts.clone()))
    }

    async fn create_post(&self, input: &NewPost) -> RemoteResult<()> {
        self.log.record(Call::CreatePost {
            title: input.title.clone(),
        });
        let post = {
            let mut state = self.lock();
            if let Some(err) = state.fail_create.take() {
                return Err(err);
            }
            let id = PostId::parse(Uuid::now_v7().to_string())
                .map_err(|e| RemoteError::new(e.to_string()))?;
            let post = Post {
                id,
                title: input.title.clone(),
                description: input.description.clone(),
                owner: self.owner.clone(),
                media_key: input.media_key.clone(),
            };
            state.posts.push(post.clone());
            post
        };
        debug!("remote created post {}", post.id);
        self.publish_created(&post);
        Ok(())
    }

    async fn delete_post(&self, id: &PostId) -> RemoteResult<()> {
        self.log.record(Call::DeletePost { id: id.clone() });
        let removed = {
            let mut state = self.lock();
            if let Some(err) = state.fail_delete.take() {
                return Err(err);
            }
            let Some(index) = state.posts.iter().position(|p| &p.id == id) else {
                return Err(RemoteError::new(format!(
                    "The conditional request failed: post {id} does not exist"
                )));
            };
            state.posts.remove(index)
        };
        debug!("remote deleted post {}", removed.id);
        let _ = self
            .deleted_tx
            .send(Ok(envelope(EventKind::Deleted, &removed)));
        Ok(())
    }
}

#[async_trait]
impl EventSource for InMemoryRemote {
    async fn subscribe(&self, kind: EventKind) -> RemoteResult<RawSubscription> {
        self.log.record(Call::Subscribe(kind));
        let rx = self.sender(kind).subscribe();
        self.lock().open_subscriptions += 1;

        let events = futures::stream::unfold(rx, |mut rx| async move {
            match rx.recv().await {
                Ok(item) => Some((item, rx)),
                Err(broadcast::error::RecvError::Lagged(missed)) => Some((
                    Err(RemoteError::new(format!(
                        "subscription lagged behind by {missed} events"
                    ))),
                    rx,
                )),
                Err(broadcast::error::RecvError::Closed) => None,
            }
        })
        .boxed();

        let state = Arc::clone(&self.state);
        Ok(RawSubscription::new(events).with_unsubscribe(move || {
            state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .closed_subscriptions += 1;
        }))
    }
}
