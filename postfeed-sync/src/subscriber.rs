//! Change event subscriber.
//!
//! Opens one subscription per event kind and hands each to a single
//! consumer as an [`EventStream`]. Raw payloads are unwrapped from the
//! remote's subscription envelope and validated into typed records before
//! the consumer sees them.
//!
//! Streams never restart. A stream-level failure is reported once, closes
//! the subscription and ends the stream; reconnecting is up to the caller.

use crate::error::{FeedError, FeedResult};
use crate::remote::{EventSource, RawEventStream};
use futures::StreamExt;
use postfeed_types::{DeletedPost, EventKind, Post};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

type Normalize<T> = fn(Value) -> postfeed_types::Result<T>;

/// Opens event streams against the remote event surface.
#[derive(Clone)]
pub struct ChangeEventSubscriber {
    source: Arc<dyn EventSource>,
}

impl ChangeEventSubscriber {
    pub fn new(source: Arc<dyn EventSource>) -> Self {
        Self { source }
    }

    /// Opens the stream of created posts.
    pub async fn open_created_stream(&self) -> FeedResult<EventStream<Post>> {
        self.open(EventKind::Created, Post::from_value).await
    }

    /// Opens the stream of deleted post ids.
    pub async fn open_deleted_stream(&self) -> FeedResult<EventStream<DeletedPost>> {
        self.open(EventKind::Deleted, DeletedPost::from_value).await
    }

    async fn open<T>(&self, kind: EventKind, normalize: Normalize<T>) -> FeedResult<EventStream<T>> {
        let subscription = self
            .source
            .subscribe(kind)
            .await
            .map_err(|e| FeedError::Stream(format!("failed to open {kind} stream: {e}")))?;
        debug!("Opened {} stream", kind);
        Ok(EventStream {
            kind,
            events: Some(subscription.events),
            normalize,
            handle: SubscriptionHandle {
                kind,
                unsubscribe: subscription.unsubscribe,
                closed: false,
            },
        })
    }
}

/// Ownership of one open subscription.
///
/// Closing runs the remote's teardown exactly once, no matter how often
/// `close` is called. Dropping an open handle closes it.
pub struct SubscriptionHandle {
    kind: EventKind,
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
    closed: bool,
}

impl SubscriptionHandle {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Closes the subscription. Returns `false` if it was already closed.
    pub fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
        debug!("Closed {} subscription", self.kind);
        true
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.close();
    }
}

/// A live, single-consumer sequence of typed events of one kind.
pub struct EventStream<T> {
    kind: EventKind,
    events: Option<RawEventStream>,
    normalize: Normalize<T>,
    handle: SubscriptionHandle,
}

impl<T> EventStream<T> {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    /// Waits for the next event.
    ///
    /// Returns `Some(Err(_))` once when the stream fails, then `None`. Returns
    /// `None` when the stream was closed or the remote ended it. Malformed
    /// payloads are skipped.
    pub async fn next(&mut self) -> Option<FeedResult<T>> {
        loop {
            let events = self.events.as_mut()?;
            match events.next().await {
                Some(Ok(raw)) => match (self.normalize)(unwrap_envelope(self.kind, raw)) {
                    Ok(item) => return Some(Ok(item)),
                    Err(e) => warn!("Skipping malformed {} event: {}", self.kind, e),
                },
                Some(Err(e)) => {
                    warn!("{} stream failed: {}", self.kind, e);
                    self.close();
                    return Some(Err(FeedError::Stream(format!("{} stream: {e}", self.kind))));
                }
                None => {
                    debug!("{} stream ended by remote", self.kind);
                    self.close();
                    return None;
                }
            }
        }
    }

    /// Stops delivery and closes the subscription. Returns `false` if it was
    /// already closed.
    pub fn close(&mut self) -> bool {
        self.events = None;
        self.handle.close()
    }
}

/// Strips the `{"data": {"onCreatePost": ...}}` wrapper when present.
fn unwrap_envelope(kind: EventKind, mut value: Value) -> Value {
    let pointer = format!("/data/{}", kind.subscription_field());
    if let Some(inner) = value.pointer_mut(&pointer) {
        return inner.take();
    }
    value
}
