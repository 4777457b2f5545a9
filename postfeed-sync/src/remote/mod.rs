//! Remote system abstraction.
//!
//! Defines the surfaces the core consumes from the outside world: the post
//! collection (query + mutations), the change event surface and the identity
//! provider. Adapters:
//! - [`graphql::GraphqlRemote`] talks to a GraphQL endpoint over HTTP
//! - [`memory::InMemoryRemote`] keeps the collection in-process and echoes
//!   every mutation as an event

use async_trait::async_trait;
use futures::stream::BoxStream;
use postfeed_types::{EventKind, Identity, NewPost, Post, PostId};
use thiserror::Error;

pub mod graphql;
pub mod memory;

/// Result type for raw remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// A rejection reported by the remote system.
///
/// The remote may report several reasons for one failed call; all of them
/// are kept.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", .messages.join("\n"))]
pub struct RemoteError {
    pub messages: Vec<String>,
}

impl RemoteError {
    /// A rejection with a single reason.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            messages: vec![message.into()],
        }
    }

    /// A rejection with any number of reasons.
    pub fn from_messages<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            messages: messages.into_iter().map(Into::into).collect(),
        }
    }
}

/// The collection as one `list_posts` call read it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub posts: Vec<Post>,
    /// The adapter stopped reading before the remote ran out of posts.
    pub truncated: bool,
}

impl Snapshot {
    /// Every post the remote holds.
    pub fn complete(posts: Vec<Post>) -> Self {
        Self {
            posts,
            truncated: false,
        }
    }

    /// A prefix of the collection; the rest was not read.
    pub fn truncated(posts: Vec<Post>) -> Self {
        Self {
            posts,
            truncated: true,
        }
    }
}

/// The authoritative remote post collection.
#[async_trait]
pub trait PostCollection: Send + Sync {
    /// Reads the current contents of the collection.
    async fn list_posts(&self) -> RemoteResult<Snapshot>;

    /// Creates a post. The remote assigns id and owner.
    async fn create_post(&self, input: &NewPost) -> RemoteResult<()>;

    /// Deletes a post by id.
    async fn delete_post(&self, id: &PostId) -> RemoteResult<()>;
}

/// Raw event payloads as the remote delivers them.
pub type RawEventStream = BoxStream<'static, RemoteResult<serde_json::Value>>;

/// An open subscription on the remote event surface.
///
/// Dropping the stream stops delivery; the optional unsubscribe hook lets the
/// remote release whatever it keeps per subscriber.
pub struct RawSubscription {
    pub(crate) events: RawEventStream,
    pub(crate) unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl RawSubscription {
    /// Wraps an event stream that needs no explicit teardown.
    pub fn new(events: RawEventStream) -> Self {
        Self {
            events,
            unsubscribe: None,
        }
    }

    /// Registers a hook that runs once when the subscription is closed.
    pub fn with_unsubscribe(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.unsubscribe = Some(Box::new(hook));
        self
    }
}

/// Subscribe-by-kind event surface.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Opens a subscription for one event kind.
    async fn subscribe(&self, kind: EventKind) -> RemoteResult<RawSubscription>;
}

/// Identity provider. Token management lives entirely on its side.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns the signed-in user, or `None` without a valid session.
    async fn current_user(&self) -> Option<Identity>;
}

/// An identity provider with a fixed answer.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(Option<Identity>);

impl StaticIdentity {
    /// Always signed in as `username`.
    pub fn signed_in(username: impl Into<String>) -> Self {
        Self(Some(Identity::new(username)))
    }

    /// Never signed in.
    pub fn anonymous() -> Self {
        Self(None)
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_user(&self) -> Option<Identity> {
        self.0.clone()
    }
}
