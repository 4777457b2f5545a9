//! Error types for the feed core.

use postfeed_types::PostId;
use thiserror::Error;

/// Result type for feed operations.
pub type FeedResult<T> = Result<T, FeedError>;

/// Errors that can occur in feed operations.
///
/// Every variant is scoped to the single operation that produced it; none of
/// them is fatal to the session.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The remote system rejected a query or mutation. The message joins all
    /// underlying reasons with newlines.
    #[error("remote failure: {0}")]
    Remote(String),

    /// Storing, resolving or removing a blob failed.
    #[error("storage failure: {0}")]
    Storage(String),

    /// No signed-in user.
    #[error("not authenticated")]
    NotAuthenticated,

    /// A submission or a remote payload did not form a valid post.
    #[error("invalid post: {0}")]
    InvalidPost(String),

    /// The post is not part of the current view.
    #[error("unknown post: {0}")]
    UnknownPost(PostId),

    /// An event stream failed and has terminated.
    #[error("stream error: {0}")]
    Stream(String),

    /// Lifecycle misuse, e.g. activating an already active session.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Timeout.
    #[error("operation timed out")]
    Timeout,

    /// The snapshot stopped short of the full collection.
    #[error("snapshot truncated after {0} posts")]
    TruncatedSnapshot(usize),
}

impl FeedError {
    /// Whether the remote system rejected the operation.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// Whether the blob store failed.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

impl From<postfeed_types::Error> for FeedError {
    fn from(err: postfeed_types::Error) -> Self {
        match err {
            postfeed_types::Error::Serialization(e) => Self::Serialization(e),
            postfeed_types::Error::InvalidId(msg) | postfeed_types::Error::InvalidPost(msg) => {
                Self::InvalidPost(msg)
            }
        }
    }
}
