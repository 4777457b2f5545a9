//! Core type definitions for postfeed.
//!
//! This crate defines the records that cross the boundary between the sync
//! core and the remote system:
//! - Post and media identifiers
//! - The `Post` record and the `NewPost` submission input
//! - Normalized change events (created / deleted)
//!
//! Remote payloads are converted into these types on ingress, so nothing
//! loosely typed travels further into the core.

mod event;
mod ids;
mod post;

pub use event::{ChangeEvent, DeletedPost, EventKind};
pub use ids::{MediaKey, PostId};
pub use post::{Identity, MediaBlob, NewPost, Post};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or parsing feed records.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("invalid post: {0}")]
    InvalidPost(String),
}
