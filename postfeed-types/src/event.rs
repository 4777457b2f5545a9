//! Normalized change events.
//!
//! The remote delivers two independent event kinds. Each kind has its own
//! stream; nothing orders a created event relative to a deleted one.

use crate::{Post, PostId, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of change a stream carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    Deleted,
}

impl EventKind {
    /// Field name the remote uses for this kind inside a subscription envelope.
    #[must_use]
    pub const fn subscription_field(self) -> &'static str {
        match self {
            Self::Created => "onCreatePost",
            Self::Deleted => "onDeletePost",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Deleted => f.write_str("deleted"),
        }
    }
}

/// Payload of a deleted event. Only the identity matters; any other fields
/// the remote sends along are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeletedPost {
    pub id: PostId,
}

impl DeletedPost {
    #[must_use]
    pub fn new(id: PostId) -> Self {
        Self { id }
    }

    /// Converts a raw remote payload.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// A single change observed on one of the event streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Created(Post),
    Deleted(DeletedPost),
}

impl ChangeEvent {
    /// The id the event refers to.
    #[must_use]
    pub fn id(&self) -> &PostId {
        match self {
            Self::Created(post) => &post.id,
            Self::Deleted(deleted) => &deleted.id,
        }
    }

    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Created(_) => EventKind::Created,
            Self::Deleted(_) => EventKind::Deleted,
        }
    }
}

impl From<Post> for ChangeEvent {
    fn from(post: Post) -> Self {
        Self::Created(post)
    }
}

impl From<DeletedPost> for ChangeEvent {
    fn from(deleted: DeletedPost) -> Self {
        Self::Deleted(deleted)
    }
}
