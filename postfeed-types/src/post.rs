//! The post record and the inputs used to create one.

use crate::{Error, MediaKey, PostId, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A post as the remote system reports it.
///
/// The media key travels as `image` on the wire; `mediaKey` is accepted as an
/// alias on ingress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Remote-assigned identifier.
    pub id: PostId,
    /// Short title.
    pub title: String,
    /// Body text.
    pub description: String,
    /// Identity of the creating user, stamped remotely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Optional attachment.
    #[serde(
        rename = "image",
        alias = "mediaKey",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub media_key: Option<MediaKey>,
}

impl Post {
    /// Creates a post without owner or attachment.
    #[must_use]
    pub fn new(id: PostId, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: description.into(),
            owner: None,
            media_key: None,
        }
    }

    /// Sets the owner.
    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Sets the media key.
    #[must_use]
    pub fn with_media(mut self, key: MediaKey) -> Self {
        self.media_key = Some(key);
        self
    }

    /// Converts a raw remote payload into a post.
    ///
    /// A blank media key is normalized to "no attachment". A blank title or
    /// description is rejected, the same as for a submission.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let mut post: Post = serde_json::from_value(value)?;
        check_text(&post.title, &post.description)?;
        if post.media_key.as_ref().is_some_and(MediaKey::is_blank) {
            post.media_key = None;
        }
        Ok(post)
    }
}

/// Input for creating a post. The remote assigns id and owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub description: String,
    #[serde(rename = "image", default, skip_serializing_if = "Option::is_none")]
    pub media_key: Option<MediaKey>,
}

impl NewPost {
    /// Builds a submission, rejecting a blank title or description.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Result<Self> {
        let title = title.into();
        let description = description.into();
        check_text(&title, &description)?;
        Ok(Self {
            title,
            description,
            media_key: None,
        })
    }

    /// Attaches an already stored blob.
    #[must_use]
    pub fn with_media(mut self, key: Option<MediaKey>) -> Self {
        self.media_key = key;
        self
    }
}

fn check_text(title: &str, description: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::InvalidPost("title must not be empty".to_string()));
    }
    if description.trim().is_empty() {
        return Err(Error::InvalidPost("description must not be empty".to_string()));
    }
    Ok(())
}

/// A binary attachment waiting to be stored.
#[derive(Clone, PartialEq, Eq)]
pub struct MediaBlob {
    /// Original file name; the storage key is derived from it.
    pub name: String,
    pub bytes: Vec<u8>,
}

impl MediaBlob {
    #[must_use]
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

impl fmt::Debug for MediaBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaBlob")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// The signed-in user, as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
}

impl Identity {
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}
