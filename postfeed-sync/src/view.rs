//! The local view of the remote collection.
//!
//! A [`LocalView`] is immutable. Every merge step builds the next view and
//! returns it, or returns `None` when the event changes nothing, so each
//! transition can be tested without a live stream and readers never observe
//! a half-applied merge.

use postfeed_types::{ChangeEvent, Post, PostId};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Default, PartialEq)]
struct ViewInner {
    posts: Vec<Post>,
    ids: HashSet<PostId>,
}

/// Ordered, id-unique sequence of posts. Cheap to clone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalView {
    inner: Arc<ViewInner>,
}

impl LocalView {
    /// The empty view.
    pub fn empty() -> Self {
        Self::default()
    }

    fn from_posts(posts: Vec<Post>) -> Self {
        let ids = posts.iter().map(|p| p.id.clone()).collect();
        Self {
            inner: Arc::new(ViewInner { posts, ids }),
        }
    }

    /// Posts in display order.
    pub fn posts(&self) -> &[Post] {
        &self.inner.posts
    }

    pub fn len(&self) -> usize {
        self.inner.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.posts.is_empty()
    }

    pub fn contains(&self, id: &PostId) -> bool {
        self.inner.ids.contains(id)
    }

    pub fn get(&self, id: &PostId) -> Option<&Post> {
        if !self.contains(id) {
            return None;
        }
        self.inner.posts.iter().find(|p| &p.id == id)
    }

    /// Ids in display order.
    pub fn ids(&self) -> impl Iterator<Item = &PostId> {
        self.inner.posts.iter().map(|p| &p.id)
    }

    /// Applies one change event.
    pub fn apply(&self, event: &ChangeEvent) -> Option<LocalView> {
        match event {
            ChangeEvent::Created(post) => self.insert(post),
            ChangeEvent::Deleted(deleted) => self.remove(&deleted.id),
        }
    }

    /// Prepends a post unless its id is already present.
    pub fn insert(&self, post: &Post) -> Option<LocalView> {
        if self.contains(&post.id) {
            return None;
        }
        let mut posts = Vec::with_capacity(self.len() + 1);
        posts.push(post.clone());
        posts.extend(self.inner.posts.iter().cloned());
        Some(Self::from_posts(posts))
    }

    /// Removes the post with this id, if present.
    pub fn remove(&self, id: &PostId) -> Option<LocalView> {
        if !self.contains(id) {
            return None;
        }
        let posts = self
            .inner
            .posts
            .iter()
            .filter(|p| &p.id != id)
            .cloned()
            .collect();
        Some(Self::from_posts(posts))
    }

    /// Combines the snapshot with what was already merged from the streams.
    ///
    /// Posts inserted before the snapshot resolved stay in front. Snapshot
    /// posts follow in snapshot order, skipping ids already present (or
    /// repeated within the snapshot) and ids deleted before the snapshot
    /// resolved.
    pub fn seed(&self, snapshot: Vec<Post>, removed: &HashSet<PostId>) -> LocalView {
        let mut seen = self.inner.ids.clone();
        let mut posts = self.inner.posts.clone();
        posts.reserve(snapshot.len());
        for post in snapshot {
            if removed.contains(&post.id) || !seen.insert(post.id.clone()) {
                continue;
            }
            posts.push(post);
        }
        Self::from_posts(posts)
    }
}
