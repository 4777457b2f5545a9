//! Realtime feed synchronization for postfeed.
//!
//! Keeps a local view of a shared, remotely stored post collection in step
//! with the remote, and couples each post's media attachment to the post's
//! own lifecycle.
//!
//! # Architecture
//!
//! The view is seeded from a one-shot snapshot and then kept current by two
//! independent event streams (created, deleted). Merges are idempotent per
//! id and tolerate removals of unknown ids, so the view converges under any
//! interleaving of the two streams and the snapshot.
//!
//! ## Components
//!
//! - **Gateway**: create/delete/list against the remote, typed failures
//! - **Media**: store-before-create, remove-before-delete
//! - **Subscriber**: one typed stream per event kind, explicit close
//! - **Synchronizer**: owns the view, merges snapshot and events
//! - **Feed**: the facade the UI layer talks to
//!
//! Local mutations are never applied optimistically. A submitted post
//! appears when its created event arrives, not when the remote acknowledges
//! the mutation.
//!
//! # Example
//!
//! ```
//! use postfeed_sync::media::MemoryBlobStore;
//! use postfeed_sync::remote::memory::InMemoryRemote;
//! use postfeed_sync::remote::StaticIdentity;
//! use postfeed_sync::{FeedBackends, PostFeed, SyncConfig};
//! use std::sync::Arc;
//!
//! let remote = Arc::new(InMemoryRemote::new().with_owner("alice"));
//! let feed = PostFeed::new(
//!     SyncConfig::default(),
//!     FeedBackends {
//!         collection: remote.clone(),
//!         events: remote,
//!         blobs: Arc::new(MemoryBlobStore::new()),
//!         identity: Arc::new(StaticIdentity::signed_in("alice")),
//!     },
//! );
//! assert!(feed.current_view().is_empty());
//! ```

mod error;
mod feed;
mod gateway;
pub mod media;
pub mod remote;
pub mod subscriber;
pub mod synchronizer;
pub mod view;

pub use error::{FeedError, FeedResult};
pub use feed::{FeedBackends, FeedConfig, PostFeed};
pub use gateway::{MutationGateway, GENERIC_REMOTE_FAILURE};
pub use media::{BlobError, BlobStore, MediaCoordinator, MediaLocator, StoredMedia};
pub use remote::{
    EventSource, IdentityProvider, PostCollection, RawSubscription, RemoteError, Snapshot,
    StaticIdentity,
};
pub use subscriber::{ChangeEventSubscriber, EventStream, SubscriptionHandle};
pub use synchronizer::{
    CollectionSynchronizer, SyncConfig, SyncPhase, SyncWarning, ViewChanges, WarningSource,
};
pub use view::LocalView;
