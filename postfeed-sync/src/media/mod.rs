//! Media attachments.
//!
//! The [`MediaCoordinator`] couples a post's attachment to the post's own
//! lifecycle: the blob is stored before the record is created and removed
//! before the record is removed. Blob stores:
//! - [`fs::FsBlobStore`] keeps blobs in a local directory
//! - [`memory::MemoryBlobStore`] keeps them in-process

mod coordinator;
pub mod fs;
pub mod memory;
mod store;

pub use coordinator::{MediaCoordinator, StoredMedia};
pub use fs::{FsBlobStore, FsBlobStoreConfig};
pub use memory::MemoryBlobStore;
pub use store::{key_for_name, BlobError, BlobResult, BlobStore, MediaLocator};
