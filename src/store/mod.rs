//! Blob store capability and the bundled in-process implementation
//!
//! [`BlobStore`] is the seam between the coordinator and whatever caches,
//! fetches and decodes images. [`InMemoryBlobStore`] is a complete
//! implementation for embedding and tests.

mod memory;
mod traits;

pub use memory::InMemoryBlobStore;
pub use traits::{BlobStore, FetchCompletion, FetchFailure, FetchResult, PendingFetch};
