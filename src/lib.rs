//! # image-fetch
//!
//! Concurrent batch image fetching over a pluggable two-tier cache.
//!
//! ## Design Philosophy
//!
//! image-fetch is designed to be:
//! - **Cache-first** - A locator already in the store is never fetched again
//! - **Failure-tolerant** - A failed locator is absent from the results, never an error
//! - **Cancellable** - Every in-flight fetch can be cancelled in one call
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use image_fetch::{Config, FetchCoordinator, HttpFetcher, InMemoryBlobStore, RasterDecoder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let decoder = Arc::new(RasterDecoder::from_config(&config.fetch));
//!     let fetcher = Arc::new(HttpFetcher::new(&config.fetch)?);
//!     let store = Arc::new(InMemoryBlobStore::new(fetcher, decoder.clone()));
//!
//!     let coordinator = FetchCoordinator::new(config, store, decoder)?;
//!     coordinator.set_cache_limit().await;
//!
//!     // Subscribe to events
//!     let mut events = coordinator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let outcome = coordinator
//!         .fetch_images(["https://example.com/a.png", "https://example.com/b.png"])
//!         .await;
//!     println!("{} images fetched", outcome.len());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Batch fetch coordination (decomposed into focused submodules)
pub mod coordinator;
/// Image decoding
pub mod decode;
/// Error types
pub mod error;
/// Blob store seam and the in-memory store
pub mod store;
/// Network transport for the in-memory store
pub mod transport;
/// Core types
pub mod types;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use config::{CacheConfig, Config, EventConfig, FetchConfig};
pub use coordinator::{
    ActiveTaskRegistry, CallbackContext, CompletionGate, FetchCoordinator, GateGuard,
    ResultAggregator,
};
pub use decode::{ImageDecoder, RasterDecoder};
pub use error::{DecodeError, Error, Result, StoreError};
pub use store::{
    BlobStore, FetchCompletion, FetchFailure, FetchResult, InMemoryBlobStore, PendingFetch,
};
pub use transport::{Fetcher, HttpFetcher};
pub use types::{
    Artifact, BatchId, BatchOutcome, Event, FailureKind, Locator, ResultMap, StoredValue,
    TaskHandle,
};
