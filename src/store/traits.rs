//! The blob store capability the coordinator drives

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::error::{Error, StoreError};
use crate::types::{Artifact, FailureKind, StoredValue, TaskHandle};

/// Why a fetch-and-store produced no artifact
#[derive(Debug)]
pub enum FetchFailure {
    /// The fetch was cancelled through [`BlobStore::cancel`]
    Cancelled,
    /// The unit gave up waiting for the completion
    TimedOut,
    /// The store dropped the completion without firing it
    Abandoned,
    /// Network, store or decode failure
    Failed(Error),
}

impl FetchFailure {
    /// Classify onto the per-locator failure taxonomy
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchFailure::Cancelled => FailureKind::Cancelled,
            FetchFailure::TimedOut => FailureKind::TimedOut,
            FetchFailure::Abandoned => FailureKind::Fetch,
            FetchFailure::Failed(e) => e.failure_kind(),
        }
    }
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchFailure::Cancelled => f.write_str("fetch cancelled"),
            FetchFailure::TimedOut => f.write_str("fetch timed out"),
            FetchFailure::Abandoned => f.write_str("store dropped the fetch completion"),
            FetchFailure::Failed(e) => write!(f, "{e}"),
        }
    }
}

impl From<Error> for FetchFailure {
    fn from(e: Error) -> Self {
        FetchFailure::Failed(e)
    }
}

impl From<StoreError> for FetchFailure {
    fn from(e: StoreError) -> Self {
        FetchFailure::Failed(e.into())
    }
}

/// Outcome delivered through a [`FetchCompletion`]
pub type FetchResult = std::result::Result<Artifact, FetchFailure>;

/// One-shot completion for a fetch-and-store
///
/// Every completing method consumes `self`, so a store can fire it at most
/// once. Dropping it unfired is observed by the waiting side as
/// [`FetchFailure::Abandoned`].
#[derive(Debug)]
pub struct FetchCompletion {
    tx: oneshot::Sender<FetchResult>,
}

/// The waiting side of a [`FetchCompletion`]
#[derive(Debug)]
pub struct PendingFetch {
    rx: oneshot::Receiver<FetchResult>,
}

impl FetchCompletion {
    /// Create a linked completion / pending pair
    pub fn channel() -> (FetchCompletion, PendingFetch) {
        let (tx, rx) = oneshot::channel();
        (FetchCompletion { tx }, PendingFetch { rx })
    }

    /// Deliver the outcome
    ///
    /// If the waiting side already gave up (unit timeout), the outcome is dropped.
    pub fn complete(self, result: FetchResult) {
        if self.tx.send(result).is_err() {
            tracing::debug!("Fetch completion fired after the waiting unit gave up");
        }
    }

    /// Deliver a fetched artifact
    pub fn succeed(self, artifact: Artifact) {
        self.complete(Ok(artifact));
    }

    /// Deliver a failure
    pub fn fail(self, error: impl Into<Error>) {
        self.complete(Err(FetchFailure::Failed(error.into())));
    }

    /// Deliver a cancellation
    pub fn cancelled(self) {
        self.complete(Err(FetchFailure::Cancelled));
    }

    /// True if nobody is waiting for this completion any more
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }
}

impl PendingFetch {
    /// Wait for the store to fire the completion
    pub async fn wait(self) -> FetchResult {
        self.rx.await.unwrap_or(Err(FetchFailure::Abandoned))
    }
}

/// Content-addressable image cache with network fallback
///
/// Keys are locator strings. Implementations own storage, transport and
/// decoding; the coordinator only probes, reads, and starts fetches.
///
/// # Contract
///
/// - `fetch_and_store` fires `completion` exactly once, with a failure on
///   network error, decode error or cancellation.
/// - `cancel` is best-effort but must make a still-pending completion fire
///   (with [`FetchFailure::Cancelled`]).
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Whether an entry exists for `key`
    async fn exists(&self, key: &str) -> crate::Result<bool>;

    /// Read the entry for `key`; `Ok(None)` if it is not there
    async fn read(&self, key: &str) -> crate::Result<Option<StoredValue>>;

    /// Start fetching `key` and storing the result
    ///
    /// Returns a handle for cancellation if the store tracks the fetch.
    async fn fetch_and_store(&self, key: &str, completion: FetchCompletion) -> Option<TaskHandle>;

    /// Request cancellation of an in-flight fetch
    async fn cancel(&self, handle: TaskHandle);

    /// Limit the memory tier to `bytes` of decoded image data
    async fn set_memory_cost_limit(&self, bytes: u64);

    /// Remove every entry from every tier
    async fn clear_all(&self);

    /// Remove every entry from the disk tier
    async fn clear_disk(&self);

    /// Remove every entry from the memory tier
    async fn clear_memory(&self);

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
