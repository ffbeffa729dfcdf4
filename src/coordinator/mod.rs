//! Fetch coordination split into focused submodules.
//!
//! The `FetchCoordinator` struct and its methods are organized by concern:
//! - [`batch`] - Batch fan-out, barrier wait and result hand-off
//! - [`unit`] - The per-locator probe / read / fetch algorithm
//! - [`cache_control`] - Cancellation and cache maintenance pass-throughs
//! - [`gate`] - Counting completion barrier
//! - [`registry`] - In-flight task handle registry
//! - [`aggregator`] - Per-batch result aggregation
//! - [`callback`] - Serial context for completion callbacks

mod aggregator;
mod batch;
mod cache_control;
mod callback;
mod gate;
mod registry;
mod unit;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use aggregator::ResultAggregator;
pub use callback::CallbackContext;
pub use gate::{CompletionGate, GateGuard};
pub use registry::ActiveTaskRegistry;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::Config;
use crate::decode::ImageDecoder;
use crate::error::{Error, Result};
use crate::store::BlobStore;
use crate::types::{BatchId, Event};

/// Batch image fetcher over a [`BlobStore`] (cloneable - all fields are Arc-wrapped)
///
/// Construct one per application and share clones; every clone drives the
/// same store, task registry, event channel and callback context.
#[derive(Clone)]
pub struct FetchCoordinator {
    /// Cache / network collaborator
    pub(crate) store: Arc<dyn BlobStore>,
    /// Decoder for raw bytes read from the store
    pub(crate) decoder: Arc<dyn ImageDecoder>,
    /// Configuration (wrapped in Arc for sharing across units)
    pub(crate) config: Arc<Config>,
    /// Handles of fetches still in flight, across all batches
    pub(crate) registry: ActiveTaskRegistry,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Context on which callback-style completions run
    pub(crate) callbacks: CallbackContext,
    /// Source of batch IDs
    pub(crate) next_batch_id: Arc<AtomicU64>,
}

impl FetchCoordinator {
    /// Create a coordinator
    ///
    /// Must be called inside a Tokio runtime: the callback context is started
    /// on it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid, or
    /// [`Error::Other`] when called outside a Tokio runtime.
    pub fn new(
        config: Config,
        store: Arc<dyn BlobStore>,
        decoder: Arc<dyn ImageDecoder>,
    ) -> Result<Self> {
        config.validate()?;
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(Error::Other(
                "FetchCoordinator must be created inside a Tokio runtime".to_string(),
            ));
        }

        let (event_tx, _rx) = tokio::sync::broadcast::channel(config.events.channel_capacity);

        tracing::info!(
            store = store.name(),
            decoder = decoder.name(),
            unit_timeout_ms = config.fetch.unit_timeout.map(|d| d.as_millis() as u64),
            max_concurrent_units = config.fetch.max_concurrent_units,
            "Fetch coordinator initialized"
        );

        Ok(Self {
            store,
            decoder,
            config: Arc::new(config),
            registry: ActiveTaskRegistry::new(),
            event_tx,
            callbacks: CallbackContext::start(),
            next_batch_id: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Subscribe to batch events
    ///
    /// Each subscriber receives every event independently. A subscriber that
    /// falls more than `events.channel_capacity` events behind receives
    /// `RecvError::Lagged`.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// The context completion callbacks are delivered on
    ///
    /// Work dispatched here is serialized with batch completions.
    pub fn callback_context(&self) -> &CallbackContext {
        &self.callbacks
    }

    /// Number of fetches currently registered as in flight
    pub async fn active_download_count(&self) -> usize {
        self.registry.len().await
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    pub(crate) fn next_batch_id(&self) -> BatchId {
        BatchId(self.next_batch_id.fetch_add(1, Ordering::Relaxed))
    }
}
