//! The per-locator unit of work: probe the store, read on a hit, fetch on a miss.

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::error::{Error, StoreError};
use crate::store::{FetchCompletion, FetchFailure, FetchResult};
use crate::types::{Artifact, BatchId, Event, FailureKind, Locator, StoredValue};

use super::FetchCoordinator;
use super::aggregator::ResultAggregator;

/// Everything one unit needs; owned so it can run on its own task
pub(super) struct FetchUnit {
    pub(super) coordinator: FetchCoordinator,
    pub(super) batch: BatchId,
    pub(super) locator: Locator,
    pub(super) aggregator: ResultAggregator,
    pub(super) limit: Option<Arc<Semaphore>>,
}

impl FetchUnit {
    /// Resolve the locator and record the outcome in the batch aggregator
    ///
    /// Every failure is absorbed here: it is logged, recorded as a
    /// [`FailureKind`], and never propagated.
    pub(super) async fn run(self) {
        // The semaphore is never closed, so acquisition only fails if it was
        let _permit = match &self.limit {
            Some(limit) => limit.clone().acquire_owned().await.ok(),
            None => None,
        };

        match self.resolve().await {
            Ok(artifact) => {
                self.aggregator.set(self.locator.clone(), artifact).await;
            }
            Err(kind) => {
                self.coordinator.emit_event(Event::LocatorFailed {
                    batch: self.batch,
                    locator: self.locator.clone(),
                    kind,
                });
                self.aggregator
                    .record_failure(self.locator.clone(), kind)
                    .await;
            }
        }
    }

    async fn resolve(&self) -> Result<Artifact, FailureKind> {
        let key = self.locator.as_key();
        let cached = match self.coordinator.store.exists(key).await {
            Ok(cached) => cached,
            Err(e) => return Err(self.absorb("Cache existence check failed", &e)),
        };

        if cached {
            self.read_cached().await
        } else {
            self.fetch().await
        }
    }

    /// Cache hit: read the stored value and decode it if it is still raw bytes
    async fn read_cached(&self) -> Result<Artifact, FailureKind> {
        let key = self.locator.as_key();
        let value = match self.coordinator.store.read(key).await {
            Ok(Some(value)) => value,
            Ok(None) => {
                let e = Error::from(StoreError::Vanished {
                    key: key.to_string(),
                });
                return Err(self.absorb("Cache read failed", &e));
            }
            Err(e) => return Err(self.absorb("Cache read failed", &e)),
        };

        let artifact = match value {
            StoredValue::Decoded(artifact) => artifact,
            StoredValue::Raw(bytes) => {
                let decoder = self.coordinator.decoder.clone();
                match tokio::task::spawn_blocking(move || decoder.decode(&bytes)).await {
                    Ok(Ok(artifact)) => artifact,
                    Ok(Err(e)) => {
                        return Err(self.absorb("Cached bytes failed to decode", &e.into()));
                    }
                    Err(e) => {
                        tracing::warn!(locator = %self.locator, error = %e, "Decode task failed");
                        return Err(FailureKind::Decode);
                    }
                }
            }
        };

        tracing::debug!(batch = %self.batch, locator = %self.locator, "Cache hit");
        self.coordinator.emit_event(Event::CacheHit {
            batch: self.batch,
            locator: self.locator.clone(),
        });
        Ok(artifact)
    }

    /// Cache miss: start a fetch-and-store and wait for its completion
    ///
    /// The handle is registered before waiting and deregistered after the
    /// completion (or timeout), whatever the outcome.
    async fn fetch(&self) -> Result<Artifact, FailureKind> {
        let store = &self.coordinator.store;
        let registry = &self.coordinator.registry;

        let (completion, pending) = FetchCompletion::channel();
        let handle = store
            .fetch_and_store(self.locator.as_key(), completion)
            .await;
        if let Some(handle) = handle {
            registry.add(handle).await;
        }
        tracing::debug!(
            batch = %self.batch,
            locator = %self.locator,
            handle = ?handle,
            "Cache miss, fetch started"
        );
        self.coordinator.emit_event(Event::FetchStarted {
            batch: self.batch,
            locator: self.locator.clone(),
            handle,
        });

        let result: FetchResult = match self.coordinator.config.fetch.unit_timeout {
            Some(limit) => match tokio::time::timeout(limit, pending.wait()).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(
                        batch = %self.batch,
                        locator = %self.locator,
                        timeout_ms = limit.as_millis() as u64,
                        "Fetch did not complete in time, cancelling"
                    );
                    if let Some(handle) = handle {
                        store.cancel(handle).await;
                    }
                    Err(FetchFailure::TimedOut)
                }
            },
            None => pending.wait().await,
        };

        if let Some(handle) = handle {
            registry.remove(handle).await;
        }

        match result {
            Ok(artifact) => {
                self.coordinator.emit_event(Event::Fetched {
                    batch: self.batch,
                    locator: self.locator.clone(),
                });
                Ok(artifact)
            }
            Err(failure) => {
                tracing::warn!(
                    batch = %self.batch,
                    locator = %self.locator,
                    error = %failure,
                    "Fetch produced no image"
                );
                Err(failure.kind())
            }
        }
    }

    fn absorb(&self, message: &'static str, error: &Error) -> FailureKind {
        let kind = error.failure_kind();
        tracing::warn!(
            batch = %self.batch,
            locator = %self.locator,
            error = %error,
            kind = %kind,
            "{}",
            message
        );
        kind
    }
}
