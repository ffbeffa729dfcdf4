//! Batch fan-out and fan-in.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;

use crate::types::{BatchOutcome, Event, FailureKind, Locator, ResultMap};

use super::FetchCoordinator;
use super::aggregator::ResultAggregator;
use super::gate::{CompletionGate, GateGuard};
use super::unit::FetchUnit;

impl FetchCoordinator {
    /// Fetch a batch of images, preferring the store's cached copies
    ///
    /// One unit of work is spawned per input entry (duplicates included) and
    /// all run concurrently. The returned outcome is produced only after
    /// every unit has finished, successfully or not.
    ///
    /// - Empty input completes immediately with `success = true` and
    ///   `results = None`.
    /// - A locator that could not be read, fetched or decoded is simply
    ///   absent from `results`; the cause is in `failures`.
    /// - `success` is always `true`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use image_fetch::*;
    /// # async fn example(coordinator: FetchCoordinator) {
    /// let outcome = coordinator
    ///     .fetch_images(["https://example.com/a.png", "https://example.com/b.png"])
    ///     .await;
    /// for (locator, image) in outcome.results.unwrap_or_default() {
    ///     println!("{locator}: {}x{}", image.width(), image.height());
    /// }
    /// # }
    /// ```
    pub async fn fetch_images<I, L>(&self, locators: I) -> BatchOutcome
    where
        I: IntoIterator<Item = L>,
        L: Into<Locator>,
    {
        let locators: Vec<Locator> = locators.into_iter().map(Into::into).collect();
        if locators.is_empty() {
            tracing::debug!("Empty batch requested, nothing to fetch");
            return BatchOutcome::empty_request();
        }

        let batch = self.next_batch_id();
        let units = locators.len();
        tracing::info!(batch = %batch, units, "Starting batch");
        self.emit_event(Event::BatchStarted { batch, units });

        let gate = CompletionGate::new();
        let aggregator = ResultAggregator::new();
        let limit = self
            .config
            .fetch
            .max_concurrent_units
            .map(|n| Arc::new(Semaphore::new(n)));

        // Enter for every unit before spawning any, so the gate drains exactly once
        let guards: Vec<GateGuard> = locators.iter().map(|_| gate.enter()).collect();

        for (locator, guard) in locators.into_iter().zip(guards) {
            let unit = FetchUnit {
                coordinator: self.clone(),
                batch,
                locator,
                aggregator: aggregator.clone(),
                limit: limit.clone(),
            };
            tokio::spawn(run_guarded(unit, guard));
        }

        gate.drained().await;

        let (results, failures) = aggregator.finish().await;
        tracing::info!(
            batch = %batch,
            succeeded = results.len(),
            failed = failures.len(),
            "Batch complete"
        );
        self.emit_event(Event::BatchCompleted {
            batch,
            succeeded: results.len(),
            failed: failures.len(),
        });

        BatchOutcome::completed(results, failures)
    }

    /// Callback form of [`fetch_images`](Self::fetch_images)
    ///
    /// `completion` is invoked exactly once, on the coordinator's
    /// [`CallbackContext`](super::CallbackContext), with `(true, results)`.
    /// For an empty request `results` is `None`.
    pub fn fetch_images_with<I, L, F>(&self, locators: I, completion: F)
    where
        I: IntoIterator<Item = L>,
        L: Into<Locator>,
        F: FnOnce(bool, Option<ResultMap>) + Send + 'static,
    {
        let locators: Vec<Locator> = locators.into_iter().map(Into::into).collect();
        let coordinator = self.clone();
        tokio::spawn(async move {
            let (success, results) = coordinator.fetch_images(locators).await.into_parts();
            if !coordinator
                .callbacks
                .dispatch(move || completion(success, results))
            {
                tracing::error!("Callback context stopped, batch completion dropped");
            }
        });
    }
}

/// Run one unit, then leave the gate even if the unit panicked
async fn run_guarded(unit: FetchUnit, guard: GateGuard) {
    let batch = unit.batch;
    let locator = unit.locator.clone();
    let aggregator = unit.aggregator.clone();

    if AssertUnwindSafe(unit.run()).catch_unwind().await.is_err() {
        tracing::error!(batch = %batch, locator = %locator, "Fetch unit panicked");
        aggregator.record_failure(locator, FailureKind::Fetch).await;
    }
    guard.leave();
}
