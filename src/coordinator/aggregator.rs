//! Per-batch result aggregation

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::types::{Artifact, FailureKind, Locator, ResultMap};

#[derive(Default)]
struct Aggregate {
    results: ResultMap,
    failures: HashMap<Locator, FailureKind>,
}

/// Locator → artifact mapping filled concurrently by the units of one batch
///
/// Writes are serialized behind one mutex. Nothing reads the mapping until
/// the batch gate has drained, then [`finish`](Self::finish) hands it off.
/// A locator is never both mapped and failed: a success clears an earlier
/// failure for the same key, and a failure never displaces an artifact.
#[derive(Clone, Default)]
pub struct ResultAggregator {
    state: Arc<Mutex<Aggregate>>,
}

impl ResultAggregator {
    /// Create an empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an artifact; the last write for a locator wins
    pub async fn set(&self, locator: Locator, artifact: Artifact) {
        let mut state = self.state.lock().await;
        state.failures.remove(&locator);
        state.results.insert(locator, artifact);
    }

    /// Record that a locator produced no artifact
    pub async fn record_failure(&self, locator: Locator, kind: FailureKind) {
        let mut state = self.state.lock().await;
        if !state.results.contains_key(&locator) {
            state.failures.insert(locator, kind);
        }
    }

    /// Take the accumulated results and failures
    pub async fn finish(&self) -> (ResultMap, HashMap<Locator, FailureKind>) {
        let mut state = self.state.lock().await;
        (
            std::mem::take(&mut state.results),
            std::mem::take(&mut state.failures),
        )
    }
}
