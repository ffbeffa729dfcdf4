use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::test_helpers::{Script, ScriptedBlobStore, artifact, create_test_coordinator};
use super::FetchCoordinator;
use crate::config::Config;
use crate::types::{Event, FailureKind, Locator, StoredValue};


const A: &str = "https://img.example.com/a.png";
const B: &str = "https://img.example.com/b.png";
const C: &str = "https://img.example.com/c.png";

fn loc(s: &str) -> Locator {
    Locator::from(s)
}

fn coordinator_over(store: ScriptedBlobStore) -> (FetchCoordinator, Arc<ScriptedBlobStore>) {
    coordinator_with(store, Config::default())
}

fn coordinator_with(
    store: ScriptedBlobStore,
    config: Config,
) -> (FetchCoordinator, Arc<ScriptedBlobStore>) {
    let store = Arc::new(store);
    (create_test_coordinator(store.clone(), config), store)
}

/// Drain every event already sitting in the receiver
fn collect_events(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Poll until `count` fetches are registered as in flight
async fn wait_for_active(coordinator: &FetchCoordinator, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while coordinator.active_download_count().await < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("fetches never registered");
}

fn failures_of(pairs: &[(&str, FailureKind)]) -> HashMap<Locator, FailureKind> {
    pairs.iter().map(|(l, k)| (loc(l), *k)).collect()
}
