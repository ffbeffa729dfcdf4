//! Custom test assertions for integration tests

use std::time::Duration;

use image_fetch::{BatchOutcome, Event, FetchCoordinator, Locator};

/// Wait for the first event matching `predicate`
///
/// Returns `None` on timeout or if the channel closes.
pub async fn wait_for_event<F>(
    events: &mut tokio::sync::broadcast::Receiver<Event>,
    timeout: Duration,
    mut predicate: F,
) -> Option<Event>
where
    F: FnMut(&Event) -> bool,
{
    tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => return Some(event),
                Ok(_) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

/// Poll until `count` fetches are registered as in flight
pub async fn wait_for_active(coordinator: &FetchCoordinator, count: usize, timeout: Duration) {
    let reached = tokio::time::timeout(timeout, async {
        while coordinator.active_download_count().await < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "never saw {count} active downloads");
}

/// Assert the outcome holds exactly these locators, each with the given size
pub fn assert_images(outcome: &BatchOutcome, expected: &[(&str, u32, u32)]) {
    assert!(outcome.success, "batch outcome must always be successful");
    let results = outcome
        .results
        .as_ref()
        .expect("non-empty batch must carry a result map");
    assert_eq!(
        results.len(),
        expected.len(),
        "unexpected result set: {:?}",
        results.keys().collect::<Vec<_>>()
    );
    for (locator, width, height) in expected {
        let image = results
            .get(&Locator::from(*locator))
            .unwrap_or_else(|| panic!("missing result for {locator}"));
        assert_eq!((image.width(), image.height()), (*width, *height), "{locator}");
    }
}
