//! Batch fetch example
//!
//! This example demonstrates the core functionality of image-fetch:
//! - Building the in-memory store over HTTP
//! - Creating a coordinator and applying the cache limit
//! - Subscribing to events
//! - Fetching a batch twice, the second time from cache
//!
//! ```bash
//! cargo run --example fetch_batch -- https://example.com/a.png https://example.com/b.jpg
//! ```

use std::sync::Arc;

use image_fetch::{
    Config, Event, FetchCoordinator, HttpFetcher, InMemoryBlobStore, Locator, RasterDecoder,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("image_fetch=info")),
        )
        .with_target(false)
        .init();

    let locators: Vec<Locator> = std::env::args()
        .skip(1)
        .map(|arg| Locator::parse(&arg))
        .collect::<Result<_, _>>()?;
    if locators.is_empty() {
        eprintln!("usage: fetch_batch <url> [<url>...]");
        return Ok(());
    }

    let config = Config {
        fetch: image_fetch::FetchConfig {
            unit_timeout: Some(std::time::Duration::from_secs(20)),
            max_concurrent_units: Some(8),
            ..Default::default()
        },
        ..Default::default()
    };

    let decoder = Arc::new(RasterDecoder::from_config(&config.fetch));
    let fetcher = Arc::new(HttpFetcher::new(&config.fetch)?);
    let store = Arc::new(InMemoryBlobStore::new(fetcher, decoder.clone()));

    let coordinator = FetchCoordinator::new(config, store, decoder)?;
    coordinator.set_cache_limit().await;

    // Subscribe to events
    let mut events = coordinator.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::CacheHit { locator, .. } => println!("  cache  {locator}"),
                Event::Fetched { locator, .. } => println!("  fetch  {locator}"),
                Event::LocatorFailed { locator, kind, .. } => {
                    println!("  failed {locator} ({kind})")
                }
                _ => {}
            }
        }
    });

    for pass in ["cold", "warm"] {
        println!("{pass} pass:");
        let outcome = coordinator.fetch_images(locators.clone()).await;
        for (locator, image) in outcome.results.iter().flatten() {
            println!(
                "  {}x{} ({} bytes) {}",
                image.width(),
                image.height(),
                image.cost(),
                locator
            );
        }
        println!(
            "  {} of {} locators produced an image",
            outcome.len(),
            locators.len()
        );
    }

    Ok(())
}
