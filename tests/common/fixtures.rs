//! Test fixtures: encoded images, a scripted fetcher and coordinator builders

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use image_fetch::{
    Config, Error, FetchCoordinator, Fetcher, InMemoryBlobStore, RasterDecoder, StoreError,
};
use url::Url;

/// Encode a solid-colour PNG of the given size
pub fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba([20, 120, 220, 255]));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(image)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// Fetcher serving fixed bodies keyed by URL
///
/// Unknown URLs answer 404. Every call is counted, including failed ones.
#[derive(Default)]
pub struct FixtureFetcher {
    bodies: HashMap<String, Vec<u8>>,
    hanging: Vec<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`
    pub fn serve(mut self, url: &str, body: Vec<u8>) -> Self {
        self.bodies.insert(url.to_string(), body);
        self
    }

    /// Never answer for `url`
    pub fn hang(mut self, url: &str) -> Self {
        self.hanging.push(url.to_string());
        self
    }

    /// Sleep before every answer
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for FixtureFetcher {
    async fn fetch(&self, url: &Url) -> image_fetch::Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hanging.iter().any(|h| h == url.as_str()) {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.bodies
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| {
                Error::from(StoreError::HttpStatus {
                    key: url.to_string(),
                    status: 404,
                })
            })
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}

/// Build a coordinator over a fresh [`InMemoryBlobStore`] fed by `fetcher`
///
/// Returns the coordinator and the store (a clone sharing the same tiers).
pub fn create_coordinator(
    fetcher: Arc<dyn Fetcher>,
    config: Config,
) -> (FetchCoordinator, InMemoryBlobStore) {
    let decoder = Arc::new(RasterDecoder::from_config(&config.fetch));
    let store = InMemoryBlobStore::new(fetcher, decoder.clone());
    let coordinator = FetchCoordinator::new(config, Arc::new(store.clone()), decoder).unwrap();
    (coordinator, store)
}
