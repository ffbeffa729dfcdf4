//! Shared test helpers: fixture images and a scriptable fetcher

use std::collections::HashMap;
use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::{Result, StoreError};
use crate::transport::Fetcher;

/// Encode a solid-colour PNG of the given size
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 40, 40, 255]));
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(image)
        .write_to(&mut buf, image::ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// Fetcher serving fixed bodies, with an optional delay before every response
///
/// Unknown URLs answer 404.
#[derive(Default)]
pub(crate) struct StaticFetcher {
    bodies: HashMap<String, Vec<u8>>,
    delay: Option<Duration>,
}

impl StaticFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_body(mut self, url: &str, body: Vec<u8>) -> Self {
        self.bodies.insert(url.to_string(), body);
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.bodies.get(url.as_str()).cloned().ok_or_else(|| {
            StoreError::HttpStatus {
                key: url.to_string(),
                status: 404,
            }
            .into()
        })
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
