//! Image decoding
//!
//! The coordinator decodes raw bytes it reads from a store; stores decode what
//! they fetch. Both go through [`ImageDecoder`] so the codec can be swapped.

use std::io::Cursor;

use image::ImageReader;

use crate::config::FetchConfig;
use crate::error::DecodeError;
use crate::types::Artifact;

/// Turns encoded image bytes into an [`Artifact`]
pub trait ImageDecoder: Send + Sync {
    /// Decode `bytes`
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the bytes are empty, in an unknown format,
    /// corrupt, or exceed the decoder's size limit.
    fn decode(&self, bytes: &[u8]) -> Result<Artifact, DecodeError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Raster decoder backed by the `image` crate (PNG, JPEG, GIF, WebP, BMP)
///
/// The format is sniffed from the leading bytes. Dimensions are checked
/// against `max_pixels` before the full decode so an oversized image is
/// rejected without allocating its pixel buffer.
#[derive(Clone, Debug)]
pub struct RasterDecoder {
    max_pixels: u64,
}

impl RasterDecoder {
    /// Create a decoder that rejects images larger than `max_pixels`
    pub fn new(max_pixels: u64) -> Self {
        Self { max_pixels }
    }

    /// Create a decoder using the configured pixel limit
    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(config.max_decoded_pixels)
    }

    fn check_dimensions(&self, width: u32, height: u32) -> Result<(), DecodeError> {
        if u64::from(width) * u64::from(height) > self.max_pixels {
            return Err(DecodeError::TooLarge {
                width,
                height,
                limit: self.max_pixels,
            });
        }
        Ok(())
    }
}

impl Default for RasterDecoder {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}

impl ImageDecoder for RasterDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Artifact, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }
        let format = image::guess_format(bytes).map_err(|_| DecodeError::UnknownFormat)?;

        let reader = ImageReader::with_format(Cursor::new(bytes), format);
        let (width, height) = reader.into_dimensions()?;
        self.check_dimensions(width, height)?;

        let decoded = image::load_from_memory_with_format(bytes, format)?;
        let rgba = decoded.into_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Artifact::new(width, height, rgba.into_raw()))
    }

    fn name(&self) -> &'static str {
        "raster"
    }
}
