//! PNG codec with a pixel budget
//!
//! Decoding and encoding are CPU-bound, so they run on tokio's blocking pool
//! behind a semaphore. The pixel budget is enforced twice: against the
//! header dimensions before any pixel data is decoded, and against the
//! decoded image, because not every picture source can report its size up
//! front.

use std::sync::Arc;

use bytes::Bytes;
use image::codecs::png::PngEncoder;
use image::Limits;
use thiserror::Error;
use tokio::sync::Semaphore;
use vimg_core::{PictureError, PictureHandle, PictureSource};

use crate::config::{RefreshConfig, MAX_IMAGE_PIXELS};

const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Worst-case bytes per decoded pixel (RGBA, 32-bit float channels)
const MAX_BYTES_PER_PIXEL: u64 = 16;

/// Decoders need some headroom beyond the pixel buffer itself
const MIN_DECODE_ALLOC: u64 = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Picture is {width}x{height} ({pixels} pixels), budget is {max_pixels}")]
    Rejected {
        width: u32,
        height: u32,
        pixels: u64,
        max_pixels: u64,
    },

    #[error(transparent)]
    Decode(#[from] PictureError),

    #[error("PNG encoding failed: {0}")]
    Encode(String),

    #[error("Codec worker failed: {0}")]
    Worker(String),
}

/// Converts lazy pictures to PNG bytes
#[derive(Debug, Clone)]
pub struct ImageCodec {
    max_pixels: u64,
    permits: Arc<Semaphore>,
}

impl Default for ImageCodec {
    fn default() -> Self {
        Self::new(MAX_IMAGE_PIXELS, 2)
    }
}

impl ImageCodec {
    pub fn new(max_pixels: u64, max_concurrent: usize) -> Self {
        Self {
            max_pixels,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub fn from_config(config: &RefreshConfig) -> Self {
        Self::new(config.max_image_pixels, config.max_concurrent_encodes)
    }

    pub fn max_pixels(&self) -> u64 {
        self.max_pixels
    }

    /// Decode a picture and re-encode it as PNG on the blocking pool
    pub async fn encode(&self, picture: PictureHandle) -> Result<Bytes, CodecError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| CodecError::Worker(e.to_string()))?;

        // The permit is released by the blocking job, not by this future, so
        // a cancelled caller cannot push the pool past its limit
        let max_pixels = self.max_pixels;
        tokio::task::spawn_blocking(move || {
            let result = encode_png(picture.as_ref(), max_pixels);
            drop(permit);
            result
        })
        .await
        .map_err(|e| CodecError::Worker(e.to_string()))?
    }
}

/// Blocking PNG conversion with the pixel budget applied
pub fn encode_png(picture: &dyn PictureSource, max_pixels: u64) -> Result<Bytes, CodecError> {
    if let Some((width, height)) = picture.dimensions() {
        check_budget(width, height, max_pixels)?;
    }

    let image = picture.decode(&decode_limits(max_pixels))?;
    check_budget(image.width(), image.height(), max_pixels)?;

    let mut buffer = Vec::new();
    image
        .write_with_encoder(PngEncoder::new(&mut buffer))
        .map_err(|e| CodecError::Encode(e.to_string()))?;

    if !buffer.starts_with(PNG_SIGNATURE) {
        return Err(CodecError::Encode("output lacks PNG signature".to_string()));
    }
    Ok(Bytes::from(buffer))
}

fn check_budget(width: u32, height: u32, max_pixels: u64) -> Result<(), CodecError> {
    let pixels = u64::from(width) * u64::from(height);
    if pixels > max_pixels {
        return Err(CodecError::Rejected {
            width,
            height,
            pixels,
            max_pixels,
        });
    }
    Ok(())
}

fn decode_limits(max_pixels: u64) -> Limits {
    let mut limits = Limits::default();
    limits.max_alloc = Some(
        max_pixels
            .saturating_mul(MAX_BYTES_PER_PIXEL)
            .max(MIN_DECODE_ALLOC),
    );
    limits
}
