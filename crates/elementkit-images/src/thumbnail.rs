//! Downsizing of oversized payloads before they are cached.

use std::io::Cursor;

use bytes::Bytes;
use image::{DynamicImage, GenericImageView, ImageDecoder, ImageReader};
use tracing::{debug, warn};

use crate::{error::ImageResult, formats::ImageFormat};

/// Bytes budgeted per pixel when deciding whether a payload is oversized.
const BYTES_PER_PIXEL: u64 = 4;

/// Re-encodes images whose payload exceeds a square of `max_dimension`.
#[derive(Debug, Clone, Copy)]
pub struct Thumbnailer {
    max_dimension: u32,
}

impl Thumbnailer {
    /// Create a thumbnailer bounding the longest side to `max_dimension`
    pub fn new(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }

    /// Longest side a thumbnail may have
    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Payload size above which [`Thumbnailer::shrink`] decodes at all
    pub fn threshold_bytes(&self) -> u64 {
        let side = u64::from(self.max_dimension);
        side.saturating_mul(side).saturating_mul(BYTES_PER_PIXEL)
    }

    /// Whether a payload of `len` bytes is oversized
    pub fn needs_shrink(&self, len: usize) -> bool {
        len as u64 > self.threshold_bytes()
    }

    /// Shrink an oversized payload.
    ///
    /// Returns the input unchanged when it is under the threshold, when it
    /// cannot be decoded, or when re-encoding would not make it smaller.
    pub fn shrink(&self, bytes: Bytes) -> Bytes {
        if !self.needs_shrink(bytes.len()) {
            return bytes;
        }

        match self.try_shrink(&bytes) {
            Ok(Some(shrunk)) => {
                debug!(
                    original = bytes.len(),
                    thumbnail = shrunk.len(),
                    max_dimension = self.max_dimension,
                    "Created thumbnail"
                );
                shrunk
            }
            Ok(None) => bytes,
            Err(e) => {
                debug!(error = %e, "Keeping original payload");
                bytes
            }
        }
    }

    /// [`Thumbnailer::shrink`] on the blocking thread pool.
    pub async fn shrink_async(&self, bytes: Bytes) -> Bytes {
        if !self.needs_shrink(bytes.len()) {
            return bytes;
        }

        let thumbnailer = *self;
        let original = bytes.clone();
        match tokio::task::spawn_blocking(move || thumbnailer.shrink(bytes)).await {
            Ok(shrunk) => shrunk,
            Err(e) => {
                warn!(error = %e, "Thumbnail task failed");
                original
            }
        }
    }

    fn try_shrink(&self, bytes: &[u8]) -> ImageResult<Option<Bytes>> {
        let format = ImageFormat::detect_from_bytes(bytes).ok();

        let mut decoder = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .into_decoder()?;
        let orientation = decoder.orientation()?;
        let mut img = DynamicImage::from_decoder(decoder)?;
        img.apply_orientation(orientation);

        let (width, height) = img.dimensions();
        let resized = width.max(height) > self.max_dimension;
        if resized {
            img = img.thumbnail(self.max_dimension, self.max_dimension);
        }

        let encoded = encode(img, ImageFormat::thumbnail_format(format))?;
        if !resized && encoded.len() >= bytes.len() {
            return Ok(None);
        }
        Ok(Some(Bytes::from(encoded)))
    }
}

fn encode(img: DynamicImage, format: image::ImageFormat) -> ImageResult<Vec<u8>> {
    // The JPEG encoder rejects alpha channels
    let img = match format {
        image::ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()),
        _ => img,
    };

    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format)?;
    Ok(out.into_inner())
}
