// SPDX-License-Identifier: GPL-3.0-only

//! Async photo encoding
//!
//! Every still leaves the core as a JPEG, whether it came from the live feed
//! or from an uploaded file. Encoding runs on the blocking pool.

use super::CapturedImage;
use crate::constants::encoding;
use crate::errors::PhotoError;
use image::RgbImage;
use tracing::{debug, info};

/// JPEG photo encoder
#[derive(Debug, Clone, Copy)]
pub struct PhotoEncoder {
    /// JPEG quality on the encoder's 1 - 100 scale
    quality: u8,
}

impl PhotoEncoder {
    /// Create an encoder at the default quality (0.85)
    pub fn new() -> Self {
        Self::with_quality(encoding::JPEG_QUALITY)
    }

    /// Create an encoder from a 0.0 - 1.0 quality factor
    pub fn with_quality(quality: f32) -> Self {
        Self {
            quality: encoding::jpeg_quality_percent(quality),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encode an image asynchronously
    pub async fn encode(&self, image: RgbImage) -> Result<CapturedImage, PhotoError> {
        info!(
            width = image.width(),
            height = image.height(),
            quality = self.quality,
            "Starting encoding"
        );

        let quality = self.quality;
        tokio::task::spawn_blocking(move || {
            let data = Self::encode_jpeg(&image, quality)?;
            debug!(size = data.len(), "Encoding complete");
            Ok(CapturedImage::jpeg(data))
        })
        .await
        .map_err(|e| PhotoError::EncodingFailed(format!("encoding task error: {}", e)))?
    }

    /// Encode image as JPEG
    pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, PhotoError> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);

        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);

        encoder.encode(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgb8,
        )?;

        Ok(buffer)
    }
}

impl Default for PhotoEncoder {
    fn default() -> Self {
        Self::new()
    }
}
