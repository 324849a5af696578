// SPDX-License-Identifier: MPL-2.0

//! Still capture pipeline
//!
//! ```text
//! Live frame ──▶ Mirror ──▶ Encode (JPEG) ──▶ CapturedImage
//! Upload     ──▶ Decode ──▶ Encode (JPEG) ──▶ CapturedImage
//! ```
//!
//! Both paths produce the same payload; the host cannot tell them apart.

pub mod capture;
pub mod encoding;
pub mod upload;

pub use capture::PhotoCapture;
pub use encoding::PhotoEncoder;

use crate::backends::camera::types::{CameraFrame, FrameSize};
use crate::constants::encoding::CAPTURE_MIME;
use crate::errors::PhotoError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, ImageReader};
use std::io::Cursor;

/// Encoded still handed to the host exactly once per capture
///
/// Carries nothing but the payload; the size lives in the JPEG header.
#[derive(Clone, PartialEq, Eq)]
pub struct CapturedImage {
    /// MIME type of `data`
    pub mime: &'static str,
    /// Encoded bytes
    pub data: Vec<u8>,
}

impl CapturedImage {
    pub fn jpeg(data: Vec<u8>) -> Self {
        Self {
            mime: CAPTURE_MIME,
            data,
        }
    }

    /// `data:` URL form, as a web view would render it
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.data))
    }

    /// Pixel size read from the JPEG header, `None` if the header is unreadable
    pub fn dimensions(&self) -> Option<FrameSize> {
        ImageReader::with_format(Cursor::new(&self.data), ImageFormat::Jpeg)
            .into_dimensions()
            .ok()
            .map(|(width, height)| FrameSize::new(width, height))
    }
}

impl std::fmt::Debug for CapturedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedImage")
            .field("mime", &self.mime)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Mirror-and-encode pipeline shared by live capture and upload
#[derive(Debug, Clone, Copy, Default)]
pub struct PhotoPipeline {
    encoder: PhotoEncoder,
}

impl PhotoPipeline {
    pub fn new(encoder: PhotoEncoder) -> Self {
        Self { encoder }
    }

    /// Mirror a live frame at its natural size and encode it
    pub async fn from_frame(
        &self,
        frame: CameraFrame,
        natural: FrameSize,
    ) -> Result<CapturedImage, PhotoError> {
        let raster = tokio::task::spawn_blocking(move || PhotoCapture::mirror(&frame, natural))
            .await
            .map_err(|e| PhotoError::EncodingFailed(format!("mirror task error: {}", e)))?
            .ok_or(PhotoError::NoFrameAvailable)?;
        self.encoder.encode(raster).await
    }

    /// Decode uploaded bytes and re-encode them as a capture
    pub async fn from_upload(&self, bytes: Vec<u8>) -> Result<CapturedImage, PhotoError> {
        let raster = tokio::task::spawn_blocking(move || upload::decode(&bytes))
            .await
            .map_err(|e| PhotoError::DecodeFailed(format!("decode task error: {}", e)))??;
        self.encoder.encode(raster).await
    }
}
