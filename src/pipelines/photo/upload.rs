// SPDX-License-Identifier: GPL-3.0-only

//! File-selection bypass
//!
//! An image the user picks from disk skips the camera entirely but comes out
//! in the same representation as a live capture.

use crate::constants::file_formats;
use crate::errors::PhotoError;
use image::RgbImage;
use std::path::Path;
use tracing::{debug, warn};

/// Decode uploaded bytes of any supported image format
pub fn decode(bytes: &[u8]) -> Result<RgbImage, PhotoError> {
    let format = image::guess_format(bytes).map_err(|e| PhotoError::DecodeFailed(e.to_string()))?;
    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| PhotoError::DecodeFailed(e.to_string()))?;
    debug!(
        format = ?format,
        width = img.width(),
        height = img.height(),
        "Decoded uploaded image"
    );
    Ok(img.to_rgb8())
}

/// Read a whole file into memory
pub async fn read_file(path: &Path) -> Result<Vec<u8>, PhotoError> {
    let has_image_ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(file_formats::is_image_extension);
    if !has_image_ext {
        // Content sniffing decides; the extension is only a hint
        warn!(path = %path.display(), "Uploaded file has no image extension");
    }

    tokio::fs::read(path)
        .await
        .map_err(|e| PhotoError::DecodeFailed(format!("{}: {}", path.display(), e)))
}
