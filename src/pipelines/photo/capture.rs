// SPDX-License-Identifier: MPL-2.0

//! Frame grab for still capture
//!
//! Draws the live frame into a fresh raster with a horizontal flip, so the
//! still matches the mirrored preview the user was looking at.

use crate::backends::camera::types::{CameraFrame, FrameSize};
use image::{Rgb, RgbImage, RgbaImage, imageops};
use tracing::debug;

/// Photo capture handler
pub struct PhotoCapture;

impl PhotoCapture {
    /// Draw `frame` into a `natural`-sized raster, flipped horizontally
    ///
    /// Source pixel (x, y) lands at (width - 1 - x, y). A frame whose size
    /// differs from the natural size is scaled to fit first. Alpha is
    /// dropped; JPEG carries none.
    pub fn mirror(frame: &CameraFrame, natural: FrameSize) -> Option<RgbImage> {
        if natural.width == 0 || natural.height == 0 {
            return None;
        }

        let source = Self::to_rgba_image(frame)?;
        let source = if source.dimensions() != (natural.width, natural.height) {
            debug!(
                frame = %frame.size(),
                natural = %natural,
                "Scaling frame to natural size"
            );
            imageops::resize(
                &source,
                natural.width,
                natural.height,
                imageops::FilterType::Triangle,
            )
        } else {
            source
        };

        let width = natural.width;
        let raster = RgbImage::from_fn(natural.width, natural.height, |x, y| {
            let px = source.get_pixel(width - 1 - x, y);
            Rgb([px[0], px[1], px[2]])
        });

        debug!(size = %natural, "Frame mirrored");
        Some(raster)
    }

    /// Repack a possibly padded frame into a tight RGBA image
    fn to_rgba_image(frame: &CameraFrame) -> Option<RgbaImage> {
        let row_bytes = frame.width as usize * 4;
        let stride = frame.stride as usize;
        if stride == row_bytes {
            let len = row_bytes * frame.height as usize;
            return RgbaImage::from_raw(frame.width, frame.height, frame.data.get(..len)?.to_vec());
        }

        let mut packed = Vec::with_capacity(row_bytes * frame.height as usize);
        for row in 0..frame.height as usize {
            let start = row * stride;
            packed.extend_from_slice(frame.data.get(start..start + row_bytes)?);
        }
        RgbaImage::from_raw(frame.width, frame.height, packed)
    }
}
