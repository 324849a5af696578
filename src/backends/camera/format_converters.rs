// SPDX-License-Identifier: GPL-3.0-only
//! Pixel format conversion for the V4L2 capture thread
//!
//! Every format a webcam is asked for ends up as tightly packed RGBA so the
//! rest of the crate only ever deals with one layout.

use tracing::warn;
use v4l::FourCC;

/// Formats the capture thread knows how to decode, in order of preference
pub const SUPPORTED_FOURCCS: [&[u8; 4]; 3] = [b"MJPG", b"YUYV", b"UYVY"];

/// Whether frames in `fourcc` can be converted to RGBA
pub fn is_supported(fourcc: FourCC) -> bool {
    SUPPORTED_FOURCCS.iter().any(|f| FourCC::new(f) == fourcc)
}

/// Convert one raw buffer to RGBA
///
/// `stride` is the driver's bytes per line; packed formats may pad each row.
/// Returns the actual dimensions along with the pixels, or `None` for unknown
/// formats and for buffers that fail to decode (a truncated MJPEG frame, for
/// instance).
pub fn to_rgba(
    fourcc: FourCC,
    data: &[u8],
    width: u32,
    height: u32,
    stride: u32,
) -> Option<(u32, u32, Vec<u8>)> {
    if fourcc == FourCC::new(b"MJPG") {
        mjpeg_to_rgba(data, width, height)
    } else if fourcc == FourCC::new(b"YUYV") {
        let rgba = yuv422_to_rgba(data, width, height, stride, Yuv422Order::Yuyv);
        Some((width, height, rgba))
    } else if fourcc == FourCC::new(b"UYVY") {
        let rgba = yuv422_to_rgba(data, width, height, stride, Yuv422Order::Uyvy);
        Some((width, height, rgba))
    } else {
        warn!(fourcc = ?fourcc, "Unsupported capture format");
        None
    }
}

/// Byte order of a packed 4:2:2 buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Yuv422Order {
    /// Y0 U0 Y1 V0
    Yuyv,
    /// U0 Y0 V0 Y1
    Uyvy,
}

/// Convert packed YUV 4:2:2 to RGBA
///
/// Each 4-byte group encodes 2 pixels. Uses BT.601 coefficients. Rows start
/// every `stride` bytes; a stride below `width * 2` (including 0) means the
/// rows are tightly packed.
pub fn yuv422_to_rgba(
    data: &[u8],
    width: u32,
    height: u32,
    stride: u32,
    order: Yuv422Order,
) -> Vec<u8> {
    let width = width as usize;
    let height = height as usize;
    let row_bytes = width * 2;
    let stride = (stride as usize).max(row_bytes);
    let pixel_count = width * height;
    let mut rgba = Vec::with_capacity(pixel_count * 4);

    for row in 0..height {
        let start = row * stride;
        let Some(line) = data.get(start..data.len().min(start + row_bytes)) else {
            break;
        };
        let row_end = rgba.len() + width * 4;

        for chunk in line.chunks_exact(4) {
            let (y0, u, y1, v) = match order {
                Yuv422Order::Yuyv => (chunk[0], chunk[1], chunk[2], chunk[3]),
                Yuv422Order::Uyvy => (chunk[1], chunk[0], chunk[3], chunk[2]),
            };
            let u = u as f32 - 128.0;
            let v = v as f32 - 128.0;

            for y in [y0 as f32, y1 as f32] {
                if rgba.len() >= row_end {
                    break;
                }
                let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
                let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
                let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;

                rgba.extend_from_slice(&[r, g, b, 255]);
            }
        }
        rgba.resize(row_end, 0);
    }

    // Short buffers are padded with opaque black
    rgba.resize(pixel_count * 4, 0);
    for px in rgba.chunks_exact_mut(4) {
        px[3] = 255;
    }

    rgba
}

/// Decode an MJPEG frame to RGBA
///
/// The decoded size wins over the negotiated one; some drivers lie.
pub fn mjpeg_to_rgba(data: &[u8], width: u32, height: u32) -> Option<(u32, u32, Vec<u8>)> {
    let decoded = match image::load_from_memory_with_format(data, image::ImageFormat::Jpeg) {
        Ok(img) => img.to_rgba8(),
        Err(e) => {
            warn!(error = %e, "Failed to decode MJPEG frame");
            return None;
        }
    };

    if decoded.width() != width || decoded.height() != height {
        warn!(
            expected_width = width,
            expected_height = height,
            width = decoded.width(),
            height = decoded.height(),
            "MJPEG frame size differs from negotiated format"
        );
    }

    Some((decoded.width(), decoded.height(), decoded.into_raw()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_grey() {
        // Two mid-grey pixels: Y=128, U=V=128
        let rgba = yuv422_to_rgba(&[128, 128, 128, 128], 2, 1, 0, Yuv422Order::Yuyv);
        assert_eq!(rgba, vec![128, 128, 128, 255, 128, 128, 128, 255]);
    }

    #[test]
    fn test_uyvy_byte_order() {
        // Y0=255 Y1=0, neutral chroma
        let yuyv = yuv422_to_rgba(&[255, 128, 0, 128], 2, 1, 4, Yuv422Order::Yuyv);
        let uyvy = yuv422_to_rgba(&[128, 255, 128, 0], 2, 1, 4, Yuv422Order::Uyvy);
        assert_eq!(yuyv, uyvy);
        assert_eq!(&yuyv[0..3], &[255, 255, 255]);
        assert_eq!(&yuyv[4..7], &[0, 0, 0]);
    }

    #[test]
    fn test_short_buffer_is_padded() {
        let rgba = yuv422_to_rgba(&[128, 128, 128, 128], 2, 2, 0, Yuv422Order::Yuyv);
        assert_eq!(rgba.len(), 16);
        assert_eq!(&rgba[8..], &[0, 0, 0, 255, 0, 0, 0, 255]);
    }

    #[test]
    fn test_row_padding_is_skipped() {
        // 2x2 frame, 8 bytes per line: 4 bytes of pixels then 4 bytes of padding
        let data = [
            128, 128, 128, 128, 9, 9, 9, 9, //
            255, 128, 0, 128, 9, 9, 9, 9,
        ];
        let rgba = yuv422_to_rgba(&data, 2, 2, 8, Yuv422Order::Yuyv);
        assert_eq!(rgba.len(), 16);
        assert_eq!(&rgba[..8], &[128, 128, 128, 255, 128, 128, 128, 255]);
        assert_eq!(&rgba[8..], &[255, 255, 255, 255, 0, 0, 0, 255]);
    }

    #[test]
    fn test_mjpeg_garbage_is_rejected() {
        assert!(mjpeg_to_rgba(&[0, 1, 2, 3], 2, 2).is_none());
    }

    #[test]
    fn test_supported_formats() {
        assert!(is_supported(FourCC::new(b"YUYV")));
        assert!(is_supported(FourCC::new(b"MJPG")));
        assert!(!is_supported(FourCC::new(b"Y10B")));
    }
}
