// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Session timing constants
pub mod timing {
    use super::Duration;

    /// Pause before a fallback request so a previous consumer can let go of the device
    pub const RETRY_GRACE_DELAY: Duration = Duration::from_millis(1000);

    /// Pause between the capture action and the frame grab (flash animation)
    pub const CAPTURE_SETTLE_DELAY: Duration = Duration::from_millis(100);

    /// How long a V4L2 track waits for its first frame before giving up
    pub const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(5);

    /// Longest a capture thread blocks in one dequeue before checking its stop signal
    pub const DEQUEUE_POLL_INTERVAL: Duration = Duration::from_millis(100);

    /// Back-off after a failed dequeue inside a capture thread
    pub const DEQUEUE_ERROR_BACKOFF: Duration = Duration::from_millis(10);
}

/// Preferred capture geometry for the first (tier 1) request
pub mod resolution {
    /// Ideal frame width
    pub const IDEAL_WIDTH: u32 = 1280;

    /// Ideal frame height
    pub const IDEAL_HEIGHT: u32 = 720;
}

/// Encoding parameters for captured stills
pub mod encoding {
    /// JPEG quality factor (0.0 - 1.0), favoring size over fidelity
    pub const JPEG_QUALITY: f32 = 0.85;

    /// MIME type of every captured image
    pub const CAPTURE_MIME: &str = "image/jpeg";

    /// Extension used when captured images are written to disk
    pub const CAPTURE_EXTENSION: &str = "jpg";

    /// Convert a 0.0 - 1.0 quality factor into the 1 - 100 scale JPEG encoders use
    pub fn jpeg_quality_percent(quality: f32) -> u8 {
        (quality.clamp(0.01, 1.0) * 100.0).round() as u8
    }
}

/// Supported file formats for the upload bypass
pub mod file_formats {
    /// Supported image file extensions
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

    /// Check if a file extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

/// Application information utilities
pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}
