// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 device discovery and selection

use crate::backends::camera::format_converters;
use crate::backends::camera::types::{
    DeviceConstraints, FacingMode, FailureReason, PlatformError, PlatformResult,
};
use serde::Serialize;
use std::path::Path;
use tracing::debug;
use v4l::capability::Flags;
use v4l::prelude::*;
use v4l::video::Capture;

/// A video capture node found under `/dev`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoDevice {
    /// Device node, e.g. `/dev/video0`
    pub path: String,
    /// Card name reported by the driver
    pub card: String,
    pub driver: String,
    pub bus: String,
    /// Facing direction guessed from the card name (`None` = unknown)
    pub facing: Option<FacingMode>,
    /// Decodable formats the device offers, as FourCC strings
    pub formats: Vec<String>,
}

/// Card name fragments of cameras built into a laptop or phone bezel
const USER_FACING_HINTS: &[&str] = &["front", "integrated", "facetime", "user", "built-in"];
/// Card name fragments of world-facing cameras
const ENVIRONMENT_FACING_HINTS: &[&str] = &["back", "rear", "world", "environment"];

/// Guess which way a camera faces from its card name
pub fn infer_facing(card: &str) -> Option<FacingMode> {
    let card = card.to_lowercase();
    if USER_FACING_HINTS.iter().any(|hint| card.contains(hint)) {
        Some(FacingMode::User)
    } else if ENVIRONMENT_FACING_HINTS.iter().any(|hint| card.contains(hint)) {
        Some(FacingMode::Environment)
    } else {
        None
    }
}

/// Numeric index of a `/dev/videoN` node, for stable ordering
fn node_index(path: &str) -> u32 {
    path.rsplit("video")
        .next()
        .and_then(|n| n.parse().ok())
        .unwrap_or(u32::MAX)
}

/// Query one device node; `None` if it is not a usable capture device
pub fn inspect_device(path: &str) -> Option<VideoDevice> {
    let dev = Device::with_path(path).ok()?;
    let caps = dev.query_caps().ok()?;

    if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
        debug!(path, card = %caps.card, "Skipping non-capture node");
        return None;
    }

    let formats: Vec<String> = dev
        .enum_formats()
        .into_iter()
        .flatten()
        .filter(|desc| format_converters::is_supported(desc.fourcc))
        .filter_map(|desc| desc.fourcc.str().ok().map(str::to_string))
        .collect();

    if formats.is_empty() {
        debug!(path, card = %caps.card, "Skipping node without decodable formats");
        return None;
    }

    let facing = infer_facing(&caps.card);
    debug!(path, card = %caps.card, driver = %caps.driver, ?facing, ?formats, "Found capture device");

    Some(VideoDevice {
        path: path.to_string(),
        card: caps.card,
        driver: caps.driver,
        bus: caps.bus,
        facing,
        formats,
    })
}

/// Enumerate every capture device under `dev_dir`, ordered by node index
pub fn enumerate_devices(dev_dir: &Path) -> Vec<VideoDevice> {
    let mut paths: Vec<String> = std::fs::read_dir(dev_dir)
        .into_iter()
        .flatten()
        .flatten()
        .filter(|e| {
            e.file_name()
                .to_str()
                .map(|n| n.starts_with("video"))
                .unwrap_or(false)
        })
        .map(|e| e.path().to_string_lossy().to_string())
        .collect();
    paths.sort_by_key(|p| node_index(p));

    paths.iter().filter_map(|p| inspect_device(p)).collect()
}

/// Pick the device that best satisfies `constraints`
///
/// An explicit device path always wins. Otherwise a requested facing mode is
/// treated as a preference: matching cameras first, then cameras of unknown
/// facing, then the rest. Without a preference the first device is used.
pub fn select_device<'a>(
    devices: &'a [VideoDevice],
    constraints: &DeviceConstraints,
) -> PlatformResult<&'a VideoDevice> {
    if let Some(path) = constraints.device_path.as_deref() {
        return devices.iter().find(|d| d.path == path).ok_or_else(|| {
            PlatformError::new(
                FailureReason::NotFound,
                format!("{} is not a usable capture device", path),
            )
        });
    }

    let rank = |device: &VideoDevice| match (constraints.facing, device.facing) {
        (Some(wanted), Some(actual)) if wanted == actual => 0,
        (Some(_), None) => 1,
        (Some(_), Some(_)) => 2,
        (None, _) => 0,
    };

    devices
        .iter()
        .enumerate()
        .min_by_key(|(index, device)| (rank(device), *index))
        .map(|(_, device)| device)
        .ok_or_else(|| {
            PlatformError::new(FailureReason::NotFound, "no video capture device present")
        })
}
