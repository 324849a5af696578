// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Which way the requested camera should face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FacingMode {
    /// Selfie camera, facing the user
    #[default]
    User,
    /// Rear camera, facing away from the user
    Environment,
}

impl std::fmt::Display for FacingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FacingMode::User => write!(f, "user"),
            FacingMode::Environment => write!(f, "environment"),
        }
    }
}

/// Named set of acquisition preferences, ordered from most to least specific
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintTier {
    /// Tier 1: front-facing camera at the ideal resolution
    Preferred,
    /// Tier 2: any camera, no resolution preference
    Fallback,
}

impl ConstraintTier {
    /// First attempts use the preferred tier, retries relax to the fallback tier
    pub fn for_attempt(is_retry: bool) -> Self {
        if is_retry {
            ConstraintTier::Fallback
        } else {
            ConstraintTier::Preferred
        }
    }
}

impl std::fmt::Display for ConstraintTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstraintTier::Preferred => write!(f, "preferred"),
            ConstraintTier::Fallback => write!(f, "fallback"),
        }
    }
}

/// Frame dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for FrameSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Request descriptor handed to the platform for one acquisition attempt
///
/// Video only; audio is never requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConstraints {
    pub tier: ConstraintTier,
    /// Preferred facing direction (`None` = any camera)
    pub facing: Option<FacingMode>,
    /// Ideal resolution; the platform picks the closest it can deliver
    pub ideal_size: Option<FrameSize>,
    /// Explicit device to open, bypassing selection
    pub device_path: Option<String>,
}

impl DeviceConstraints {
    /// Tier 1 constraints
    pub fn preferred(facing: FacingMode, ideal_size: FrameSize) -> Self {
        Self {
            tier: ConstraintTier::Preferred,
            facing: Some(facing),
            ideal_size: Some(ideal_size),
            device_path: None,
        }
    }

    /// Tier 2 constraints
    pub fn fallback() -> Self {
        Self {
            tier: ConstraintTier::Fallback,
            facing: None,
            ideal_size: None,
            device_path: None,
        }
    }

    /// Pin the request to one device node
    pub fn with_device_path(mut self, path: Option<String>) -> Self {
        self.device_path = path;
        self
    }
}

/// A single decoded frame from the live feed, always RGBA
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    /// RGBA pixels, `stride` bytes per row
    pub data: Arc<[u8]>,
    /// Row stride in bytes (may include padding)
    pub stride: u32,
    /// Timestamp when frame was captured
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Build a tightly packed RGBA frame
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data: Arc::from(data.into_boxed_slice()),
            stride: width * 4,
            captured_at: Instant::now(),
        }
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }

    /// RGBA bytes of pixel (x, y), if in bounds
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = y as usize * self.stride as usize + x as usize * 4;
        let px = self.data.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

/// Lifecycle state of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    /// Delivering (or about to deliver) frames
    Live,
    /// Stopped; the hardware has been released
    Ended,
}

/// Platform-reported reason for a failed stream request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Hardware could not be read (typically locked by another process)
    NotReadable,
    /// The track could not be started
    TrackStart,
    /// The user or the system refused access
    NotAllowed,
    /// Legacy name for `NotAllowed`
    PermissionDenied,
    /// No device satisfies the request
    NotFound,
    /// Legacy name for `NotFound`
    DevicesNotFound,
    /// The constraints cannot be satisfied by any device
    Overconstrained,
    /// The request was aborted
    Aborted,
    /// The stream ended before it produced any frame
    Ended,
    /// Anything else, with the platform's own name
    Other(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::NotReadable => write!(f, "NotReadableError"),
            FailureReason::TrackStart => write!(f, "TrackStartError"),
            FailureReason::NotAllowed => write!(f, "NotAllowedError"),
            FailureReason::PermissionDenied => write!(f, "PermissionDeniedError"),
            FailureReason::NotFound => write!(f, "NotFoundError"),
            FailureReason::DevicesNotFound => write!(f, "DevicesNotFoundError"),
            FailureReason::Overconstrained => write!(f, "OverconstrainedError"),
            FailureReason::Aborted => write!(f, "AbortError"),
            FailureReason::Ended => write!(f, "EndedError"),
            FailureReason::Other(name) => write!(f, "{}", name),
        }
    }
}

/// Error reported by the platform media layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformError {
    pub reason: FailureReason,
    pub message: String,
}

impl PlatformError {
    pub fn new(reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }

    /// Map an OS error from a device node onto a platform reason
    pub fn from_io(err: &std::io::Error, context: &str) -> Self {
        let reason = match err.raw_os_error() {
            Some(libc::EBUSY) => FailureReason::NotReadable,
            Some(libc::EACCES) | Some(libc::EPERM) => FailureReason::NotAllowed,
            Some(libc::ENOENT) | Some(libc::ENODEV) | Some(libc::ENXIO) => {
                FailureReason::NotFound
            }
            Some(libc::EINVAL) => FailureReason::Overconstrained,
            Some(libc::EIO) => FailureReason::TrackStart,
            _ => match err.kind() {
                std::io::ErrorKind::PermissionDenied => FailureReason::NotAllowed,
                std::io::ErrorKind::NotFound => FailureReason::NotFound,
                _ => FailureReason::Other("IoError".to_string()),
            },
        };
        Self::new(reason, format!("{}: {}", context, err))
    }
}

impl std::fmt::Display for PlatformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.reason, self.message)
    }
}

impl std::error::Error for PlatformError {}

/// Failure classes that drive retry policy and the user-facing message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The platform has no camera capability at all
    Unsupported,
    /// Device locked or in use by another process
    Busy,
    /// Access refused
    PermissionDenied,
    /// No camera attached
    NotFound,
    /// Anything else
    Other,
}

impl ErrorKind {
    /// Classify a platform failure
    pub fn classify(err: &PlatformError) -> Self {
        match err.reason {
            FailureReason::NotReadable | FailureReason::TrackStart => ErrorKind::Busy,
            FailureReason::NotAllowed | FailureReason::PermissionDenied => {
                ErrorKind::PermissionDenied
            }
            FailureReason::NotFound | FailureReason::DevicesNotFound => ErrorKind::NotFound,
            _ => ErrorKind::Other,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Unsupported => write!(f, "unsupported"),
            ErrorKind::Busy => write!(f, "busy"),
            ErrorKind::PermissionDenied => write!(f, "permission denied"),
            ErrorKind::NotFound => write!(f, "not found"),
            ErrorKind::Other => write!(f, "other"),
        }
    }
}

/// A negotiation failure after classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    /// The platform error this was classified from (`None` for `Unsupported`)
    pub source: Option<PlatformError>,
}

impl ClassifiedError {
    pub fn unsupported() -> Self {
        Self {
            kind: ErrorKind::Unsupported,
            source: None,
        }
    }
}

impl From<PlatformError> for ClassifiedError {
    fn from(err: PlatformError) -> Self {
        Self {
            kind: ErrorKind::classify(&err),
            source: Some(err),
        }
    }
}

impl std::fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{} ({})", self.kind, source),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for ClassifiedError {}

/// Transient record of one negotiation attempt, used for logging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionAttempt {
    pub tier: ConstraintTier,
    pub is_retry: bool,
    /// Set once the attempt failed
    pub classification: Option<ErrorKind>,
}

impl AcquisitionAttempt {
    pub fn new(is_retry: bool) -> Self {
        Self {
            tier: ConstraintTier::for_attempt(is_retry),
            is_retry,
            classification: None,
        }
    }

    /// Record how the attempt failed
    pub fn failed(mut self, kind: ErrorKind) -> Self {
        self.classification = Some(kind);
        self
    }
}

/// Result type for platform operations
pub type PlatformResult<T> = Result<T, PlatformError>;
