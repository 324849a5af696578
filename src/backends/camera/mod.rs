// SPDX-License-Identifier: GPL-3.0-only

//! Camera platform abstraction
//!
//! The session never talks to hardware directly. It goes through three traits
//! modelled on a platform media API:
//!
//! ```text
//! ┌─────────────────────┐
//! │   CaptureSession    │
//! └──────────┬──────────┘
//!            │ request_stream(constraints)
//!            ▼
//! ┌─────────────────────┐
//! │    MediaDevices     │  ← capability check, device negotiation
//! └──────────┬──────────┘
//!            │ grants
//!            ▼
//! ┌─────────────────────┐
//! │    MediaStream      │  ← metadata, playback, current frame
//! └──────────┬──────────┘
//!            │ owns
//!            ▼
//! ┌─────────────────────┐
//! │    MediaTrack(s)    │  ← stop / enable, holds the hardware
//! └─────────────────────┘
//! ```
//!
//! [`v4l2`] is the concrete Linux implementation.

pub mod format_converters;
pub mod frame_loop;
pub mod manager;
pub mod surface;
pub mod types;
pub mod v4l2;

pub use manager::StreamLifecycle;
pub use surface::PreviewSurface;
pub use types::*;

use std::future::Future;

/// Entry point to the platform's capture devices
pub trait MediaDevices: Send + Sync + 'static {
    /// Stream type granted by this platform
    type Stream: MediaStream;

    /// Whether the platform can capture video at all
    fn is_supported(&self) -> bool;

    /// Ask the platform for a video stream matching `constraints`
    ///
    /// May suspend indefinitely while the platform negotiates permission or
    /// hardware access. Dropping the returned future must not leak a grant.
    fn request_stream(
        &self,
        constraints: &DeviceConstraints,
    ) -> impl Future<Output = PlatformResult<Self::Stream>> + Send;
}

/// A granted live video feed
pub trait MediaStream: Send + Sync + 'static {
    /// Track type carried by this stream
    type Track: MediaTrack;

    /// Unique stream identifier (for logging)
    fn id(&self) -> &str;

    /// All tracks of the stream; video only in practice
    fn tracks(&self) -> &[Self::Track];

    /// Resolves once frame dimensions are known, or fails if the stream ends first
    fn loaded_metadata(&self) -> impl Future<Output = PlatformResult<FrameSize>> + Send;

    /// Start decoding into the rendering surface
    fn play(&self) -> impl Future<Output = PlatformResult<()>> + Send;

    /// Most recent decoded frame
    fn current_frame(&self) -> Option<CameraFrame>;

    /// Stop every track
    fn stop_all(&self) {
        for track in self.tracks() {
            track.stop();
        }
    }

    /// True while at least one track still holds the hardware
    fn is_live(&self) -> bool {
        self.tracks()
            .iter()
            .any(|track| track.ready_state() == TrackState::Live)
    }
}

/// A single media track; stopping it releases the underlying device
pub trait MediaTrack: Send + Sync {
    /// Human readable label (device name)
    fn label(&self) -> &str;

    /// Stop the track and release the hardware. Idempotent.
    fn stop(&self);

    /// Enable or disable frame delivery
    fn set_enabled(&self, enabled: bool);

    fn is_enabled(&self) -> bool;

    fn ready_state(&self) -> TrackState;
}
