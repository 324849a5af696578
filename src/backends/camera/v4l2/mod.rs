// SPDX-License-Identifier: GPL-3.0-only

//! Video4Linux2 implementation of the platform media traits
//!
//! Each granted stream runs one capture thread that owns the device node.
//! A request resolves only after the first frame has been dequeued, so a
//! device held by another process is reported as a failed request rather
//! than as a stream that never shows anything.

pub mod enumeration;
pub mod stream;

pub use enumeration::{VideoDevice, enumerate_devices};
pub use stream::{V4l2Stream, V4l2Track};

use super::frame_loop::CaptureLoopController;
use super::types::{DeviceConstraints, FailureReason, PlatformError, PlatformResult};
use super::MediaDevices;
use futures::channel::oneshot;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use stream::{PendingGrant, SharedFeed};
use tracing::info;

/// Default location of device nodes
const DEV_DIR: &str = "/dev";
/// Present whenever the kernel has V4L2 support loaded
const SYSFS_CLASS_DIR: &str = "/sys/class/video4linux";

/// V4L2 media device provider
#[derive(Debug, Clone)]
pub struct V4l2Devices {
    dev_dir: PathBuf,
    sysfs_dir: PathBuf,
}

impl V4l2Devices {
    pub fn new() -> Self {
        Self {
            dev_dir: PathBuf::from(DEV_DIR),
            sysfs_dir: PathBuf::from(SYSFS_CLASS_DIR),
        }
    }

    /// All usable capture devices
    pub fn devices(&self) -> Vec<VideoDevice> {
        enumerate_devices(&self.dev_dir)
    }
}

impl Default for V4l2Devices {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaDevices for V4l2Devices {
    type Stream = V4l2Stream;

    fn is_supported(&self) -> bool {
        self.sysfs_dir.is_dir()
    }

    fn request_stream(
        &self,
        constraints: &DeviceConstraints,
    ) -> impl Future<Output = PlatformResult<V4l2Stream>> + Send {
        let constraints = constraints.clone();
        let dev_dir = self.dev_dir.clone();

        async move {
            let devices = enumerate_devices(&dev_dir);
            let device = enumeration::select_device(&devices, &constraints)?.clone();

            info!(
                path = %device.path,
                card = %device.card,
                tier = %constraints.tier,
                "Requesting V4L2 stream"
            );

            let feed = Arc::new(SharedFeed::new());
            let (reply_tx, reply_rx) = oneshot::channel();

            let thread_feed = Arc::clone(&feed);
            let name = device.path.trim_start_matches("/dev/").to_string();
            let controller = CaptureLoopController::spawn(&name, move |stop| {
                stream::capture_thread(device, constraints, thread_feed, reply_tx, stop)
            })
            .map_err(|e| PlatformError::from_io(&e, "spawn capture thread"))?;

            // Dropping this future before the reply detaches the thread
            let pending = PendingGrant::new(controller);

            let grant = reply_rx.await.map_err(|_| {
                PlatformError::new(FailureReason::Aborted, "capture thread exited without reply")
            })??;

            let controller = pending.into_controller().ok_or_else(|| {
                PlatformError::new(FailureReason::Aborted, "capture thread lost")
            })?;

            Ok(V4l2Stream::new(grant, controller, feed))
        }
    }
}
