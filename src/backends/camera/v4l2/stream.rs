// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 capture thread and the stream/track handles built on it
//!
//! The capture thread owns the device and its mmap buffers for its whole
//! life. A track stops the thread; once the thread has returned the device
//! node is closed and another process may open it.

use super::enumeration::VideoDevice;
use crate::backends::camera::format_converters;
use crate::backends::camera::frame_loop::{CaptureLoopController, LoopAction, StopSignal};
use crate::backends::camera::types::{
    CameraFrame, ConstraintTier, DeviceConstraints, FailureReason, FrameSize, PlatformError,
    PlatformResult, TrackState,
};
use crate::backends::camera::{MediaStream, MediaTrack};
use crate::constants::timing;
use futures::channel::oneshot;
use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::{Format, FourCC};

/// Progress of the feed as seen by the stream handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    Starting,
    Running(FrameSize),
    Ended,
}

/// State shared between the capture thread and the handles
pub(super) struct SharedFeed {
    latest: Mutex<Option<CameraFrame>>,
    enabled: AtomicBool,
    status: watch::Sender<FeedStatus>,
}

impl SharedFeed {
    pub(super) fn new() -> Self {
        Self {
            latest: Mutex::new(None),
            enabled: AtomicBool::new(true),
            status: watch::Sender::new(FeedStatus::Starting),
        }
    }

    fn publish(&self, frame: CameraFrame) {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame);
    }

    fn latest(&self) -> Option<CameraFrame> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn clear(&self) {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn status(&self) -> FeedStatus {
        *self.status.borrow()
    }

    fn set_status(&self, status: FeedStatus) {
        self.status.send_replace(status);
    }
}

/// What the capture thread reports once the first frame arrived
pub(super) struct StreamGrant {
    pub label: String,
    pub size: FrameSize,
}

/// Choose and apply a capture format for the requested tier
fn negotiate_format(dev: &Device, constraints: &DeviceConstraints) -> PlatformResult<Format> {
    let current = dev
        .format()
        .map_err(|e| PlatformError::from_io(&e, "query format"))?;

    let size = match (constraints.tier, constraints.ideal_size) {
        (ConstraintTier::Preferred, Some(size)) => size,
        _ => {
            if format_converters::is_supported(current.fourcc) {
                return Ok(current);
            }
            FrameSize::new(current.width, current.height)
        }
    };

    let mut last_error = None;
    for fourcc in format_converters::SUPPORTED_FOURCCS {
        let requested = Format::new(size.width, size.height, FourCC::new(fourcc));
        match dev.set_format(&requested) {
            Ok(actual) if format_converters::is_supported(actual.fourcc) => {
                debug!(
                    requested = %size,
                    width = actual.width,
                    height = actual.height,
                    fourcc = ?actual.fourcc,
                    "Capture format negotiated"
                );
                return Ok(actual);
            }
            Ok(actual) => {
                debug!(fourcc = ?actual.fourcc, "Driver substituted an undecodable format");
            }
            Err(e) => last_error = Some(PlatformError::from_io(&e, "set format")),
        }
    }

    Err(last_error.unwrap_or_else(|| {
        PlatformError::new(
            FailureReason::Overconstrained,
            format!("no decodable format at {}", size),
        )
    }))
}

/// Convert a dequeued buffer into a frame
fn decode(format: &Format, buf: &[u8], used: usize) -> Option<CameraFrame> {
    let data = buf.get(..used).filter(|b| !b.is_empty()).unwrap_or(buf);
    let (width, height, rgba) = format_converters::to_rgba(
        format.fourcc,
        data,
        format.width,
        format.height,
        format.stride,
    )?;
    Some(CameraFrame::from_rgba(width, height, rgba))
}

/// What a failed dequeue means for the capture thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DequeueFailure {
    /// No frame within the poll interval
    Idle,
    /// The device node went away
    Gone,
    /// Anything else; worth another try
    Transient,
}

impl DequeueFailure {
    fn of(err: &io::Error) -> Self {
        if err.kind() == io::ErrorKind::TimedOut {
            DequeueFailure::Idle
        } else if err.raw_os_error() == Some(libc::ENODEV) {
            DequeueFailure::Gone
        } else {
            DequeueFailure::Transient
        }
    }
}

/// Body of the capture thread
///
/// Opens the device, waits for the first decodable frame, reports the grant
/// and then keeps the latest frame published until stopped. Any early
/// failure is reported through `reply` and closes the device.
pub(super) fn capture_thread(
    device: VideoDevice,
    constraints: DeviceConstraints,
    feed: Arc<SharedFeed>,
    reply: oneshot::Sender<PlatformResult<StreamGrant>>,
    stop: StopSignal,
) {
    let fail = |reply: oneshot::Sender<PlatformResult<StreamGrant>>, err: PlatformError| {
        debug!(path = %device.path, error = %err, "Stream request failed");
        feed.set_status(FeedStatus::Ended);
        let _ = reply.send(Err(err));
    };

    let dev = match Device::with_path(&device.path) {
        Ok(dev) => dev,
        Err(e) => return fail(reply, PlatformError::from_io(&e, &device.path)),
    };

    let format = match negotiate_format(&dev, &constraints) {
        Ok(format) => format,
        Err(e) => return fail(reply, e),
    };

    let mut stream = match MmapStream::with_buffers(&dev, Type::VideoCapture, 4) {
        Ok(stream) => stream,
        Err(e) => return fail(reply, PlatformError::from_io(&e, "map buffers")),
    };
    // Bounded dequeues keep the stop signal and the deadline below responsive
    stream.set_timeout(timing::DEQUEUE_POLL_INTERVAL);

    // The first dequeue starts streaming; a locked device fails here
    let deadline = Instant::now() + timing::FIRST_FRAME_TIMEOUT;
    let first = loop {
        if stop.is_set() {
            return fail(
                reply,
                PlatformError::new(FailureReason::Aborted, "capture stopped before first frame"),
            );
        }
        match stream.next() {
            Ok((buf, meta)) => {
                if let Some(frame) = decode(&format, buf, meta.bytesused as usize) {
                    break frame;
                }
            }
            Err(e) if DequeueFailure::of(&e) == DequeueFailure::Idle => {}
            Err(e) => return fail(reply, PlatformError::from_io(&e, "start streaming")),
        }
        if Instant::now() >= deadline {
            return fail(
                reply,
                PlatformError::new(FailureReason::TrackStart, "no decodable frame before timeout"),
            );
        }
    };

    let size = first.size();
    feed.publish(first);
    feed.set_status(FeedStatus::Running(size));

    let grant = StreamGrant {
        label: device.card.clone(),
        size,
    };
    if reply.send(Ok(grant)).is_err() {
        // Requester went away; closing the device is the whole cleanup
        info!(path = %device.path, "Stream request abandoned, releasing device");
        feed.set_status(FeedStatus::Ended);
        return;
    }

    info!(path = %device.path, %size, fourcc = ?format.fourcc, "Streaming started");

    stop.run_until_stopped(|| match stream.next() {
        Ok((buf, meta)) => {
            if feed.enabled.load(Ordering::SeqCst)
                && let Some(frame) = decode(&format, buf, meta.bytesused as usize)
            {
                feed.publish(frame);
            }
            LoopAction::Continue
        }
        Err(e) => match DequeueFailure::of(&e) {
            DequeueFailure::Idle => LoopAction::Continue,
            DequeueFailure::Gone => {
                warn!(path = %device.path, "Device disappeared");
                LoopAction::Stop
            }
            DequeueFailure::Transient => {
                warn!(error = %e, "Failed to dequeue frame");
                std::thread::sleep(timing::DEQUEUE_ERROR_BACKOFF);
                LoopAction::Continue
            }
        },
    });

    feed.set_status(FeedStatus::Ended);
    debug!(path = %device.path, "Capture thread closing device");
}

/// Holds the capture thread while the grant is pending
///
/// If the request future is dropped the thread is told to stop and finishes
/// on its own, closing the device without blocking the caller.
pub(super) struct PendingGrant(Option<CaptureLoopController>);

impl PendingGrant {
    pub(super) fn new(controller: CaptureLoopController) -> Self {
        Self(Some(controller))
    }

    pub(super) fn into_controller(mut self) -> Option<CaptureLoopController> {
        self.0.take()
    }
}

impl Drop for PendingGrant {
    fn drop(&mut self) {
        if let Some(controller) = self.0.take() {
            controller.detach();
        }
    }
}

/// Video track backed by one capture thread
pub struct V4l2Track {
    label: String,
    controller: Mutex<Option<CaptureLoopController>>,
    feed: Arc<SharedFeed>,
}

impl MediaTrack for V4l2Track {
    fn label(&self) -> &str {
        &self.label
    }

    fn stop(&self) {
        let controller = self
            .controller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut controller) = controller {
            controller.stop();
            info!(label = %self.label, "Track stopped");
        }
        self.feed.set_status(FeedStatus::Ended);
        self.feed.clear();
    }

    fn set_enabled(&self, enabled: bool) {
        self.feed.enabled.store(enabled, Ordering::SeqCst);
    }

    fn is_enabled(&self) -> bool {
        self.feed.enabled.load(Ordering::SeqCst)
    }

    fn ready_state(&self) -> TrackState {
        let has_thread = self
            .controller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some();
        if has_thread && self.feed.status() != FeedStatus::Ended {
            TrackState::Live
        } else {
            TrackState::Ended
        }
    }
}

/// A granted V4L2 video stream
pub struct V4l2Stream {
    id: String,
    tracks: Vec<V4l2Track>,
    feed: Arc<SharedFeed>,
}

impl V4l2Stream {
    pub(super) fn new(
        grant: StreamGrant,
        controller: CaptureLoopController,
        feed: Arc<SharedFeed>,
    ) -> Self {
        let track = V4l2Track {
            label: grant.label,
            controller: Mutex::new(Some(controller)),
            feed: Arc::clone(&feed),
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tracks: vec![track],
            feed,
        }
    }
}

impl MediaStream for V4l2Stream {
    type Track = V4l2Track;

    fn id(&self) -> &str {
        &self.id
    }

    fn tracks(&self) -> &[V4l2Track] {
        &self.tracks
    }

    fn loaded_metadata(&self) -> impl Future<Output = PlatformResult<FrameSize>> + Send {
        let mut status = self.feed.status.subscribe();
        async move {
            let settled = match status
                .wait_for(|s| !matches!(s, FeedStatus::Starting))
                .await
            {
                Ok(s) => *s,
                Err(_) => FeedStatus::Ended,
            };
            match settled {
                FeedStatus::Running(size) => Ok(size),
                _ => Err(PlatformError::new(
                    FailureReason::Ended,
                    "stream ended before metadata loaded",
                )),
            }
        }
    }

    fn play(&self) -> impl Future<Output = PlatformResult<()>> + Send {
        let feed = Arc::clone(&self.feed);
        async move {
            if feed.status() == FeedStatus::Ended {
                return Err(PlatformError::new(FailureReason::Ended, "stream has ended"));
            }
            feed.enabled.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    fn current_frame(&self) -> Option<CameraFrame> {
        if !self.feed.enabled.load(Ordering::SeqCst) {
            return None;
        }
        self.feed.latest()
    }
}

impl std::fmt::Debug for V4l2Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("V4l2Stream")
            .field("id", &self.id)
            .field("status", &self.feed.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_metadata_fails_when_feed_ends_first() {
        let feed = Arc::new(SharedFeed::new());
        let stream = V4l2Stream {
            id: "test".to_string(),
            tracks: Vec::new(),
            feed: Arc::clone(&feed),
        };

        let pending = stream.loaded_metadata();
        feed.set_status(FeedStatus::Ended);
        let err = pending.await.unwrap_err();
        assert_eq!(err.reason, FailureReason::Ended);
    }

    #[tokio::test]
    async fn test_metadata_resolves_when_running() {
        let feed = Arc::new(SharedFeed::new());
        let stream = V4l2Stream {
            id: "test".to_string(),
            tracks: Vec::new(),
            feed: Arc::clone(&feed),
        };

        feed.set_status(FeedStatus::Running(FrameSize::new(640, 480)));
        assert_eq!(stream.loaded_metadata().await.unwrap(), FrameSize::new(640, 480));
        assert!(stream.play().await.is_ok());
    }

    #[test]
    fn test_dequeue_timeout_is_idle() {
        // What MmapStream returns when the poll interval passes without a frame
        let timeout = io::Error::new(io::ErrorKind::TimedOut, "VIDIOC_DQBUF");
        assert_eq!(DequeueFailure::of(&timeout), DequeueFailure::Idle);

        let gone = io::Error::from_raw_os_error(libc::ENODEV);
        assert_eq!(DequeueFailure::of(&gone), DequeueFailure::Gone);

        let again = io::Error::from_raw_os_error(libc::EIO);
        assert_eq!(DequeueFailure::of(&again), DequeueFailure::Transient);
    }

    #[test]
    fn test_disabled_feed_hides_frames() {
        let feed = Arc::new(SharedFeed::new());
        feed.publish(CameraFrame::from_rgba(1, 1, vec![1, 2, 3, 255]));
        let stream = V4l2Stream {
            id: "test".to_string(),
            tracks: Vec::new(),
            feed: Arc::clone(&feed),
        };
        assert!(stream.current_frame().is_some());

        feed.enabled.store(false, Ordering::SeqCst);
        assert!(stream.current_frame().is_none());
    }
}
