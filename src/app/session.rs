// SPDX-License-Identifier: GPL-3.0-only

//! The capture session: negotiation, retry, capture and teardown
//!
//! A session lives from mount to unmount. It negotiates a stream through the
//! platform, hands it to the lifecycle manager, publishes a
//! [`SessionSnapshot`] on every observable change and forwards the captured
//! image to the host.
//!
//! Negotiation failures never escape as errors; they become
//! [`AcquisitionState::Error`]. Every continuation re-checks the session token
//! before it changes state, and hardware is released on every exit path.

use super::host::ScreenHost;
use super::lifetime::SessionToken;
use super::retry::RetryBudget;
use super::state::{AcquisitionState, RenderContract, SessionSnapshot};
use crate::backends::camera::types::{
    AcquisitionAttempt, ClassifiedError, ConstraintTier, DeviceConstraints, ErrorKind, FacingMode,
    FrameSize,
};
use crate::backends::camera::{MediaDevices, MediaStream, MediaTrack, StreamLifecycle};
use crate::config::Config;
use crate::constants::{encoding, resolution, timing};
use crate::errors::PhotoError;
use crate::i18n;
use crate::pipelines::photo::{CapturedImage, PhotoEncoder, PhotoPipeline};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Knobs of a session, usually taken from [`Config`]
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub facing: FacingMode,
    pub ideal_size: FrameSize,
    pub device_path: Option<String>,
    pub retry_grace: Duration,
    pub capture_settle: Duration,
    pub jpeg_quality: f32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            facing: FacingMode::User,
            ideal_size: FrameSize::new(resolution::IDEAL_WIDTH, resolution::IDEAL_HEIGHT),
            device_path: None,
            retry_grace: timing::RETRY_GRACE_DELAY,
            capture_settle: timing::CAPTURE_SETTLE_DELAY,
            jpeg_quality: encoding::JPEG_QUALITY,
        }
    }
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            facing: config.facing,
            ideal_size: config.ideal_size(),
            device_path: config.device_path.clone(),
            retry_grace: config.retry_grace_delay(),
            capture_settle: config.capture_settle_delay(),
            jpeg_quality: config.jpeg_quality,
        }
    }
}

/// Why an attempt did not end in `Ready`
enum AttemptFailure {
    /// Session ended or moved on; nothing to report
    Abandoned,
    /// Classified platform failure, subject to the retry policy
    Failed(ClassifiedError),
}

impl From<ClassifiedError> for AttemptFailure {
    fn from(err: ClassifiedError) -> Self {
        AttemptFailure::Failed(err)
    }
}

struct SessionInner<D: MediaDevices, H> {
    devices: D,
    host: H,
    settings: SessionSettings,
    lifecycle: StreamLifecycle<D::Stream>,
    token: SessionToken,
    retry: RetryBudget,
    pipeline: PhotoPipeline,
    snapshot: watch::Sender<SessionSnapshot>,
    started: AtomicBool,
}

impl<D: MediaDevices, H> Drop for SessionInner<D, H> {
    fn drop(&mut self) {
        self.token.cancel();
        self.lifecycle.teardown_all();
    }
}

/// A mounted capture screen
///
/// Cheap to clone; all clones drive the same session.
pub struct CaptureSession<D: MediaDevices, H: ScreenHost> {
    inner: Arc<SessionInner<D, H>>,
}

impl<D: MediaDevices, H: ScreenHost> Clone for CaptureSession<D, H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: MediaDevices, H: ScreenHost> CaptureSession<D, H> {
    /// Mount a session in `Loading` with a fresh retry budget
    ///
    /// Nothing touches the camera until [`CaptureSession::start`].
    pub fn mount(devices: D, host: H, settings: SessionSettings) -> Self {
        let pipeline = PhotoPipeline::new(PhotoEncoder::with_quality(settings.jpeg_quality));

        info!(
            facing = %settings.facing,
            ideal = %settings.ideal_size,
            "Capture session mounted"
        );

        Self {
            inner: Arc::new(SessionInner {
                devices,
                host,
                settings,
                lifecycle: StreamLifecycle::new(),
                token: SessionToken::new(),
                retry: RetryBudget::new(),
                pipeline,
                snapshot: watch::Sender::new(SessionSnapshot::default()),
                started: AtomicBool::new(false),
            }),
        }
    }

    /// Run the initial negotiation. Only the first call does anything.
    pub async fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            debug!("Session already started");
            return;
        }
        self.negotiate(false).await;
    }

    /// Manual retry from the error screen
    ///
    /// Resets the retry budget and negotiates with fallback constraints.
    /// Returns false (and does nothing) outside the `Error` state.
    pub async fn retry(&self) -> bool {
        let accepted = self.inner.snapshot.send_if_modified(|snap| {
            if snap.state.is_error() {
                snap.state = AcquisitionState::Loading;
                snap.flashing = false;
                true
            } else {
                false
            }
        });
        if !accepted {
            debug!("Manual retry ignored outside the error state");
            return false;
        }

        info!("Manual retry requested");
        self.inner.retry.reset();
        self.negotiate(true).await;
        true
    }

    /// Capture a still from the live feed and hand it to the host
    ///
    /// Only valid in `Ready`. Shows the flash for the settle delay, grabs the
    /// current frame, releases the stream, then encodes the mirrored frame
    /// and calls `on_capture`.
    pub async fn capture(&self) -> Result<(), PhotoError> {
        let inner = &self.inner;
        let accepted = inner.snapshot.send_if_modified(|snap| {
            if snap.state.is_ready() && !snap.flashing {
                snap.flashing = true;
                true
            } else {
                false
            }
        });
        if !accepted {
            debug!(state = %self.state(), "Capture rejected, not ready");
            return Err(PhotoError::NotReady);
        }

        if !inner.token.sleep(inner.settings.capture_settle).await || self.state().is_final() {
            debug!("Session ended during capture settle");
            return Err(PhotoError::Cancelled);
        }

        let Some((natural, frame)) = inner.lifecycle.read_surface() else {
            if self.state().is_final() {
                return Err(PhotoError::Cancelled);
            }
            // The feed died under a Ready screen
            warn!("No frame on the surface at capture time");
            inner.lifecycle.release();
            self.fail(ErrorKind::Other);
            return Err(PhotoError::NoFrameAvailable);
        };

        inner.lifecycle.release();

        let image = match inner.pipeline.from_frame(frame, natural).await {
            Ok(image) => image,
            Err(e) => {
                warn!(error = %e, "Capture encoding failed");
                self.fail(ErrorKind::Other);
                return Err(e);
            }
        };

        self.deliver(image)
    }

    /// File-selection bypass from raw bytes
    ///
    /// Decodes any supported image, re-encodes it as a capture, releases the
    /// stream and calls `on_capture`. No negotiation happens.
    pub async fn upload_bytes(&self, bytes: Vec<u8>) -> Result<(), PhotoError> {
        let state = self.state();
        if state.is_final() {
            debug!(%state, "Upload rejected");
            return Err(match state {
                AcquisitionState::Captured => PhotoError::NotReady,
                _ => PhotoError::Cancelled,
            });
        }

        let image = self.inner.pipeline.from_upload(bytes).await?;
        if self.inner.token.is_cancelled() {
            return Err(PhotoError::Cancelled);
        }

        self.inner.lifecycle.release();
        info!(bytes = image.data.len(), "Uploaded image accepted");
        self.deliver(image)
    }

    /// File-selection bypass from a path
    pub async fn upload_file(&self, path: &Path) -> Result<(), PhotoError> {
        let bytes = crate::pipelines::photo::upload::read_file(path).await?;
        self.upload_bytes(bytes).await
    }

    /// User backed out: stop negotiating, release the camera and tell the host
    ///
    /// Moves to `Cancelled` first, so a grant still in flight is stopped
    /// instead of installed and a pending capture is abandoned.
    pub fn back(&self) {
        info!("Back requested");
        self.update(|snap| {
            snap.state = AcquisitionState::Cancelled;
            snap.flashing = false;
        });
        self.inner.lifecycle.release();
        self.inner.host.on_back();
    }

    /// End the session. Idempotent.
    ///
    /// Cancels the token, releases every stream and closes the lifecycle
    /// manager so a grant still in flight is stopped when it lands.
    pub fn unmount(&self) {
        let inner = &self.inner;
        inner.token.cancel();
        inner.lifecycle.teardown_all();
        let changed = inner.snapshot.send_if_modified(|snap| {
            let changed = snap.state != AcquisitionState::Unmounted || snap.flashing;
            snap.state = AcquisitionState::Unmounted;
            snap.flashing = false;
            changed
        });
        if changed {
            info!("Capture session unmounted");
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    pub fn state(&self) -> AcquisitionState {
        self.inner.snapshot.borrow().state.clone()
    }

    /// Render contract for the current snapshot
    pub fn render(&self) -> RenderContract {
        self.snapshot().render()
    }

    /// Watch every snapshot change
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshot.subscribe()
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.inner.settings
    }

    /// Whether a stream is currently installed
    pub fn has_active_stream(&self) -> bool {
        self.inner.lifecycle.is_active()
    }

    /// Streams installed over the session's life
    pub fn install_count(&self) -> u64 {
        self.inner.lifecycle.install_count()
    }

    pub fn is_mounted(&self) -> bool {
        !self.inner.token.is_cancelled()
    }

    /// Apply `f` unless the state is final; returns whether it was applied
    fn update(&self, f: impl FnOnce(&mut SessionSnapshot)) -> bool {
        if self.inner.token.is_cancelled() {
            return false;
        }
        let mut applied = false;
        self.inner.snapshot.send_if_modified(|snap| {
            if snap.state.is_final() {
                return false;
            }
            let before = snap.clone();
            f(snap);
            applied = true;
            *snap != before
        });
        applied
    }

    /// Settle in `Error` with the message for `kind`
    fn fail(&self, kind: ErrorKind) {
        let message = i18n::error_message(kind);
        self.update(|snap| {
            snap.state = AcquisitionState::Error { kind, message };
            snap.flashing = false;
        });
    }

    /// Move to `Captured` and hand the image over
    fn deliver(&self, image: CapturedImage) -> Result<(), PhotoError> {
        if self.inner.token.is_cancelled() {
            return Err(PhotoError::Cancelled);
        }
        let delivered = self.update(|snap| {
            snap.state = AcquisitionState::Captured;
            snap.flashing = false;
        });
        if !delivered {
            return Err(match self.state() {
                AcquisitionState::Captured => PhotoError::NotReady,
                _ => PhotoError::Cancelled,
            });
        }

        info!(bytes = image.data.len(), "Delivering captured image");
        self.inner.host.on_capture(image);
        Ok(())
    }

    /// Negotiation loop: attempt, classify, maybe retry once, settle
    async fn negotiate(&self, mut is_retry: bool) {
        loop {
            if !self.update(|snap| {
                snap.state = AcquisitionState::Loading;
                snap.flashing = false;
            }) {
                return;
            }

            let attempt = AcquisitionAttempt::new(is_retry);
            let outcome = self.attempt(&attempt).await;
            match outcome {
                Ok(()) => return,
                Err(AttemptFailure::Abandoned) => {
                    debug!(tier = %attempt.tier, "Attempt abandoned");
                    return;
                }
                Err(AttemptFailure::Failed(err)) => {
                    let attempt = attempt.failed(err.kind);
                    warn!(
                        tier = %attempt.tier,
                        is_retry = attempt.is_retry,
                        kind = %err.kind,
                        error = %err,
                        "Camera acquisition failed"
                    );

                    if self.inner.token.is_cancelled() {
                        return;
                    }

                    if self.inner.retry.try_consume(&attempt) {
                        info!(kind = %err.kind, "Retrying with fallback constraints");
                        is_retry = true;
                        continue;
                    }

                    self.fail(err.kind);
                    return;
                }
            }
        }
    }

    fn constraints_for(&self, tier: ConstraintTier) -> DeviceConstraints {
        let settings = &self.inner.settings;
        let constraints = match tier {
            ConstraintTier::Preferred => {
                DeviceConstraints::preferred(settings.facing, settings.ideal_size)
            }
            ConstraintTier::Fallback => DeviceConstraints::fallback(),
        };
        constraints.with_device_path(settings.device_path.clone())
    }

    /// One acquisition attempt, ending in `Ready` on success
    async fn attempt(&self, attempt: &AcquisitionAttempt) -> Result<(), AttemptFailure> {
        let inner = &self.inner;

        inner.lifecycle.release();

        if attempt.is_retry && !inner.token.sleep(inner.settings.retry_grace).await {
            return Err(AttemptFailure::Abandoned);
        }

        if !inner.devices.is_supported() {
            return Err(ClassifiedError::unsupported().into());
        }

        let constraints = self.constraints_for(attempt.tier);
        info!(tier = %attempt.tier, is_retry = attempt.is_retry, "Requesting camera");

        // No timeout here: permission prompts may take as long as the user needs
        let stream = inner
            .devices
            .request_stream(&constraints)
            .await
            .map_err(ClassifiedError::from)?;

        if inner.token.is_cancelled() || self.state().is_final() {
            stream.stop_all();
            info!(stream = stream.id(), "Grant arrived after session moved on, stopped");
            return Err(AttemptFailure::Abandoned);
        }

        let Some(stream) = inner.lifecycle.install(stream) else {
            return Err(AttemptFailure::Abandoned);
        };
        if self.state().is_final() {
            // back() ran between the check above and the install
            inner.lifecycle.release();
            return Err(AttemptFailure::Abandoned);
        }

        let size = match inner.token.run_until_cancelled(stream.loaded_metadata()).await {
            None => return Err(AttemptFailure::Abandoned),
            Some(Ok(size)) => size,
            Some(Err(e)) => {
                if inner.lifecycle.is_current(&stream) {
                    inner.lifecycle.release();
                }
                return Err(ClassifiedError::from(e).into());
            }
        };

        if !inner.lifecycle.mark_metadata(&stream, size) {
            // Released by back() or a capture in the meantime
            return Err(AttemptFailure::Abandoned);
        }
        debug!(stream = stream.id(), %size, "Metadata loaded");

        let playing = match inner.token.run_until_cancelled(stream.play()).await {
            None => return Err(AttemptFailure::Abandoned),
            Some(Ok(())) => inner.lifecycle.mark_playing(&stream),
            Some(Err(e)) => {
                // Autoplay refusal and similar glitches still leave a live feed
                warn!(error = %e, "Playback failed to start, treating stream as ready");
                false
            }
        };

        if !inner.lifecycle.is_current(&stream) {
            return Err(AttemptFailure::Abandoned);
        }

        let ready = self.update(|snap| snap.state = AcquisitionState::Ready);
        if !ready {
            inner.lifecycle.release();
            return Err(AttemptFailure::Abandoned);
        }

        let camera = stream.tracks().first().map(|track| track.label()).unwrap_or_default();
        info!(
            stream = stream.id(),
            camera,
            %size,
            playing,
            tier = %attempt.tier,
            "Camera ready"
        );
        Ok(())
    }
}

impl<D: MediaDevices, H: ScreenHost> std::fmt::Debug for CaptureSession<D, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("snapshot", &*self.inner.snapshot.borrow())
            .field("lifecycle", &self.inner.lifecycle)
            .field("retry_consumed", &self.inner.retry.is_consumed())
            .finish()
    }
}
