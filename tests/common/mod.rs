// SPDX-License-Identifier: GPL-3.0-only

//! Scripted platform used by the session tests
//!
//! Each `request_stream` call pops the next [`Outcome`]; an empty script grants.
//! Every grant and stop is recorded so tests can check that no hardware leaks.

#![allow(dead_code)]

use facecam::app::{CaptureSession, ChannelHost, HostEvent, SessionSettings};
use facecam::backends::camera::{
    CameraFrame, ConstraintTier, DeviceConstraints, FailureReason, FrameSize, MediaDevices,
    MediaStream, MediaTrack, PlatformError, PlatformResult, TrackState,
};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, mpsc};

/// Width of the test pattern
pub const FRAME_WIDTH: u32 = 64;
/// Height of the test pattern
pub const FRAME_HEIGHT: u32 = 32;

/// What the next stream request does
#[derive(Clone)]
pub enum Outcome {
    /// Grant a healthy stream immediately
    Grant,
    /// Fail the request
    Fail(FailureReason),
    /// Grant after the given delay
    GrantAfter(Duration),
    /// Grant once the gate is notified
    GrantWhen(Arc<Notify>),
    /// Grant a stream whose metadata never loads
    MetadataFails(FailureReason),
    /// Grant a stream that refuses to play
    PlayFails,
}

/// Something the fake platform observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Requested(ConstraintTier),
    Granted(String),
    Stopped(String),
}

#[derive(Default)]
struct Shared {
    script: Mutex<VecDeque<Outcome>>,
    events: Mutex<Vec<Event>>,
    requests: Mutex<Vec<DeviceConstraints>>,
    live_tracks: AtomicUsize,
    next_id: AtomicUsize,
    unsupported: AtomicBool,
}

impl Shared {
    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

/// Scripted [`MediaDevices`]; clones share the same script and log
#[derive(Clone, Default)]
pub struct FakeDevices {
    shared: Arc<Shared>,
}

impl FakeDevices {
    pub fn new(script: impl IntoIterator<Item = Outcome>) -> Self {
        let devices = Self::default();
        devices.shared.script.lock().unwrap().extend(script);
        devices
    }

    /// A platform without any capture capability
    pub fn unsupported() -> Self {
        let devices = Self::default();
        devices.shared.unsupported.store(true, Ordering::SeqCst);
        devices
    }

    pub fn push(&self, outcome: Outcome) {
        self.shared.script.lock().unwrap().push_back(outcome);
    }

    pub fn events(&self) -> Vec<Event> {
        self.shared.events.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<DeviceConstraints> {
        self.shared.requests.lock().unwrap().clone()
    }

    pub fn request_tiers(&self) -> Vec<ConstraintTier> {
        self.requests().iter().map(|c| c.tier).collect()
    }

    /// Tracks granted and not yet stopped
    pub fn live_tracks(&self) -> usize {
        self.shared.live_tracks.load(Ordering::SeqCst)
    }

    fn grant(shared: &Arc<Shared>, metadata: PlatformResult<FrameSize>, play_ok: bool) -> FakeStream {
        let id = format!("stream-{}", shared.next_id.fetch_add(1, Ordering::SeqCst));
        shared.live_tracks.fetch_add(1, Ordering::SeqCst);
        shared.record(Event::Granted(id.clone()));
        FakeStream {
            tracks: vec![FakeTrack {
                stream_id: id.clone(),
                stopped: AtomicBool::new(false),
                enabled: AtomicBool::new(true),
                shared: Arc::clone(shared),
            }],
            id,
            metadata,
            play_ok,
            frame: test_pattern(),
        }
    }
}

impl MediaDevices for FakeDevices {
    type Stream = FakeStream;

    fn is_supported(&self) -> bool {
        !self.shared.unsupported.load(Ordering::SeqCst)
    }

    fn request_stream(
        &self,
        constraints: &DeviceConstraints,
    ) -> impl Future<Output = PlatformResult<FakeStream>> + Send {
        let shared = Arc::clone(&self.shared);
        shared.requests.lock().unwrap().push(constraints.clone());
        shared.record(Event::Requested(constraints.tier));
        let outcome = shared
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Outcome::Grant);
        let size = FrameSize::new(FRAME_WIDTH, FRAME_HEIGHT);

        async move {
            match outcome {
                Outcome::Grant => Ok(Self::grant(&shared, Ok(size), true)),
                Outcome::Fail(reason) => Err(PlatformError::new(reason, "scripted failure")),
                Outcome::GrantAfter(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(Self::grant(&shared, Ok(size), true))
                }
                Outcome::GrantWhen(gate) => {
                    gate.notified().await;
                    Ok(Self::grant(&shared, Ok(size), true))
                }
                Outcome::MetadataFails(reason) => {
                    let err = PlatformError::new(reason, "scripted metadata failure");
                    Ok(Self::grant(&shared, Err(err), true))
                }
                Outcome::PlayFails => Ok(Self::grant(&shared, Ok(size), false)),
            }
        }
    }
}

pub struct FakeStream {
    id: String,
    tracks: Vec<FakeTrack>,
    metadata: PlatformResult<FrameSize>,
    play_ok: bool,
    frame: CameraFrame,
}

impl MediaStream for FakeStream {
    type Track = FakeTrack;

    fn id(&self) -> &str {
        &self.id
    }

    fn tracks(&self) -> &[FakeTrack] {
        &self.tracks
    }

    fn loaded_metadata(&self) -> impl Future<Output = PlatformResult<FrameSize>> + Send {
        let metadata = self.metadata.clone();
        async move { metadata }
    }

    fn play(&self) -> impl Future<Output = PlatformResult<()>> + Send {
        let play_ok = self.play_ok;
        async move {
            if play_ok {
                Ok(())
            } else {
                Err(PlatformError::new(
                    FailureReason::Other("NotAllowedError".to_string()),
                    "autoplay refused",
                ))
            }
        }
    }

    fn current_frame(&self) -> Option<CameraFrame> {
        self.is_live().then(|| self.frame.clone())
    }
}

pub struct FakeTrack {
    stream_id: String,
    stopped: AtomicBool,
    enabled: AtomicBool,
    shared: Arc<Shared>,
}

impl MediaTrack for FakeTrack {
    fn label(&self) -> &str {
        "Fake Camera"
    }

    fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.shared.live_tracks.fetch_sub(1, Ordering::SeqCst);
            self.shared.record(Event::Stopped(self.stream_id.clone()));
        }
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn ready_state(&self) -> TrackState {
        if self.stopped.load(Ordering::SeqCst) {
            TrackState::Ended
        } else {
            TrackState::Live
        }
    }
}

/// Left half red, right half blue
pub fn test_pattern() -> CameraFrame {
    let mut data = Vec::with_capacity((FRAME_WIDTH * FRAME_HEIGHT * 4) as usize);
    for _y in 0..FRAME_HEIGHT {
        for x in 0..FRAME_WIDTH {
            if x < FRAME_WIDTH / 2 {
                data.extend_from_slice(&[255, 0, 0, 255]);
            } else {
                data.extend_from_slice(&[0, 0, 255, 255]);
            }
        }
    }
    CameraFrame::from_rgba(FRAME_WIDTH, FRAME_HEIGHT, data)
}

/// Small PNG for the upload path
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([10, 200, 30]));
    let mut bytes = std::io::Cursor::new(Vec::new());
    img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
    bytes.into_inner()
}

pub type TestSession = CaptureSession<FakeDevices, ChannelHost>;

/// Mount a session over a scripted platform with default settings
pub fn mount(devices: &FakeDevices) -> (TestSession, mpsc::UnboundedReceiver<HostEvent>) {
    mount_with(devices, SessionSettings::default())
}

pub fn mount_with(
    devices: &FakeDevices,
    settings: SessionSettings,
) -> (TestSession, mpsc::UnboundedReceiver<HostEvent>) {
    let (host, events) = ChannelHost::new();
    (CaptureSession::mount(devices.clone(), host, settings), events)
}
