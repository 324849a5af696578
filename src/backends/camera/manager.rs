// SPDX-License-Identifier: GPL-3.0-only

//! Stream lifecycle manager
//!
//! The manager provides:
//! - Sole ownership of the active stream (zero or one at any time)
//! - Installation onto the rendering surface
//! - Idempotent release from any call site
//!
//! Release order is fixed: stop every track, mark every track disabled, clear
//! the handle, detach the surface. After it returns nothing reachable from the
//! session refers to the device any more. The lock is not held while tracks
//! stop.
//!
//! After [`StreamLifecycle::teardown_all`] the manager is closed: a grant that
//! shows up late is stopped on the spot instead of being installed.

use super::surface::PreviewSurface;
use super::{CameraFrame, FrameSize, MediaStream, MediaTrack};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Internal manager state
struct LifecycleState<S> {
    /// The installed stream
    active: Option<Arc<S>>,
    /// Surface the stream is rendered to (weak reference only)
    surface: PreviewSurface<S>,
    /// Number of installs since creation
    installs: u64,
    /// Set by teardown_all; no further installs
    closed: bool,
}

/// Owner of the active stream
///
/// Cheap to clone; all clones share the same state.
pub struct StreamLifecycle<S> {
    state: Arc<Mutex<LifecycleState<S>>>,
}

impl<S: MediaStream> StreamLifecycle<S> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(LifecycleState {
                active: None,
                surface: PreviewSurface::new(),
                installs: 0,
                closed: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LifecycleState<S>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install `stream` as the active feed
    ///
    /// Any previous stream is fully released first, so two grants are never
    /// live at the same time. Returns `None` (with the stream stopped) once
    /// the manager has been torn down.
    pub fn install(&self, stream: S) -> Option<Arc<S>> {
        let mut state = loop {
            if self.release() {
                debug!("Released previous stream before install");
            }
            let state = self.lock();
            if state.closed || state.active.is_none() {
                break state;
            }
        };
        if state.closed {
            drop(state);
            stream.stop_all();
            info!(stream = stream.id(), "Stream arrived after teardown, stopped");
            return None;
        }

        let stream = Arc::new(stream);
        state.surface.attach(&stream);
        state.active = Some(Arc::clone(&stream));
        state.installs += 1;

        info!(
            stream = stream.id(),
            tracks = stream.tracks().len(),
            installs = state.installs,
            "Stream installed"
        );
        Some(stream)
    }

    /// Release the active stream, if any
    ///
    /// Safe to call when nothing is installed. Returns whether a stream was
    /// actually released. Tracks are stopped without holding the lock, since a
    /// V4L2 track blocks until its capture thread has closed the device.
    pub fn release(&self) -> bool {
        let Some(stream) = self.lock().active.clone() else {
            return false;
        };

        for track in stream.tracks() {
            track.stop();
            track.set_enabled(false);
        }

        let mut state = self.lock();
        if !state
            .active
            .as_ref()
            .is_some_and(|active| Arc::ptr_eq(active, &stream))
        {
            // A concurrent release got there first
            return false;
        }
        state.active = None;
        state.surface.detach();
        info!(stream = stream.id(), "Stream released");
        true
    }

    /// Final teardown at session end. Closes the manager.
    pub fn teardown_all(&self) {
        self.lock().closed = true;
        let released = self.release();
        debug!(released, "Stream lifecycle torn down");
    }

    /// Whether a stream is installed
    pub fn is_active(&self) -> bool {
        self.lock().active.is_some()
    }

    /// Whether `stream` is still the installed one
    pub fn is_current(&self, stream: &Arc<S>) -> bool {
        self.lock()
            .active
            .as_ref()
            .is_some_and(|active| Arc::ptr_eq(active, stream))
    }

    /// Whether teardown_all has run
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of installs since creation
    pub fn install_count(&self) -> u64 {
        self.lock().installs
    }

    /// Record loaded metadata on the surface, if `stream` is still attached
    pub fn mark_metadata(&self, stream: &Arc<S>, size: FrameSize) -> bool {
        let mut state = self.lock();
        let attached = state
            .surface
            .source()
            .is_some_and(|source| Arc::ptr_eq(&source, stream));
        if attached {
            state.surface.set_natural_size(size);
        }
        attached
    }

    /// Mark the surface as playing, if `stream` is still attached
    pub fn mark_playing(&self, stream: &Arc<S>) -> bool {
        let mut state = self.lock();
        let attached = state
            .surface
            .source()
            .is_some_and(|source| Arc::ptr_eq(&source, stream));
        if attached {
            state.surface.set_playing(true);
        }
        attached
    }

    /// Natural size and current frame of the surface, read together
    pub fn read_surface(&self) -> Option<(FrameSize, CameraFrame)> {
        let state = self.lock();
        let size = state.surface.natural_size()?;
        let frame = state.surface.current_frame()?;
        Some((size, frame))
    }

    /// Whether the surface still has a source attached
    pub fn surface_attached(&self) -> bool {
        self.lock().surface.is_attached()
    }
}

impl<S: MediaStream> Default for StreamLifecycle<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Clone for StreamLifecycle<S> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<S> std::fmt::Debug for StreamLifecycle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("StreamLifecycle")
            .field("active", &state.active.is_some())
            .field("surface", &state.surface)
            .field("installs", &state.installs)
            .field("closed", &state.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::{PlatformResult, TrackState};
    use std::future::Future;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    type StopHook = Box<dyn FnOnce() + Send>;

    struct TestTrack {
        stops: Arc<AtomicUsize>,
        enabled: AtomicBool,
        during_stop: Mutex<Option<StopHook>>,
    }

    impl MediaTrack for TestTrack {
        fn label(&self) -> &str {
            "test"
        }
        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
            if let Some(hook) = self.during_stop.lock().unwrap().take() {
                hook();
            }
        }
        fn set_enabled(&self, enabled: bool) {
            self.enabled.store(enabled, Ordering::SeqCst);
        }
        fn is_enabled(&self) -> bool {
            self.enabled.load(Ordering::SeqCst)
        }
        fn ready_state(&self) -> TrackState {
            if self.stops.load(Ordering::SeqCst) > 0 {
                TrackState::Ended
            } else {
                TrackState::Live
            }
        }
    }

    struct TestStream {
        id: String,
        tracks: Vec<TestTrack>,
    }

    impl TestStream {
        /// Stream with one live track; the counter records stop() calls
        fn new(id: &str) -> (Self, Arc<AtomicUsize>) {
            let stops = Arc::new(AtomicUsize::new(0));
            let stream = Self {
                id: id.to_string(),
                tracks: vec![TestTrack {
                    stops: Arc::clone(&stops),
                    enabled: AtomicBool::new(true),
                    during_stop: Mutex::new(None),
                }],
            };
            (stream, stops)
        }
    }

    impl MediaStream for TestStream {
        type Track = TestTrack;

        fn id(&self) -> &str {
            &self.id
        }
        fn tracks(&self) -> &[TestTrack] {
            &self.tracks
        }
        fn loaded_metadata(&self) -> impl Future<Output = PlatformResult<FrameSize>> + Send {
            async { Ok(FrameSize::new(2, 2)) }
        }
        fn play(&self) -> impl Future<Output = PlatformResult<()>> + Send {
            async { Ok(()) }
        }
        fn current_frame(&self) -> Option<CameraFrame> {
            Some(CameraFrame::from_rgba(2, 2, vec![0; 16]))
        }
    }

    #[test]
    fn test_install_releases_previous() {
        let lifecycle = StreamLifecycle::new();
        let (a, a_stops) = TestStream::new("a");
        let (b, _) = TestStream::new("b");
        let first = lifecycle.install(a).unwrap();
        let second = lifecycle.install(b).unwrap();

        assert_eq!(a_stops.load(Ordering::SeqCst), 1);
        assert!(!first.tracks[0].is_enabled());
        assert!(lifecycle.is_current(&second));
        assert!(!lifecycle.is_current(&first));
        assert_eq!(lifecycle.install_count(), 2);
    }

    #[test]
    fn test_release_is_idempotent() {
        let lifecycle = StreamLifecycle::new();
        let (a, stops) = TestStream::new("a");
        let stream = lifecycle.install(a).unwrap();

        assert!(lifecycle.release());
        assert!(!lifecycle.release());
        assert!(!lifecycle.is_active());
        assert!(!lifecycle.surface_attached());
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert_eq!(stream.tracks[0].ready_state(), TrackState::Ended);
    }

    #[test]
    fn test_surface_holds_no_ownership() {
        let lifecycle = StreamLifecycle::new();
        let (a, _) = TestStream::new("a");
        let stream = lifecycle.install(a).unwrap();
        let weak = Arc::downgrade(&stream);
        drop(stream);

        lifecycle.release();
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_read_surface_needs_metadata() {
        let lifecycle = StreamLifecycle::new();
        let (a, _) = TestStream::new("a");
        let stream = lifecycle.install(a).unwrap();
        assert!(lifecycle.read_surface().is_none());

        assert!(lifecycle.mark_metadata(&stream, FrameSize::new(2, 2)));
        let (size, frame) = lifecycle.read_surface().unwrap();
        assert_eq!(size, frame.size());
    }

    #[test]
    fn test_mark_playing_only_for_attached_stream() {
        let lifecycle = StreamLifecycle::new();
        let (a, _) = TestStream::new("a");
        let stream = lifecycle.install(a).unwrap();
        assert!(lifecycle.mark_playing(&stream));

        lifecycle.release();
        assert!(!lifecycle.mark_playing(&stream));
    }

    #[test]
    fn test_tracks_stop_without_the_lock_held() {
        let lifecycle: StreamLifecycle<TestStream> = StreamLifecycle::new();
        let (a, _) = TestStream::new("a");
        let unlocked = Arc::new(AtomicBool::new(false));
        let observer = lifecycle.clone();
        let seen = Arc::clone(&unlocked);
        *a.tracks[0].during_stop.lock().unwrap() = Some(Box::new(move || {
            seen.store(observer.state.try_lock().is_ok(), Ordering::SeqCst);
        }));

        lifecycle.install(a).unwrap();
        assert!(lifecycle.release());
        assert!(unlocked.load(Ordering::SeqCst));
        assert!(!lifecycle.surface_attached());
    }

    #[test]
    fn test_install_after_teardown_is_refused() {
        let lifecycle = StreamLifecycle::new();
        lifecycle.teardown_all();
        assert!(lifecycle.is_closed());

        let (late, stops) = TestStream::new("late");
        assert!(lifecycle.install(late).is_none());
        assert!(!lifecycle.is_active());
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }
}
