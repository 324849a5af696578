// SPDX-License-Identifier: GPL-3.0-only

//! Rendering surface for the live feed
//!
//! The surface shows whatever stream is attached to it but never owns that
//! stream: it keeps a [`Weak`] reference, so dropping the last owner in the
//! lifecycle manager is enough to let the hardware go.

use super::{CameraFrame, FrameSize, MediaStream};
use std::sync::{Arc, Weak};

/// Off-screen stand-in for a video element
pub struct PreviewSurface<S> {
    source: Option<Weak<S>>,
    natural_size: Option<FrameSize>,
    playing: bool,
}

impl<S: MediaStream> PreviewSurface<S> {
    pub fn new() -> Self {
        Self {
            source: None,
            natural_size: None,
            playing: false,
        }
    }

    /// Point the surface at `stream`
    pub fn attach(&mut self, stream: &Arc<S>) {
        self.source = Some(Arc::downgrade(stream));
        self.natural_size = None;
        self.playing = false;
    }

    /// Clear the source
    pub fn detach(&mut self) {
        self.source = None;
        self.natural_size = None;
        self.playing = false;
    }

    /// True while a source is set, even if it has already been dropped
    pub fn is_attached(&self) -> bool {
        self.source.is_some()
    }

    /// The attached stream, if it is still alive
    pub fn source(&self) -> Option<Arc<S>> {
        self.source.as_ref().and_then(Weak::upgrade)
    }

    /// Record frame dimensions once metadata has loaded
    pub fn set_natural_size(&mut self, size: FrameSize) {
        self.natural_size = Some(size);
    }

    /// Intrinsic dimensions of the attached feed
    pub fn natural_size(&self) -> Option<FrameSize> {
        self.natural_size
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    /// Frame currently shown, if the feed is attached and decoding
    pub fn current_frame(&self) -> Option<CameraFrame> {
        self.source()?.current_frame()
    }
}

impl<S: MediaStream> Default for PreviewSurface<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> std::fmt::Debug for PreviewSurface<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewSurface")
            .field("attached", &self.source.is_some())
            .field("natural_size", &self.natural_size)
            .field("playing", &self.playing)
            .finish()
    }
}
