// SPDX-License-Identifier: GPL-3.0-only

//! Callbacks into the screen hosting the capture session

use crate::pipelines::photo::CapturedImage;
use tokio::sync::mpsc;
use tracing::warn;

/// The surrounding screen
pub trait ScreenHost: Send + Sync + 'static {
    /// Receives the single image of a successful capture or upload
    fn on_capture(&self, image: CapturedImage);

    /// The user backed out of the capture screen
    fn on_back(&self);
}

/// Event forwarded by [`ChannelHost`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Captured(CapturedImage),
    Back,
}

/// Host that forwards every callback into a channel
#[derive(Debug, Clone)]
pub struct ChannelHost {
    tx: mpsc::UnboundedSender<HostEvent>,
}

impl ChannelHost {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HostEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: HostEvent) {
        if self.tx.send(event).is_err() {
            warn!("Host event dropped, receiver gone");
        }
    }
}

impl ScreenHost for ChannelHost {
    fn on_capture(&self, image: CapturedImage) {
        self.send(HostEvent::Captured(image));
    }

    fn on_back(&self) {
        self.send(HostEvent::Back);
    }
}
