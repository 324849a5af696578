// SPDX-License-Identifier: GPL-3.0-only

//! Mount-to-unmount lifetime of a capture session

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Cancellation token for one mounted session
///
/// Cancelled synchronously on unmount. Every continuation checks it before
/// touching observable state.
#[derive(Debug, Clone)]
pub struct SessionToken {
    cancelled: Arc<watch::Sender<bool>>,
}

impl SessionToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(watch::Sender::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    /// Resolves once the token is cancelled
    pub async fn cancelled(&self) {
        let mut rx = self.cancelled.subscribe();
        // The sender lives as long as self, so this only returns on cancel
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Run `fut` unless the token is cancelled first
    pub async fn run_until_cancelled<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancelled() => None,
            out = fut => Some(out),
        }
    }

    /// Sleep for `duration`; false if cancelled in the meantime
    pub async fn sleep(&self, duration: Duration) -> bool {
        self.run_until_cancelled(tokio::time::sleep(duration))
            .await
            .is_some()
    }
}

impl Default for SessionToken {
    fn default() -> Self {
        Self::new()
    }
}
