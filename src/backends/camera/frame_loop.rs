// SPDX-License-Identifier: GPL-3.0-only
//! Thread lifecycle management for capture loops
//!
//! Every V4L2 track owns one capture thread. The thread opens the device,
//! reports back whether streaming started, and then keeps dequeuing frames
//! until it is asked to stop. The controller gives the track a single,
//! idempotent way to stop the thread and wait for the device to close.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Action returned by one loop iteration to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Stop signal handed to the thread body
#[derive(Debug, Clone)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// True once the controller asked the loop to stop
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Run `step` until it returns [`LoopAction::Stop`] or the signal is set
    pub fn run_until_stopped<F>(&self, mut step: F)
    where
        F: FnMut() -> LoopAction,
    {
        while !self.is_set() {
            if step() == LoopAction::Stop {
                break;
            }
        }
    }
}

/// Controller for a capture loop running in a separate thread
///
/// # Example
///
/// ```ignore
/// let controller = CaptureLoopController::spawn("v4l2:/dev/video0", |stop| {
///     let stream = open_stream()?;
///     stop.run_until_stopped(|| {
///         publish(stream.next());
///         LoopAction::Continue
///     });
/// });
///
/// // Later, stop the loop and wait for the device to close
/// controller.stop();
/// ```
pub struct CaptureLoopController {
    /// Thread handle for joining
    thread_handle: Option<JoinHandle<()>>,
    /// Signal to stop the loop
    stop_signal: StopSignal,
    /// Name for logging
    name: String,
}

impl CaptureLoopController {
    /// Start `body` on a new thread
    ///
    /// The body owns everything it opens; it must poll the [`StopSignal`]
    /// and return promptly once it is set.
    pub fn spawn<F>(name: &str, body: F) -> std::io::Result<Self>
    where
        F: FnOnce(StopSignal) + Send + 'static,
    {
        let stop_signal = StopSignal::new();
        let thread_signal = stop_signal.clone();
        let thread_name = name.to_string();

        info!(name = %name, "Starting capture loop");

        let thread_handle = thread::Builder::new()
            .name(format!("capture-{}", name))
            .spawn(move || {
                debug!(name = %thread_name, "Capture loop thread started");
                body(thread_signal);
                info!(name = %thread_name, "Capture loop thread exiting");
            })?;

        Ok(Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        })
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop (non-blocking)
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting capture loop stop");
        self.stop_signal.set();
    }

    /// Stop the loop and wait for the thread to finish. Idempotent.
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Signal the loop to stop and let it finish in the background
    ///
    /// Used where blocking on the join is not acceptable (inside a dropped
    /// future). The thread still closes its device on the way out.
    pub fn detach(mut self) {
        self.request_stop();
        if self.thread_handle.take().is_some() {
            debug!(name = %self.name, "Capture loop detached");
        }
    }

    /// Wait for the thread to finish without sending stop signal
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if handle.thread().id() == thread::current().id() {
                // Stopped from inside the loop; the thread exits on its own
                return;
            }
            debug!(name = %self.name, "Waiting for capture loop thread to finish");
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Capture loop thread panicked: {:?}", e);
            } else {
                debug!(name = %self.name, "Capture loop thread finished");
            }
        }
    }
}

impl Drop for CaptureLoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "CaptureLoopController dropped, stopping loop");
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    #[test]
    fn test_loop_stops_itself() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut controller = CaptureLoopController::spawn("test-loop", move |stop| {
            stop.run_until_stopped(|| {
                let count = counter_clone.fetch_add(1, Ordering::SeqCst);
                if count >= 10 {
                    LoopAction::Stop
                } else {
                    LoopAction::Continue
                }
            });
        })
        .unwrap();

        controller.join();

        assert_eq!(counter.load(Ordering::SeqCst), 11); // 0-10 inclusive
    }

    #[test]
    fn test_stop_signal() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut controller = CaptureLoopController::spawn("test-loop", move |stop| {
            stop.run_until_stopped(|| {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(10));
                LoopAction::Continue
            });
        })
        .unwrap();

        thread::sleep(Duration::from_millis(50));

        controller.stop();
        assert!(counter.load(Ordering::SeqCst) > 0);
        assert!(!controller.is_running());

        // Second stop is a no-op
        controller.stop();
    }

    #[test]
    fn test_is_running() {
        let controller = CaptureLoopController::spawn("test-running", |stop| {
            stop.run_until_stopped(|| {
                thread::sleep(Duration::from_millis(20));
                LoopAction::Continue
            });
        })
        .unwrap();

        assert!(controller.is_running());

        // Drop will stop it
        drop(controller);
    }
}
