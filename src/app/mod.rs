// SPDX-License-Identifier: MPL-2.0

//! Capture screen core
//!
//! # Architecture
//!
//! - `session`: the [`CaptureSession`] driving negotiation, capture and teardown
//! - `state`: acquisition states, snapshots and the render contract
//! - `retry`: the one-shot automatic retry budget
//! - `lifetime`: mount-to-unmount cancellation token
//! - `host`: callbacks into the hosting screen
//!
//! # Main Types
//!
//! - `CaptureSession`: one mounted capture screen
//! - `SessionSnapshot`: what the host observes
//! - `RenderContract`: what the host draws

pub mod host;
pub mod lifetime;
pub mod retry;
pub mod session;
pub mod state;

pub use host::{ChannelHost, HostEvent, ScreenHost};
pub use lifetime::SessionToken;
pub use retry::RetryBudget;
pub use session::{CaptureSession, SessionSettings};
pub use state::{AcquisitionState, ErrorPanel, RenderContract, SessionSnapshot};
