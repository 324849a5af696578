// SPDX-License-Identifier: MPL-2.0

//! facecam - face photo acquisition from the front camera
//!
//! This library provides the core of a "take a photo of your face" screen:
//! negotiating a camera, owning its stream until it is released, capturing a
//! mirrored still and falling back to an uploaded image.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`app`]: Capture session, acquisition state machine and render contract
//! - [`backends`]: Platform camera abstraction, stream lifecycle and V4L2 backend
//! - [`pipelines`]: Mirroring, JPEG encoding and upload decoding
//! - [`config`]: User configuration handling
//! - [`storage`]: Writing captured images to disk
//! - [`i18n`]: User-facing copy
//!
//! # Example
//!
//! ```ignore
//! let (host, events) = ChannelHost::new();
//! let session = CaptureSession::mount(V4l2Devices::new(), host, SessionSettings::default());
//! session.start().await;
//! session.capture().await?;
//! ```

pub mod app;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod i18n;
pub mod pipelines;
pub mod storage;

// Re-export commonly used types
pub use app::{AcquisitionState, CaptureSession, RenderContract, ScreenHost, SessionSettings};
pub use config::Config;
pub use errors::{AppError, AppResult, PhotoError};
pub use pipelines::photo::CapturedImage;
