// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for camera capture
//!
//! # Architecture
//!
//! The backend layer abstracts hardware access, providing a consistent API
//! regardless of the underlying capture method:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │           Session Layer (app)               │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                  │
//! │  ┌──────────────────┐  ┌────────────────┐   │
//! │  │ Platform traits  │  │ Stream manager │   │
//! │  └────────┬─────────┘  └────────────────┘   │
//! │  ┌────────┴─────────┐                       │
//! │  │      V4L2        │                       │
//! │  └──────────────────┘                       │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: platform traits, stream lifecycle manager and the V4L2 backend

pub mod camera;
