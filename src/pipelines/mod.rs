// SPDX-License-Identifier: MPL-2.0

//! Processing pipelines for still capture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌───────────────┐
//! │ Camera Frame │ ──▶ │  Photo Pipeline   │ ──▶ │ CapturedImage │
//! │   (RGBA)     │     │  - Mirror         │     │   (JPEG)      │
//! │              │     │  - JPEG encode    │     │               │
//! └──────────────┘     └───────────────────┘     └───────────────┘
//!                               ▲
//! ┌──────────────┐              │
//! │ Uploaded file│ ── decode ───┘
//! └──────────────┘
//! ```
//!
//! Encoding is CPU-bound and runs on the blocking pool.
//!
//! # Modules
//!
//! - [`photo`]: frame mirroring, upload decoding and JPEG encoding

pub mod photo;
