// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for camera capture and barcode detection
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               Scan Session                   │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                   │
//! │  ┌─────────────────┐  ┌──────────────────┐  │
//! │  │     Camera      │  │     Detector     │  │
//! │  │ (V4L2 / images) │  │ (rqrr / bardec.) │  │
//! │  └─────────────────┘  └──────────────────┘  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: Camera capability with device selection and frame capture
//! - [`detector`]: Barcode detection capability and its implementations

pub mod camera;
pub mod detector;
