// SPDX-License-Identifier: MPL-2.0

//! Barcode Scan - read one barcode from a camera feed
//!
//! This library provides the scan session lifecycle: acquire a camera
//! stream, poll a barcode detector until it reports a code or the deadline
//! passes, release the camera, and present the outcome.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`app`]: Session controller, format probe, presenters and surface state
//! - [`backends`]: Camera and barcode detector abstraction
//! - [`config`]: User configuration handling
//! - [`terminal`]: Interactive terminal interface
//!
//! # Example
//!
//! ```ignore
//! // Interactive scanner:
//! // barcode-scan
//! // One-shot scan of an image file:
//! // barcode-scan scan --image code.png
//! ```

pub mod app;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod terminal;

// Re-export commonly used types
pub use app::{ScanApp, ScanController, ScanOutcome, SessionState};
pub use backends::detector::{BarcodeFormat, DetectionResult};
pub use config::Config;
pub use errors::{AppError, AppResult, ScanError};
