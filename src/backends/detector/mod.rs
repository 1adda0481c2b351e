// SPDX-License-Identifier: MPL-2.0

//! Barcode detection capability
//!
//! One interface, two interchangeable implementations:
//!
//! - [`NativeBackend`] decodes with rqrr (cargo feature `native-detector`)
//! - [`FallbackBackend`] decodes with bardecoder and is always built
//!
//! [`select`] runs the feature check once at startup. Callers hold an
//! `Arc<dyn DetectorBackend>` afterwards and never look at which
//! implementation they got.

pub mod fallback;
#[cfg(feature = "native-detector")]
pub mod native;
pub mod types;

pub use fallback::FallbackBackend;
#[cfg(feature = "native-detector")]
pub use native::NativeBackend;
pub use types::*;

use crate::backends::camera::CameraFrame;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Detection capability
pub trait DetectorBackend: Send + Sync {
    /// Which implementation this is (for logs and `formats` output)
    fn kind(&self) -> DetectorKind;

    /// Formats this backend can decode
    ///
    /// Asynchronous because some backends have to probe for it.
    fn supported_formats(&self) -> BoxFuture<'_, DetectorResult<Vec<BarcodeFormat>>>;

    /// Build a detector restricted to `config.formats`
    ///
    /// # Errors
    /// * `DetectorError::NoFormats` - none of the requested formats is supported
    fn create_detector(&self, config: &DetectorConfig) -> DetectorResult<Box<dyn BarcodeDetector>>;
}

/// A configured detector instance
pub trait BarcodeDetector: Send + Sync {
    /// Scan one frame
    ///
    /// Returns every barcode found, in backend-defined order. An empty
    /// vector means nothing was found.
    fn detect(&self, frame: Arc<CameraFrame>) -> BoxFuture<'_, DetectorResult<Vec<DetectionResult>>>;
}

/// Detector implementation preference from config or CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorPreference {
    /// Native when built in, fallback otherwise
    #[default]
    Auto,
    Native,
    Fallback,
}

/// Whether the native detector was compiled in
pub fn native_available() -> bool {
    cfg!(feature = "native-detector")
}

/// Pick the detector implementation
pub fn select(preference: DetectorPreference) -> Arc<dyn DetectorBackend> {
    let use_native = match preference {
        DetectorPreference::Fallback => false,
        DetectorPreference::Auto => native_available(),
        DetectorPreference::Native => {
            if !native_available() {
                warn!("Native detector not built in, using fallback");
            }
            native_available()
        }
    };

    let backend = build(use_native);
    info!(kind = %backend.kind(), "Detector backend selected");
    backend
}

#[cfg(feature = "native-detector")]
fn build(use_native: bool) -> Arc<dyn DetectorBackend> {
    if use_native {
        Arc::new(NativeBackend::new())
    } else {
        Arc::new(FallbackBackend::new())
    }
}

#[cfg(not(feature = "native-detector"))]
fn build(_use_native: bool) -> Arc<dyn DetectorBackend> {
    Arc::new(FallbackBackend::new())
}

/// Intersect requested formats with what a backend supports
///
/// Keeps the requested order. Fails when nothing remains.
pub(crate) fn effective_formats(
    requested: &[BarcodeFormat],
    supported: &[BarcodeFormat],
) -> DetectorResult<Vec<BarcodeFormat>> {
    let formats: Vec<BarcodeFormat> = requested
        .iter()
        .copied()
        .filter(|format| supported.contains(format))
        .collect();

    if formats.is_empty() {
        Err(DetectorError::NoFormats)
    } else {
        Ok(formats)
    }
}
