// SPDX-License-Identifier: MPL-2.0

//! Core types for barcode detection
//!
//! These types are shared by every detector backend and flow unchanged into
//! the session controller and the presenters.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Barcode symbology, named as in the web barcode detection API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarcodeFormat {
    Aztec,
    #[serde(rename = "code_128")]
    Code128,
    #[serde(rename = "code_39")]
    Code39,
    #[serde(rename = "code_93")]
    Code93,
    Codabar,
    DataMatrix,
    #[serde(rename = "ean_13")]
    Ean13,
    #[serde(rename = "ean_8")]
    Ean8,
    Itf,
    Pdf417,
    QrCode,
    UpcA,
    UpcE,
    Unknown,
}

impl BarcodeFormat {
    /// Every known format, in display order
    pub const ALL: [BarcodeFormat; 14] = [
        BarcodeFormat::Aztec,
        BarcodeFormat::Code128,
        BarcodeFormat::Code39,
        BarcodeFormat::Code93,
        BarcodeFormat::Codabar,
        BarcodeFormat::DataMatrix,
        BarcodeFormat::Ean13,
        BarcodeFormat::Ean8,
        BarcodeFormat::Itf,
        BarcodeFormat::Pdf417,
        BarcodeFormat::QrCode,
        BarcodeFormat::UpcA,
        BarcodeFormat::UpcE,
        BarcodeFormat::Unknown,
    ];

    /// Identifier string (e.g. `qr_code`)
    pub fn as_str(&self) -> &'static str {
        match self {
            BarcodeFormat::Aztec => "aztec",
            BarcodeFormat::Code128 => "code_128",
            BarcodeFormat::Code39 => "code_39",
            BarcodeFormat::Code93 => "code_93",
            BarcodeFormat::Codabar => "codabar",
            BarcodeFormat::DataMatrix => "data_matrix",
            BarcodeFormat::Ean13 => "ean_13",
            BarcodeFormat::Ean8 => "ean_8",
            BarcodeFormat::Itf => "itf",
            BarcodeFormat::Pdf417 => "pdf417",
            BarcodeFormat::QrCode => "qr_code",
            BarcodeFormat::UpcA => "upc_a",
            BarcodeFormat::UpcE => "upc_e",
            BarcodeFormat::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BarcodeFormat {
    type Err = DetectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BarcodeFormat::ALL
            .into_iter()
            .find(|format| format.as_str() == s)
            .ok_or_else(|| DetectorError::UnknownFormat(s.to_string()))
    }
}

/// A rectangular region within a frame
///
/// Coordinates are normalized (0.0 to 1.0) relative to the frame dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameRegion {
    /// Left edge (0.0 = left of frame, 1.0 = right of frame)
    pub x: f32,
    /// Top edge (0.0 = top of frame, 1.0 = bottom of frame)
    pub y: f32,
    /// Width as fraction of frame width
    pub width: f32,
    /// Height as fraction of frame height
    pub height: f32,
}

impl FrameRegion {
    /// Bounding box of a set of pixel points, normalized to the frame size
    pub fn from_points(points: &[(f32, f32)], frame_width: u32, frame_height: u32) -> Option<Self> {
        if points.is_empty() || frame_width == 0 || frame_height == 0 {
            return None;
        }

        let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
        let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);
        for &(x, y) in points {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        let fw = frame_width as f32;
        let fh = frame_height as f32;
        let min_x = min_x.clamp(0.0, fw);
        let min_y = min_y.clamp(0.0, fh);
        let max_x = max_x.clamp(0.0, fw);
        let max_y = max_y.clamp(0.0, fh);

        Some(Self {
            x: min_x / fw,
            y: min_y / fh,
            width: (max_x - min_x) / fw,
            height: (max_y - min_y) / fh,
        })
    }
}

/// One barcode found in a frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Decoded payload
    pub raw_value: String,
    /// Symbology the payload was read from
    pub format: BarcodeFormat,
    /// Where the code sits in the frame, when the backend reports it
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bounds: Option<FrameRegion>,
}

impl DetectionResult {
    pub fn new(raw_value: impl Into<String>, format: BarcodeFormat) -> Self {
        Self {
            raw_value: raw_value.into(),
            format,
            bounds: None,
        }
    }

    pub fn with_bounds(mut self, bounds: Option<FrameRegion>) -> Self {
        self.bounds = bounds;
        self
    }
}

/// Configuration of one detector instance
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DetectorConfig {
    /// Formats the detector reports; anything else is dropped
    pub formats: Vec<BarcodeFormat>,
    /// Frames larger than this are downscaled before decoding (0 = never)
    pub max_dimension: u32,
}

/// Which implementation stands behind the detector interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    /// rqrr decoder
    Native,
    /// bardecoder decoder
    Fallback,
}

impl std::fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectorKind::Native => write!(f, "native"),
            DetectorKind::Fallback => write!(f, "fallback"),
        }
    }
}

/// Result type for detector operations
pub type DetectorResult<T> = Result<T, DetectorError>;

/// Errors from detector backends
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetectorError {
    /// Detector built with an empty or fully unsupported format list
    #[error("{}", crate::constants::messages::NO_FORMATS)]
    NoFormats,
    /// Unknown format identifier
    #[error("Unknown barcode format: {0}")]
    UnknownFormat(String),
    /// The frame could not be turned into an image the decoder accepts
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),
    /// The detection task failed
    #[error("Detection failed: {0}")]
    DetectionFailed(String),
}
