// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Which way the camera should face
///
/// The backends treat this as an ideal, not a requirement: when no device
/// matches, the first usable device is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Rear camera, facing away from the user
    #[default]
    Environment,
    /// Front camera, facing the user
    User,
}

impl std::fmt::Display for FacingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FacingMode::Environment => write!(f, "environment"),
            FacingMode::User => write!(f, "user"),
        }
    }
}

/// What a session asks of the camera backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConstraints {
    /// Preferred facing mode
    pub facing: FacingMode,
    /// Audio is never captured; kept to make the request explicit
    pub audio: bool,
    /// Explicit device path, bypassing the facing preference
    pub device: Option<String>,
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self {
            facing: FacingMode::Environment,
            audio: false,
            device: None,
        }
    }
}

/// Represents a camera device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    pub name: String,
    pub path: String, // Device node (e.g. /dev/video0) or file path
    pub index: usize,
}

/// A single grayscale frame from the camera
///
/// Backends reduce whatever the device delivers to 8-bit luminance, one
/// byte per pixel.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    pub data: Arc<[u8]>,
    /// Row stride (bytes per row, may include padding)
    pub stride: u32,
    /// Timestamp when frame was captured
    pub captured_at: Instant,
    /// Frame sequence number as reported by the source
    pub sequence: u64,
}

impl CameraFrame {
    /// Build a tightly packed grayscale frame
    pub fn gray(width: u32, height: u32, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            width,
            height,
            data: data.into(),
            stride: width,
            captured_at: Instant::now(),
            sequence: 0,
        }
    }

    /// Luminance of the pixel at (x, y), 0 when out of bounds
    pub fn luma(&self, x: u32, y: u32) -> u8 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        let offset = (y * self.stride + x) as usize;
        self.data.get(offset).copied().unwrap_or(0)
    }

    /// Drop row padding
    ///
    /// Frames without stride padding are returned as a cheap clone.
    pub fn to_gray(&self) -> Self {
        if self.stride == self.width {
            return self.clone();
        }

        let mut data = Vec::with_capacity((self.width * self.height) as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                data.push(self.luma(x, y));
            }
        }

        Self {
            width: self.width,
            height: self.height,
            data: Arc::from(data),
            stride: self.width,
            captured_at: self.captured_at,
            sequence: self.sequence,
        }
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for camera backend operations
///
/// Each variant displays only the message it carries so that the session can
/// report the environment's own wording.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Access to the camera was refused
    #[error("{0}")]
    PermissionDenied(String),
    /// No matching camera device
    #[error("{0}")]
    DeviceNotFound(String),
    /// Device found but no usable capture format
    #[error("{0}")]
    FormatNotSupported(String),
    /// The stream could not be started
    #[error("{0}")]
    StreamFailed(String),
    /// General I/O error
    #[error("{0}")]
    Io(String),
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => BackendError::PermissionDenied(err.to_string()),
            std::io::ErrorKind::NotFound => BackendError::DeviceNotFound(err.to_string()),
            _ => BackendError::Io(err.to_string()),
        }
    }
}
