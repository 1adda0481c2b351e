// SPDX-License-Identifier: MPL-2.0

//! Error types for the barcode scanner
//!
//! Backend-level errors live next to their backends
//! ([`BackendError`](crate::backends::camera::BackendError),
//! [`DetectorError`](crate::backends::detector::DetectorError)). This module
//! holds the errors that cross the session and application boundaries.

use crate::backends::camera::BackendError;
use crate::backends::detector::DetectorError;
use crate::constants::messages;
use thiserror::Error;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Scan session errors
    #[error(transparent)]
    Scan(#[from] ScanError),
    /// Copy/open action errors
    #[error(transparent)]
    Action(#[from] ActionError),
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
    /// I/O errors (config file, terminal)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

/// Why a scan session did not produce a result
///
/// The `Display` output of each variant is the exact text shown in the
/// error panel.
#[derive(Debug, Clone, Error)]
pub enum ScanError {
    /// The camera could not be acquired; the backend message is shown as is
    #[error("{0}")]
    Acquisition(#[from] BackendError),
    /// Nothing was detected before the deadline
    ///
    /// Barcodes in a format the detector does not support never detect, so
    /// they end up here as well.
    #[error("{}", messages::NOT_DETECTED)]
    Timeout,
    /// The detector could not be built or kept failing while polling
    #[error("{0}")]
    Detector(#[from] DetectorError),
    /// The camera went away while the session was polling
    #[error("{0}")]
    StreamLost(BackendError),
    /// The session task stopped without resolving
    #[error("Scan stopped unexpectedly: {0}")]
    Aborted(String),
}

impl ScanError {
    /// Whether this error ended the session by timeout rather than failure
    pub fn is_timeout(&self) -> bool {
        matches!(self, ScanError::Timeout)
    }
}

/// Errors from the copy/open actions of the result panel
#[derive(Debug, Clone, Error)]
pub enum ActionError {
    /// No clipboard tool accepted the text
    #[error("Clipboard unavailable: {0}")]
    ClipboardUnavailable(String),
    /// The URL could not be handed to the desktop
    #[error("Failed to open {url}: {reason}")]
    OpenFailed { url: String, reason: String },
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquisition_message_is_verbatim() {
        let err = ScanError::from(BackendError::PermissionDenied("Permission denied".into()));
        assert_eq!(err.to_string(), "Permission denied");
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_timeout_message() {
        assert_eq!(
            ScanError::Timeout.to_string(),
            "Barcode Not Detected or Format Not Supported"
        );
        assert!(ScanError::Timeout.is_timeout());
    }
}
