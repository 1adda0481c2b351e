// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Scan session timing
pub mod timing {
    use super::Duration;

    /// Delay between two detector polls
    pub const POLL_INTERVAL: Duration = Duration::from_millis(1000);

    /// Overall budget of a scan session, counted from stream start
    pub const SCAN_TIMEOUT: Duration = Duration::from_millis(15_000);

    /// Delay between two entries of the format list appearing
    pub const FORMAT_REVEAL_DELAY: Duration = Duration::from_millis(150);

    /// Consecutive failing polls tolerated before a session fails
    pub const MAX_CONSECUTIVE_POLL_FAILURES: u32 = 3;

    /// Redraw period of the terminal interface
    pub const UI_TICK: Duration = Duration::from_millis(250);
}

/// Texts shown on the scan surface
pub mod labels {
    pub const SCAN_IDLE: &str = "Scan Barcode";
    pub const SCAN_ACTIVE: &str = "Scanning...";
    pub const ACTION_OPEN: &str = "Open";
    pub const ACTION_COPY: &str = "Copy";
    pub const ACTION_COPIED: &str = "Copied!";
    pub const ACTION_COPY_FAILED: &str = "Copy Failed";
}

/// User-facing messages
pub mod messages {
    /// Reported when a session reaches its deadline without a detection
    pub const NOT_DETECTED: &str = "Barcode Not Detected or Format Not Supported";

    /// Reported when the detector is configured with an empty format set
    pub const NO_FORMATS: &str = "No supported barcode formats available";
}

/// Frame preparation for the detectors
pub mod detection {
    /// Frames larger than this (either side) are downscaled before decoding
    pub const MAX_DIMENSION: u32 = 640;
}

/// Image file extensions accepted by the still image source
pub mod file_formats {
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp", "tiff"];

    /// Check if an extension (lowercase, without dot) is a supported image
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext)
    }
}

/// Application directory name used for config, cache and logs
pub const APP_DIR_NAME: &str = "barcode-scan";
