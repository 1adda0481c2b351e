// SPDX-License-Identifier: GPL-3.0-only

use crate::app::session::{ScanTiming, SessionSettings};
use crate::backends::camera::{FacingMode, StreamConstraints};
use crate::backends::detector::DetectorPreference;
use crate::constants::{APP_DIR_NAME, detection, timing};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const CONFIG_FILE_NAME: &str = "config.json";

/// User configuration
///
/// Missing keys take their default, so older files keep loading.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Delay between detector polls in milliseconds
    pub poll_interval_ms: u64,
    /// Scan budget in milliseconds, counted from stream start
    pub timeout_ms: u64,
    /// Delay between format list entries appearing, in milliseconds
    pub format_reveal_delay_ms: u64,
    /// Consecutive failing polls before a scan fails
    pub max_consecutive_poll_failures: u32,
    /// Detector implementation (auto, native, fallback)
    pub detector: DetectorPreference,
    /// V4L2 device path, overrides facing-based selection
    pub camera_device: Option<String>,
    /// Preferred camera facing
    pub facing: FacingMode,
    /// Frames are downscaled to this size (longest side) before decoding
    pub max_dimension: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_ms: timing::POLL_INTERVAL.as_millis() as u64,
            timeout_ms: timing::SCAN_TIMEOUT.as_millis() as u64,
            format_reveal_delay_ms: timing::FORMAT_REVEAL_DELAY.as_millis() as u64,
            max_consecutive_poll_failures: timing::MAX_CONSECUTIVE_POLL_FAILURES,
            detector: DetectorPreference::default(),
            camera_device: None,
            facing: FacingMode::default(),
            max_dimension: detection::MAX_DIMENSION,
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from the default location, defaults when there is none
    pub fn load() -> AppResult<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("No config directory, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from `path`
    ///
    /// A missing file yields the defaults. A file that does not parse or
    /// holds invalid values is an error.
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Write to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), "Saved config");
        Ok(())
    }

    /// Reject values that would stall or spin a session
    pub fn validate(&self) -> AppResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(AppError::Config("poll_interval_ms must be positive".into()));
        }
        if self.timeout_ms == 0 {
            return Err(AppError::Config("timeout_ms must be positive".into()));
        }
        if self.max_consecutive_poll_failures == 0 {
            return Err(AppError::Config(
                "max_consecutive_poll_failures must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn format_reveal_delay(&self) -> Duration {
        Duration::from_millis(self.format_reveal_delay_ms)
    }

    /// Session settings derived from this config
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            timing: ScanTiming {
                poll_interval: Duration::from_millis(self.poll_interval_ms),
                timeout: Duration::from_millis(self.timeout_ms),
                max_consecutive_poll_failures: self.max_consecutive_poll_failures,
            },
            constraints: StreamConstraints {
                facing: self.facing,
                audio: false,
                device: self.camera_device.clone(),
            },
            max_dimension: self.max_dimension,
        }
    }
}
