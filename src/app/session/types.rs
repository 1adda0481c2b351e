// SPDX-License-Identifier: GPL-3.0-only

//! Scan session types

use crate::backends::camera::StreamConstraints;
use crate::backends::detector::DetectionResult;
use crate::constants::{detection, timing};
use crate::errors::ScanError;
use chrono::{DateTime, Local};
use std::time::Duration;
use uuid::Uuid;

/// Identifier of one scan session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // First block of the uuid is enough to tell sessions apart in logs
        let full = self.0.simple().to_string();
        f.write_str(&full[..8])
    }
}

/// Scan lifecycle state
///
/// `Idle` and the three terminal states all accept a new scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Scanning,
    Completed,
    Failed,
    TimedOut,
}

impl SessionState {
    /// Check if a session is in flight
    pub fn is_scanning(&self) -> bool {
        matches!(self, SessionState::Scanning)
    }
}

/// How a session ended
#[derive(Debug, Clone)]
pub enum ScanOutcome {
    /// A barcode was read
    Completed(DetectionResult),
    /// Anything that ended the session without a result; see [`ScanError`]
    Failed(ScanError),
    /// Cancelled or superseded before resolving
    Cancelled,
}

impl ScanOutcome {
    /// State the session is left in
    pub fn state(&self) -> SessionState {
        match self {
            ScanOutcome::Completed(_) => SessionState::Completed,
            ScanOutcome::Failed(e) if e.is_timeout() => SessionState::TimedOut,
            ScanOutcome::Failed(_) => SessionState::Failed,
            ScanOutcome::Cancelled => SessionState::Idle,
        }
    }

    pub fn result(&self) -> Option<&DetectionResult> {
        match self {
            ScanOutcome::Completed(result) => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ScanError> {
        match self {
            ScanOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Progress report from a running session
#[derive(Debug, Clone)]
pub struct ScanEvent {
    pub session: SessionId,
    pub kind: ScanEventKind,
}

#[derive(Debug, Clone)]
pub enum ScanEventKind {
    /// Session created, camera being requested
    Started { started_at: DateTime<Local> },
    /// Camera acquired and streaming
    StreamStarted { device: String },
    /// Session resolved; the camera has already been released
    Finished(ScanOutcome),
}

/// Point-in-time view of the session slot
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    /// Session owning the slot, if any was ever started
    pub id: Option<SessionId>,
    pub state: SessionState,
    pub started_at: Option<DateTime<Local>>,
}

/// Poll and deadline timing of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanTiming {
    /// Delay between detector polls; the first poll waits one interval
    pub poll_interval: Duration,
    /// Budget counted from stream start
    pub timeout: Duration,
    /// Consecutive poll errors tolerated before the session fails
    pub max_consecutive_poll_failures: u32,
}

impl Default for ScanTiming {
    fn default() -> Self {
        Self {
            poll_interval: timing::POLL_INTERVAL,
            timeout: timing::SCAN_TIMEOUT,
            max_consecutive_poll_failures: timing::MAX_CONSECUTIVE_POLL_FAILURES,
        }
    }
}

/// Everything a session needs besides the backends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub timing: ScanTiming,
    pub constraints: StreamConstraints,
    /// Forwarded to the detector configuration
    pub max_dimension: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timing: ScanTiming::default(),
            constraints: StreamConstraints::default(),
            max_dimension: detection::MAX_DIMENSION,
        }
    }
}
