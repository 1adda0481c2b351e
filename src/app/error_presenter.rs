// SPDX-License-Identifier: GPL-3.0-only

//! Error panel

use crate::app::state::ScanView;
use crate::constants::labels;
use tracing::debug;

/// Rendered failure message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPanel {
    pub message: String,
}

impl ErrorPanel {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Full panel text
    pub fn text(&self) -> String {
        format!("Error: {}.\n\nTry again", self.message)
    }

    /// Show `message` on `view`
    ///
    /// Replaces any previous error, hides the video surface and puts the
    /// scan button back to its idle label.
    pub fn present(view: &mut ScanView, message: impl Into<String>) {
        let panel = Self::new(message);
        debug!(message = %panel.message, "Presenting error");
        view.error = Some(panel);
        view.video_visible = false;
        view.scan_label = labels::SCAN_IDLE;
    }
}
