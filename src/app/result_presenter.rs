// SPDX-License-Identifier: GPL-3.0-only

//! Result panel
//!
//! Shows the decoded value with its format and offers one action: open
//! the value when it looks like a link, copy it otherwise.

use crate::app::actions::SystemActions;
use crate::backends::detector::{BarcodeFormat, DetectionResult};
use crate::constants::labels;
use crate::errors::ActionError;
use tracing::{debug, warn};

/// How a decoded value is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Contains a scheme separator, offered for opening
    Link,
    /// Anything else, offered for copying
    Text,
}

impl ValueKind {
    pub fn classify(value: &str) -> Self {
        if value.contains("://") {
            ValueKind::Link
        } else {
            ValueKind::Text
        }
    }

    /// Initial label of the action button
    pub fn action_label(&self) -> &'static str {
        match self {
            ValueKind::Link => labels::ACTION_OPEN,
            ValueKind::Text => labels::ACTION_COPY,
        }
    }
}

/// What pressing the action button did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionPerformed {
    Copied,
    Opened,
    /// The label was neither "Copy" nor "Open"
    Nothing,
}

/// Rendered detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultPanel {
    pub raw_value: String,
    pub format: BarcodeFormat,
    pub kind: ValueKind,
    /// Current label of the action button
    pub action_label: &'static str,
}

impl ResultPanel {
    pub fn present(result: &DetectionResult) -> Self {
        let kind = ValueKind::classify(&result.raw_value);
        debug!(?kind, format = %result.format, "Presenting result");
        Self {
            raw_value: result.raw_value.clone(),
            format: result.format,
            kind,
            action_label: kind.action_label(),
        }
    }

    /// Run the action named by the current label
    ///
    /// "Copy" writes the value to the clipboard once, "Open" opens it once.
    /// After a copy the label reads "Copied!" or, on failure, "Copy Failed";
    /// pressing the button again in either state does nothing.
    pub async fn perform_action(
        &mut self,
        actions: &dyn SystemActions,
    ) -> Result<ActionPerformed, ActionError> {
        match self.action_label {
            labels::ACTION_COPY => match actions.write_text(&self.raw_value).await {
                Ok(()) => {
                    self.action_label = labels::ACTION_COPIED;
                    Ok(ActionPerformed::Copied)
                }
                Err(e) => {
                    warn!(error = %e, "Copy failed");
                    self.action_label = labels::ACTION_COPY_FAILED;
                    Err(e)
                }
            },
            labels::ACTION_OPEN => {
                actions.open_url(&self.raw_value)?;
                Ok(ActionPerformed::Opened)
            }
            _ => Ok(ActionPerformed::Nothing),
        }
    }
}
