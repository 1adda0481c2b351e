// SPDX-License-Identifier: GPL-3.0-only

//! Clipboard and URL actions

use crate::errors::ActionError;
use futures::future::BoxFuture;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error, info};

/// Desktop integration used by the result panel
pub trait SystemActions: Send + Sync {
    /// Put `text` on the system clipboard
    fn write_text<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<(), ActionError>>;

    /// Hand `url` to the default handler without waiting for it
    fn open_url(&self, url: &str) -> Result<(), ActionError>;
}

/// Clipboard tools tried in order, with the arguments that make them read stdin
const CLIPBOARD_TOOLS: &[(&str, &[&str])] = &[
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["--clipboard", "--input"]),
    ("pbcopy", &[]),
];

/// Real desktop actions
///
/// The clipboard is written by piping into the first clipboard tool that
/// runs successfully. URLs go through the `open` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopActions;

impl DesktopActions {
    pub fn new() -> Self {
        Self
    }
}

impl SystemActions for DesktopActions {
    fn write_text<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<(), ActionError>> {
        Box::pin(async move {
            let mut failures = Vec::new();

            for (tool, args) in CLIPBOARD_TOOLS {
                match pipe_to(tool, args, text).await {
                    Ok(()) => {
                        info!(tool, len = text.len(), "Copied text to clipboard");
                        return Ok(());
                    }
                    Err(reason) => {
                        debug!(tool, %reason, "Clipboard tool unavailable");
                        failures.push(format!("{}: {}", tool, reason));
                    }
                }
            }

            error!("No clipboard tool accepted the text");
            Err(ActionError::ClipboardUnavailable(failures.join("; ")))
        })
    }

    fn open_url(&self, url: &str) -> Result<(), ActionError> {
        info!(url = %url, "Opening URL");
        open::that_detached(url).map_err(|e| {
            error!(url = %url, error = %e, "Failed to open URL");
            ActionError::OpenFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        })
    }
}

async fn pipe_to(tool: &str, args: &[&str], text: &str) -> Result<(), String> {
    let mut child = Command::new(tool)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| e.to_string())?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(text.as_bytes()).await.map_err(|e| e.to_string())?;
        // Closing stdin tells the tool the text is complete
        drop(stdin);
    }

    let status = child.wait().await.map_err(|e| e.to_string())?;
    if status.success() {
        Ok(())
    } else {
        Err(format!("exited with {}", status))
    }
}
