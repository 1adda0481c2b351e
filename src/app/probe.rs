// SPDX-License-Identifier: GPL-3.0-only

//! Supported barcode format probe

use crate::backends::detector::{BarcodeFormat, DetectorBackend};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Formats the detector supports, fetched once
///
/// A failed probe still populates the registry, with an empty list. Scans
/// started afterwards fail when the detector is constructed.
#[derive(Debug, Default)]
pub struct FormatRegistry {
    formats: OnceCell<Vec<BarcodeFormat>>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query `backend` unless a previous probe already did
    pub async fn probe(&self, backend: &dyn DetectorBackend) -> &[BarcodeFormat] {
        self.formats
            .get_or_init(|| async {
                match backend.supported_formats().await {
                    Ok(formats) => {
                        info!(
                            detector = %backend.kind(),
                            count = formats.len(),
                            "Supported barcode formats probed"
                        );
                        formats
                    }
                    Err(e) => {
                        warn!(detector = %backend.kind(), error = %e, "Barcode format probe failed");
                        Vec::new()
                    }
                }
            })
            .await
    }

    /// Probed formats, empty before the probe completes
    pub fn formats(&self) -> &[BarcodeFormat] {
        self.formats.get().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_probed(&self) -> bool {
        self.formats.initialized()
    }
}

/// Reveal formats one at a time, the i-th at `i * delay` after the call
pub async fn staggered_reveal<F>(formats: &[BarcodeFormat], delay: Duration, mut reveal: F)
where
    F: FnMut(usize, BarcodeFormat),
{
    let start = Instant::now();
    for (i, format) in formats.iter().copied().enumerate() {
        tokio::time::sleep_until(start + delay * i as u32).await;
        debug!(index = i, %format, "Revealing format");
        reveal(i, format);
    }
}
