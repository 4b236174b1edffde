// SPDX-License-Identifier: GPL-3.0-only

use super::{RawScreenshot, Screengrabber};
use crate::error::CaptureError;
use ashpd::desktop::screenshot::Screenshot;
use async_trait::async_trait;
use std::path::PathBuf;

/// Visible-screen capture through the XDG desktop portal.
pub struct PortalScreengrabber {
    _private: (),
}

impl Default for PortalScreengrabber {
    fn default() -> Self {
        Self::new()
    }
}

impl PortalScreengrabber {
    #[must_use]
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Reads the file the portal wrote and removes it; raw captures do not outlive the cycle.
    async fn take_file(path: PathBuf) -> Result<RawScreenshot, CaptureError> {
        let data = tokio::fs::read(&path).await?;
        if let Err(e) = tokio::fs::remove_file(&path).await {
            log::debug!("could not remove portal capture {}: {e}", path.display());
        }
        Ok(RawScreenshot::from_png(data))
    }
}

#[async_trait]
impl Screengrabber for PortalScreengrabber {
    async fn is_available(&self) -> bool {
        std::env::var_os("DBUS_SESSION_BUS_ADDRESS").is_some()
            || std::env::var_os("XDG_RUNTIME_DIR").is_some()
    }

    async fn capture_visible(&self) -> Result<RawScreenshot, CaptureError> {
        // Non-interactive mode captures the visible workspace without a dialog
        let response = Screenshot::request()
            .interactive(false)
            .modal(false)
            .send()
            .await?
            .response()?;

        let uri = response.uri();
        match uri.scheme() {
            "file" => {
                let path = uri
                    .to_file_path()
                    .map_err(|()| CaptureError::Portal(format!("Not a local file: {uri}")))?;
                Self::take_file(path).await
            }
            scheme => Err(CaptureError::Portal(format!("Unsupported scheme: {scheme}"))),
        }
    }

    fn name(&self) -> &'static str {
        "Freedesktop Portal"
    }
}
