// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CaptureError;

/// PNG-encoded screenshot of the whole visible viewport, as produced by one capture call.
#[derive(Clone, PartialEq, Eq)]
pub struct RawScreenshot(Vec<u8>);

/// PNG-encoded image of the selected region. After a fallback it holds the uncropped
/// raw screenshot instead.
#[derive(Clone, PartialEq, Eq)]
pub struct CroppedImage(Vec<u8>);

impl RawScreenshot {
    #[must_use]
    pub fn from_png(data: Vec<u8>) -> Self {
        Self(data)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl CroppedImage {
    #[must_use]
    pub fn from_png(data: Vec<u8>) -> Self {
        Self(data)
    }

    /// The best-effort result when cropping is not possible.
    #[must_use]
    pub fn uncropped(raw: RawScreenshot) -> Self {
        Self(raw.0)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Image payloads are large; only their size is useful in logs.
impl std::fmt::Debug for RawScreenshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawScreenshot({} bytes)", self.0.len())
    }
}

impl std::fmt::Debug for CroppedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CroppedImage({} bytes)", self.0.len())
    }
}

/// The platform's single "screenshot of the visible viewport" primitive.
#[async_trait]
pub trait Screengrabber: Send + Sync {
    async fn is_available(&self) -> bool;

    async fn capture_visible(&self) -> Result<RawScreenshot, CaptureError>;

    fn name(&self) -> &'static str;
}

pub mod freedesktop_portal;
pub mod still_image;

#[derive(Clone)]
pub struct ScreenshotManager {
    grabbers: Arc<Vec<Box<dyn Screengrabber>>>,
}

impl Default for ScreenshotManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreenshotManager {
    #[must_use]
    pub fn new() -> Self {
        Self::with_grabbers(vec![Box::new(freedesktop_portal::PortalScreengrabber::new())])
    }

    /// Backends are tried in the given order.
    #[must_use]
    pub fn with_grabbers(grabbers: Vec<Box<dyn Screengrabber>>) -> Self {
        Self {
            grabbers: Arc::new(grabbers),
        }
    }

    /// Captures the visible viewport with the first backend that succeeds
    ///
    /// # Errors
    /// Returns `CaptureError::NoActiveTarget` if no backend is available, otherwise the
    /// error of the last backend that failed
    pub async fn capture_visible(&self) -> Result<RawScreenshot, CaptureError> {
        let mut last_error = None;
        for grabber in self.grabbers.iter() {
            if !grabber.is_available().await {
                log::debug!("screenshot backend {} not available", grabber.name());
                continue;
            }
            match grabber.capture_visible().await {
                Ok(raw) => {
                    log::debug!("{} captured {} bytes", grabber.name(), raw.len());
                    return Ok(raw);
                }
                // A refusal is the user's answer, not a backend defect.
                Err(err) if err.permission_denied() => return Err(err),
                Err(err) => {
                    log::warn!("Backend {} failed: {err}, trying next backend...", grabber.name());
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.unwrap_or(CaptureError::NoActiveTarget))
    }

    pub async fn get_available_grabbers(&self) -> Vec<String> {
        let mut available = Vec::new();
        for grabber in self.grabbers.iter() {
            if grabber.is_available().await {
                available.push(grabber.name().to_string());
            }
        }
        available
    }
}
