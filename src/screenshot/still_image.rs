// SPDX-License-Identifier: GPL-3.0-only

use super::{RawScreenshot, Screengrabber};
use crate::error::CaptureError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;

enum Source {
    File(PathBuf),
    Memory(Vec<u8>),
}

/// Serves a fixed PNG as the "visible viewport". Used for headless runs and tests.
pub struct StillImageScreengrabber {
    source: Source,
}

impl StillImageScreengrabber {
    #[must_use]
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            source: Source::File(path.into()),
        }
    }

    #[must_use]
    pub fn from_png_bytes(data: Vec<u8>) -> Self {
        Self {
            source: Source::Memory(data),
        }
    }
}

#[async_trait]
impl Screengrabber for StillImageScreengrabber {
    async fn is_available(&self) -> bool {
        match &self.source {
            Source::File(path) => tokio::fs::metadata(path).await.is_ok(),
            Source::Memory(data) => !data.is_empty(),
        }
    }

    async fn capture_visible(&self) -> Result<RawScreenshot, CaptureError> {
        match &self.source {
            Source::File(path) => match tokio::fs::read(path).await {
                Ok(data) => Ok(RawScreenshot::from_png(data)),
                Err(e) if e.kind() == ErrorKind::NotFound => Err(CaptureError::NoActiveTarget),
                Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                    Err(CaptureError::PermissionDenied(path.display().to_string()))
                }
                Err(e) => Err(CaptureError::Io(e)),
            },
            Source::Memory(data) => Ok(RawScreenshot::from_png(data.clone())),
        }
    }

    fn name(&self) -> &'static str {
        "Still Image"
    }
}
