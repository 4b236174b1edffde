// SPDX-License-Identifier: GPL-3.0-only

use std::{io, path::PathBuf, time::Duration};

/// Failure to obtain the raw screenshot. Fatal for the current capture cycle.
///
/// The primary purpose of `to_user_facing` is to provide simple messages for notifications.
#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    /// The host refused the screenshot request
    #[error("screenshot permission denied: {0}")]
    PermissionDenied(String),
    /// Nothing to capture: no backend available or no visible target
    #[error("no active capture target")]
    NoActiveTarget,
    /// Screenshot errors from the portal or D-Bus
    #[error("portal error: {0}")]
    Portal(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl CaptureError {
    /// Condensed error message for end users
    #[must_use]
    pub fn to_user_facing(&self) -> String {
        match self {
            Self::PermissionDenied(msg) if msg.is_empty() => {
                "Screenshot permission was denied".to_string()
            }
            Self::PermissionDenied(msg) => format!("Screenshot permission was denied: {msg}"),
            Self::NoActiveTarget => "There is nothing to capture right now".to_string(),
            Self::Portal(_) | Self::Io(_) => "Taking the screenshot failed".to_string(),
        }
    }

    #[must_use]
    pub fn permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }
}

impl From<ashpd::Error> for CaptureError {
    fn from(value: ashpd::Error) -> Self {
        use ashpd::{desktop::ResponseError, PortalError};

        match value {
            ashpd::Error::Response(ResponseError::Cancelled) => {
                Self::PermissionDenied("request cancelled".to_string())
            }
            ashpd::Error::Portal(PortalError::NotAllowed(msg)) => Self::PermissionDenied(msg),
            ashpd::Error::Portal(PortalError::Cancelled(msg)) => Self::PermissionDenied(msg),
            other => Self::Portal(other.to_string()),
        }
    }
}

/// Failure inside the rendering helper. Always recovered by falling back to the raw screenshot.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CropError {
    #[error(
        "crop window ({},{},{},{}) is empty inside a {}x{} image",
        window.0, window.1, window.2, window.3, image_size.0, image_size.1
    )]
    InvalidRect {
        window: (i64, i64, i64, i64),
        image_size: (u32, u32),
    },
    #[error("drawing the crop failed: {0}")]
    DrawFailed(String),
}

/// Why the coordinator could not get a cropped image out of a rendering helper.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum HelperError {
    #[error("rendering helper unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Crop(#[from] CropError),
}

/// Failure to write the current result through the download primitive.
#[derive(thiserror::Error, Debug)]
pub enum DownloadError {
    #[error("there is no screenshot to save")]
    NothingToSave,
    /// Invalid directory path passed AND no Pictures XDG directory
    #[error("{}", missing_dir_message(.0))]
    MissingSaveDirectory(Option<PathBuf>),
    /// Screenshot exists but cannot be written
    #[error("{context}: {error}")]
    Write {
        error: io::Error,
        context: &'static str,
    },
    /// The coordinator went away before answering
    #[error("capture coordinator is not running")]
    Disconnected,
}

fn missing_dir_message(path: &Option<PathBuf>) -> String {
    path.as_deref()
        .map(|path| format!("opening `{}` or the Pictures directory", path.display()))
        .unwrap_or_else(|| "opening Pictures directory".to_string())
}

impl DownloadError {
    #[must_use]
    pub fn to_user_facing(&self) -> String {
        match self {
            Self::NothingToSave => "Take a screenshot before saving".to_string(),
            Self::MissingSaveDirectory(_) => "No folder is available to save screenshots".to_string(),
            Self::Write { .. } | Self::Disconnected => {
                "There was an error downloading your screenshot.".to_string()
            }
        }
    }
}

/// Outcome of waiting on a dispatched selection from the page side.
#[derive(thiserror::Error, Debug)]
pub enum PendingError {
    #[error("no response from the capture coordinator within {0:?}")]
    TimedOut(Duration),
    #[error("capture coordinator dropped the request")]
    Disconnected,
    #[error(transparent)]
    Capture(#[from] CaptureError),
}
