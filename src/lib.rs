// SPDX-License-Identifier: GPL-3.0-only

//! Region screenshots for web pages
//!
//! A selector overlay lets the user drag a rectangle over the page, the capture
//! coordinator takes a screenshot of the visible viewport and a rendering helper crops it
//! to the selection. The three components only talk through messages.

pub mod geometry;
pub mod error;
pub mod error_handling;
pub mod notifications;
pub mod screenshot;
pub mod messages;
pub mod helper;
pub mod download;
pub mod coordinator;
pub mod overlay;
pub mod settings;
pub mod dbus;

// Re-export main types for easier usage
pub use coordinator::{CaptureCoordinator, CaptureReport, CoordinatorHandle, ResultSlot};
pub use error::{CaptureError, CropError, DownloadError, HelperError, PendingError};
pub use geometry::{CaptureContext, CropWindow, PageMetrics, Point, SelectionRect, ViewportSize};
pub use helper::{crop, crop_window, HelperHost, TaskHelperHost};
pub use overlay::{
    HeadlessSurface, OverlayEvent, OverlayOutcome, OverlayState, PageSurface, PendingCapture,
    SelectorOverlay,
};
pub use screenshot::{CroppedImage, RawScreenshot, Screengrabber, ScreenshotManager};

/// The current version of the region-snap library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commit the crate was built from, when built from a git checkout
pub const GIT_SHA: Option<&str> = option_env!("VERGEN_GIT_SHA");
