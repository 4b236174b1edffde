// SPDX-License-Identifier: GPL-3.0-only

//! Messages exchanged between the overlay, the capture coordinator and the rendering helper.
//!
//! Each component has exactly one inbox and dispatches on one of the enums below.
//! Request/response pairs carry a `oneshot` sender for the reply.

use std::path::PathBuf;

use tokio::sync::oneshot;

use crate::coordinator::CaptureReport;
use crate::error::{CaptureError, CropError, DownloadError};
use crate::geometry::CaptureContext;
use crate::screenshot::{CroppedImage, RawScreenshot};

/// Which isolated context handles a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Coordinator,
    RenderingHelper,
}

/// Reply channels of a confirmed selection.
///
/// `captured` fires once the raw screenshot exists, so the page may show progress UI
/// without it ending up in the capture. `done` carries the final outcome.
#[derive(Debug, Default)]
pub struct CaptureResponder {
    pub captured: Option<oneshot::Sender<()>>,
    pub done: Option<oneshot::Sender<Result<CaptureReport, CaptureError>>>,
}

impl CaptureResponder {
    /// A responder nobody listens to (fire-and-forget dispatch).
    #[must_use]
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn captured(&mut self) {
        if let Some(tx) = self.captured.take() {
            let _ = tx.send(());
        }
    }

    pub fn finish(mut self, result: Result<CaptureReport, CaptureError>) {
        if let Some(tx) = self.done.take() {
            // The requester may have stopped waiting.
            let _ = tx.send(result);
        }
    }
}

#[derive(Debug)]
pub enum CoordinatorMessage {
    CaptureVisible {
        reply: oneshot::Sender<Result<RawScreenshot, CaptureError>>,
    },
    /// Capture the visible viewport and keep it uncropped as the current result
    CaptureVisibleToSlot {
        reply: oneshot::Sender<Result<CroppedImage, CaptureError>>,
    },
    SelectionConfirmed {
        context: CaptureContext,
        responder: CaptureResponder,
    },
    GetCurrentResult {
        reply: oneshot::Sender<Option<CroppedImage>>,
    },
    ClearCurrentResult,
    SaveCurrentResult {
        reply: oneshot::Sender<Result<PathBuf, DownloadError>>,
    },
}

impl CoordinatorMessage {
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            Self::CaptureVisible { .. } => "captureVisible",
            Self::CaptureVisibleToSlot { .. } => "captureEntireScreen",
            Self::SelectionConfirmed { .. } => "selectionConfirmed",
            Self::GetCurrentResult { .. } => "getCurrentResult",
            Self::ClearCurrentResult => "clearCurrentResult",
            Self::SaveCurrentResult { .. } => "downloadScreenshot",
        }
    }

    #[must_use]
    pub fn target(&self) -> Target {
        Target::Coordinator
    }
}

/// Payload of a crop request.
#[derive(Debug, Clone)]
pub struct CropRequest {
    pub raw: RawScreenshot,
    pub context: CaptureContext,
}

#[derive(Debug)]
pub enum HelperMessage {
    CropRequest {
        request: CropRequest,
        /// The `cropResult` answer
        reply: oneshot::Sender<Result<CroppedImage, CropError>>,
    },
}

impl HelperMessage {
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            Self::CropRequest { .. } => "cropRequest",
        }
    }

    #[must_use]
    pub fn target(&self) -> Target {
        Target::RenderingHelper
    }
}
