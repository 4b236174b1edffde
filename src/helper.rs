// SPDX-License-Identifier: GPL-3.0-only

//! Rendering helper: the isolated context that decodes a raw screenshot and cuts the
//! selection out of it.
//!
//! The coordinator never decodes images itself. It acquires a helper through a
//! [`HelperHost`], sends it a `cropRequest` and waits for the `cropResult`.

use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use image::ImageFormat;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{CropError, HelperError};
use crate::geometry::{CaptureContext, CropWindow};
use crate::messages::{CropRequest, HelperMessage};
use crate::screenshot::{CroppedImage, RawScreenshot};

/// Scale between the captured raster and the logical viewport.
///
/// The screenshot primitive already captures at device resolution, so the device pixel
/// ratio is only consulted when the viewport width is unknown.
#[must_use]
pub fn scale_ratio(image_width: u32, ctx: &CaptureContext) -> f64 {
    if ctx.viewport.width > 0.0 {
        f64::from(image_width) / ctx.viewport.width
    } else if ctx.device_pixel_ratio > 0.0 {
        ctx.device_pixel_ratio
    } else {
        1.0
    }
}

#[allow(clippy::cast_possible_truncation)]
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Maps the selection in `ctx` onto the pixels of an image of `image_size`.
///
/// # Errors
/// Returns `CropError::InvalidRect` when nothing of the selection is left inside the image.
pub fn crop_window(ctx: &CaptureContext, image_size: (u32, u32)) -> Result<CropWindow, CropError> {
    let (image_width, image_height) = image_size;
    let ratio = scale_ratio(image_width, ctx);
    if !ctx.rect.is_finite() || !ratio.is_finite() {
        return Err(CropError::InvalidRect {
            window: (0, 0, 0, 0),
            image_size,
        });
    }

    let mut x = round_half_up(ctx.rect.left * ratio);
    let mut y = round_half_up(ctx.rect.top * ratio);
    let mut width = round_half_up(ctx.rect.width * ratio);
    let mut height = round_half_up(ctx.rect.height * ratio);

    // A negative origin eats into the extent instead of shifting the window.
    if x < 0 {
        width = width.saturating_add(x);
        x = 0;
    }
    if y < 0 {
        height = height.saturating_add(y);
        y = 0;
    }
    width = width.min(i64::from(image_width) - x);
    height = height.min(i64::from(image_height) - y);

    if width <= 0 || height <= 0 {
        return Err(CropError::InvalidRect {
            window: (x, y, width, height),
            image_size,
        });
    }

    // 0 <= x < image_width here, and likewise for the other three
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let window = CropWindow {
        x: x as u32,
        y: y as u32,
        width: width as u32,
        height: height as u32,
    };
    Ok(window)
}

/// Cuts the selection out of `raw` and re-encodes it as PNG.
///
/// # Errors
/// `CropError::InvalidRect` for an empty window, `CropError::DrawFailed` when the raw
/// screenshot cannot be decoded or the crop cannot be encoded.
pub fn crop(raw: &RawScreenshot, ctx: &CaptureContext) -> Result<CroppedImage, CropError> {
    let img = image::load_from_memory(raw.as_bytes())
        .map_err(|e| CropError::DrawFailed(format!("decoding screenshot: {e}")))?;
    let window = crop_window(ctx, (img.width(), img.height()))?;
    log::debug!(
        "crop {}x{} image at ratio {:.3}: {:?} -> {window}",
        img.width(),
        img.height(),
        scale_ratio(img.width(), ctx),
        ctx.rect
    );

    if window.x == 0 && window.y == 0 && window.width == img.width() && window.height == img.height() {
        return Ok(CroppedImage::uncropped(raw.clone()));
    }

    let cropped = img.crop_imm(window.x, window.y, window.width, window.height);
    let mut png = Vec::new();
    cropped
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| CropError::DrawFailed(format!("encoding crop: {e}")))?;

    Ok(CroppedImage::from_png(png))
}

/// The helper's event loop. Lives until its inbox closes or its task is aborted.
pub struct RenderingHelper {
    inbox: mpsc::Receiver<HelperMessage>,
}

impl RenderingHelper {
    #[must_use]
    pub fn new(inbox: mpsc::Receiver<HelperMessage>) -> Self {
        Self { inbox }
    }

    pub async fn run(mut self) {
        while let Some(message) = self.inbox.recv().await {
            log::debug!("{:?} handling {}", message.target(), message.action());
            match message {
                HelperMessage::CropRequest { request, reply } => {
                    let result = tokio::task::spawn_blocking(move || crop(&request.raw, &request.context))
                        .await
                        .unwrap_or_else(|e| Err(CropError::DrawFailed(format!("crop task failed: {e}"))));
                    if reply.send(result).is_err() {
                        log::debug!("crop result dropped, requester is gone");
                    }
                }
            }
        }
        log::debug!("rendering helper inbox closed");
    }
}

/// Connection to one running rendering helper. Dropping it tears the helper down.
pub struct HelperHandle {
    id: u64,
    inbox: mpsc::Sender<HelperMessage>,
    task: Option<JoinHandle<()>>,
}

impl HelperHandle {
    #[must_use]
    pub fn new(id: u64, inbox: mpsc::Sender<HelperMessage>, task: Option<JoinHandle<()>>) -> Self {
        Self { id, inbox, task }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Sends a `cropRequest` and waits for the `cropResult`.
    ///
    /// # Errors
    /// `HelperError::Unavailable` when the helper is gone, `HelperError::Crop` when it
    /// reported a crop failure.
    pub async fn crop(&self, request: CropRequest) -> Result<CroppedImage, HelperError> {
        let (reply, response) = oneshot::channel();
        self.inbox
            .send(HelperMessage::CropRequest { request, reply })
            .await
            .map_err(|_| HelperError::Unavailable(format!("helper {} inbox closed", self.id)))?;

        let result = response
            .await
            .map_err(|_| HelperError::Unavailable(format!("helper {} exited without answering", self.id)))?;
        Ok(result?)
    }

    pub fn teardown(self) {
        log::debug!("tearing down rendering helper {}", self.id);
    }
}

impl Drop for HelperHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for HelperHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HelperHandle").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Creates rendering helpers on demand.
#[async_trait]
pub trait HelperHost: Send + Sync {
    /// # Errors
    /// `HelperError::Unavailable` when no helper can be started
    async fn acquire(&self) -> Result<HelperHandle, HelperError>;

    fn name(&self) -> &'static str;
}

/// Runs each helper as its own tokio task.
pub struct TaskHelperHost {
    next_id: AtomicU64,
}

impl Default for TaskHelperHost {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskHelperHost {
    const INBOX_CAPACITY: usize = 4;

    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl HelperHost for TaskHelperHost {
    async fn acquire(&self) -> Result<HelperHandle, HelperError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(Self::INBOX_CAPACITY);
        let task = tokio::spawn(RenderingHelper::new(rx).run());
        log::debug!("started rendering helper {id}");
        Ok(HelperHandle::new(id, tx, Some(task)))
    }

    fn name(&self) -> &'static str {
        "tokio task"
    }
}
