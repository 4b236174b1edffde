// SPDX-License-Identifier: GPL-3.0-only

//! Capture coordinator
//!
//! Owns the screenshot primitive and the single "current result" slot. Region captures
//! are cropped by a rendering helper; when the helper cannot deliver, the uncropped
//! screenshot becomes the result instead.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::download::{screenshot_filename, Downloader};
use crate::error::{CaptureError, DownloadError, HelperError, PendingError};
use crate::error_handling::report_success;
use crate::geometry::CaptureContext;
use crate::helper::{HelperHandle, HelperHost};
use crate::messages::{CaptureResponder, CoordinatorMessage, CropRequest};
use crate::overlay::PendingCapture;
use crate::screenshot::{CroppedImage, RawScreenshot, ScreenshotManager};

/// Result of one region capture cycle.
#[derive(Debug)]
pub struct CaptureReport {
    pub image: CroppedImage,
    /// Why the raw screenshot was kept instead of a crop
    pub fallback: Option<HelperError>,
}

impl CaptureReport {
    #[must_use]
    pub fn is_cropped(&self) -> bool {
        self.fallback.is_none()
    }
}

/// Single-slot store for the latest result. Last write wins.
#[derive(Default)]
pub struct ResultSlot {
    current: Mutex<Option<CroppedImage>>,
}

impl ResultSlot {
    #[must_use]
    pub fn get(&self) -> Option<CroppedImage> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set(&self, image: CroppedImage) {
        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(image);
        if previous.is_some() {
            log::debug!("replacing an unretrieved result");
        }
    }

    pub fn clear(&self) {
        self.current.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

pub struct CaptureCoordinator {
    screenshots: ScreenshotManager,
    helpers: Arc<dyn HelperHost>,
    downloader: Arc<dyn Downloader>,
    /// Helper of the running cycle. The lock also keeps cycles from interleaving.
    helper: tokio::sync::Mutex<Option<HelperHandle>>,
    slot: ResultSlot,
    settle_delay: Duration,
}

impl CaptureCoordinator {
    #[must_use]
    pub fn new(
        screenshots: ScreenshotManager,
        helpers: Arc<dyn HelperHost>,
        downloader: Arc<dyn Downloader>,
    ) -> Self {
        Self {
            screenshots,
            helpers,
            downloader,
            helper: tokio::sync::Mutex::new(None),
            slot: ResultSlot::default(),
            settle_delay: Duration::ZERO,
        }
    }

    /// Time to wait before capturing, so the page can repaint without the overlay.
    #[must_use]
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Takes a screenshot of the visible viewport
    ///
    /// # Errors
    /// Returns `CaptureError` if the host refuses or nothing can be captured
    pub async fn capture_visible(&self) -> Result<RawScreenshot, CaptureError> {
        self.screenshots.capture_visible().await.inspect_err(|err| {
            crate::report_error!("Screenshot Failed", &err.to_user_facing());
        })
    }

    /// Captures the visible viewport and stores it uncropped as the current result
    ///
    /// # Errors
    /// Returns `CaptureError` if capturing fails; the slot is left untouched then
    pub async fn capture_visible_to_slot(&self) -> Result<CroppedImage, CaptureError> {
        let image = CroppedImage::uncropped(self.capture_visible().await?);
        self.slot.set(image.clone());
        Ok(image)
    }

    /// Captures the viewport and crops it to the selection in `context`
    ///
    /// # Errors
    /// Only a failed capture is an error. Crop problems fall back to the raw screenshot
    /// and are reported through `CaptureReport::fallback`.
    pub async fn capture_region(&self, context: CaptureContext) -> Result<CaptureReport, CaptureError> {
        self.run_cycle(context, &mut CaptureResponder::detached()).await
    }

    async fn run_cycle(
        &self,
        context: CaptureContext,
        responder: &mut CaptureResponder,
    ) -> Result<CaptureReport, CaptureError> {
        let mut helper_slot = self.helper.lock().await;

        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }
        let raw = self.capture_visible().await?;
        responder.captured();

        if let Some(stale) = helper_slot.take() {
            log::debug!("helper {} left over from an interrupted cycle", stale.id());
            stale.teardown();
        }

        let cropped = match self.helpers.acquire().await {
            Ok(helper) => {
                let helper = helper_slot.insert(helper);
                let request = CropRequest {
                    raw: raw.clone(),
                    context,
                };
                let result = helper.crop(request).await;
                if let Some(helper) = helper_slot.take() {
                    helper.teardown();
                }
                result
            }
            Err(err) => Err(err),
        };

        let report = match cropped {
            Ok(image) => CaptureReport {
                image,
                fallback: None,
            },
            Err(reason) => {
                log::warn!("keeping the full screenshot, crop unavailable: {reason}");
                CaptureReport {
                    image: CroppedImage::uncropped(raw),
                    fallback: Some(reason),
                }
            }
        };
        log::info!(
            "region capture done: {} bytes{}",
            report.image.len(),
            if report.is_cropped() { "" } else { " (uncropped)" }
        );

        self.slot.set(report.image.clone());
        Ok(report)
    }

    #[must_use]
    pub fn current_result(&self) -> Option<CroppedImage> {
        self.slot.get()
    }

    pub fn clear_current_result(&self) {
        self.slot.clear();
    }

    /// Writes the current result through the download primitive
    ///
    /// # Errors
    /// Returns `DownloadError::NothingToSave` for an empty slot, or the downloader's error
    pub async fn save_current_result(&self) -> Result<PathBuf, DownloadError> {
        let Some(image) = self.current_result() else {
            return Err(DownloadError::NothingToSave);
        };

        let filename = screenshot_filename(Utc::now());
        match self.downloader.download(image.as_bytes(), &filename).await {
            Ok(path) => {
                report_success(
                    "Screenshot Saved",
                    &format!("Your screenshot has been saved to {}", path.display()),
                );
                Ok(path)
            }
            Err(err) => {
                crate::report_error!("Download Failed", &err.to_user_facing());
                Err(err)
            }
        }
    }

    /// Starts the message router on the current runtime.
    #[must_use]
    pub fn spawn(self) -> CoordinatorHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(Arc::new(self).run(rx));
        CoordinatorHandle::new(tx)
    }

    /// Message router. Requests that wait on the screenshot, the helper or the disk run
    /// on their own task, so the slot stays readable meanwhile; a newer selection aborts
    /// the older region cycle.
    pub async fn run(self: Arc<Self>, mut inbox: mpsc::UnboundedReceiver<CoordinatorMessage>) {
        let mut in_flight: Option<JoinHandle<()>> = None;

        while let Some(message) = inbox.recv().await {
            log::debug!("{:?} handling {}", message.target(), message.action());
            match message {
                CoordinatorMessage::CaptureVisible { reply } => {
                    let coordinator = Arc::clone(&self);
                    tokio::spawn(async move {
                        let _ = reply.send(coordinator.capture_visible().await);
                    });
                }
                CoordinatorMessage::CaptureVisibleToSlot { reply } => {
                    let coordinator = Arc::clone(&self);
                    tokio::spawn(async move {
                        let _ = reply.send(coordinator.capture_visible_to_slot().await);
                    });
                }
                CoordinatorMessage::SelectionConfirmed { context, responder } => {
                    if let Some(previous) = in_flight.take() {
                        if !previous.is_finished() {
                            log::info!("new selection supersedes the capture in flight");
                            previous.abort();
                        }
                    }
                    let coordinator = Arc::clone(&self);
                    in_flight = Some(tokio::spawn(async move {
                        let mut responder = responder;
                        let result = coordinator.run_cycle(context, &mut responder).await;
                        responder.finish(result);
                    }));
                }
                CoordinatorMessage::GetCurrentResult { reply } => {
                    let _ = reply.send(self.current_result());
                }
                CoordinatorMessage::ClearCurrentResult => self.clear_current_result(),
                CoordinatorMessage::SaveCurrentResult { reply } => {
                    let coordinator = Arc::clone(&self);
                    tokio::spawn(async move {
                        let _ = reply.send(coordinator.save_current_result().await);
                    });
                }
            }
        }

        if let Some(task) = in_flight {
            let _ = task.await;
        }
        log::debug!("coordinator inbox closed");
    }
}

/// Sending side of the coordinator's inbox. Cheap to clone.
#[derive(Clone)]
pub struct CoordinatorHandle {
    inbox: mpsc::UnboundedSender<CoordinatorMessage>,
}

impl CoordinatorHandle {
    #[must_use]
    pub fn new(inbox: mpsc::UnboundedSender<CoordinatorMessage>) -> Self {
        Self { inbox }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> CoordinatorMessage,
    ) -> Option<T> {
        let (reply, response) = oneshot::channel();
        self.inbox.send(build(reply)).ok()?;
        response.await.ok()
    }

    /// Dispatches a confirmed selection and returns a handle on its outcome.
    #[must_use]
    pub fn confirm_selection(&self, context: CaptureContext) -> PendingCapture {
        let (responder, pending) = PendingCapture::channel();
        let message = CoordinatorMessage::SelectionConfirmed { context, responder };
        if self.inbox.send(message).is_err() {
            log::error!("capture coordinator is not running");
        }
        pending
    }

    /// # Errors
    /// See [`CaptureCoordinator::capture_region`]; `PendingError::Disconnected` if the
    /// coordinator is gone or the cycle was superseded
    pub async fn capture_region(&self, context: CaptureContext) -> Result<CaptureReport, PendingError> {
        self.confirm_selection(context).wait().await
    }

    /// # Errors
    /// See [`CaptureCoordinator::capture_visible`]
    pub async fn capture_visible(&self) -> Result<RawScreenshot, PendingError> {
        let result = self
            .request(|reply| CoordinatorMessage::CaptureVisible { reply })
            .await
            .ok_or(PendingError::Disconnected)?;
        Ok(result?)
    }

    /// # Errors
    /// See [`CaptureCoordinator::capture_visible_to_slot`]
    pub async fn capture_visible_to_slot(&self) -> Result<CroppedImage, PendingError> {
        let result = self
            .request(|reply| CoordinatorMessage::CaptureVisibleToSlot { reply })
            .await
            .ok_or(PendingError::Disconnected)?;
        Ok(result?)
    }

    pub async fn current_result(&self) -> Option<CroppedImage> {
        self.request(|reply| CoordinatorMessage::GetCurrentResult { reply })
            .await
            .flatten()
    }

    pub fn clear_current_result(&self) {
        let _ = self.inbox.send(CoordinatorMessage::ClearCurrentResult);
    }

    /// # Errors
    /// See [`CaptureCoordinator::save_current_result`]
    pub async fn save_current_result(&self) -> Result<PathBuf, DownloadError> {
        self.request(|reply| CoordinatorMessage::SaveCurrentResult { reply })
            .await
            .unwrap_or(Err(DownloadError::Disconnected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::DirectoryDownloader;
    use crate::geometry::{PageMetrics, ScrollOffset, SelectionRect, ViewportSize};
    use crate::helper::TaskHelperHost;
    use crate::screenshot::still_image::StillImageScreengrabber;
    use crate::screenshot::Screengrabber;
    use async_trait::async_trait;
    use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn png(width: u32, height: u32, shade: u8) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([shade, shade, shade, 255]));
        let mut data = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut data), ImageFormat::Png)
            .unwrap();
        data
    }

    fn context(rect: SelectionRect, width: f64, height: f64) -> CaptureContext {
        CaptureContext::new(
            rect,
            PageMetrics {
                scroll: ScrollOffset { x: 0.0, y: 120.0 },
                device_pixel_ratio: 1.0,
                viewport: ViewportSize::new(width, height),
            },
        )
    }

    fn coordinator_with(grabber: impl Screengrabber + 'static, helpers: Arc<dyn HelperHost>) -> CaptureCoordinator {
        CaptureCoordinator::new(
            ScreenshotManager::with_grabbers(vec![Box::new(grabber)]),
            helpers,
            Arc::new(DirectoryDownloader::default()),
        )
    }

    fn still(data: Vec<u8>) -> StillImageScreengrabber {
        StillImageScreengrabber::from_png_bytes(data)
    }

    struct NoHelpers;

    #[async_trait]
    impl HelperHost for NoHelpers {
        async fn acquire(&self) -> Result<HelperHandle, HelperError> {
            Err(HelperError::Unavailable("no rendering context".into()))
        }

        fn name(&self) -> &'static str {
            "none"
        }
    }

    #[tokio::test]
    async fn region_capture_stores_crop() {
        let coordinator = coordinator_with(still(png(200, 100, 40)), Arc::new(TaskHelperHost::new()));
        let report = coordinator
            .capture_region(context(SelectionRect::new(10.0, 10.0, 50.0, 20.0), 200.0, 100.0))
            .await
            .unwrap();

        assert!(report.is_cropped());
        let img = image::load_from_memory(report.image.as_bytes()).unwrap();
        assert_eq!(img.dimensions(), (50, 20));
        assert_eq!(coordinator.current_result(), Some(report.image));
    }

    #[tokio::test]
    async fn missing_helper_falls_back_to_raw() {
        let raw = png(64, 64, 90);
        let coordinator = coordinator_with(still(raw.clone()), Arc::new(NoHelpers));
        let report = coordinator
            .capture_region(context(SelectionRect::new(0.0, 0.0, 20.0, 20.0), 64.0, 64.0))
            .await
            .unwrap();

        assert!(matches!(report.fallback, Some(HelperError::Unavailable(_))));
        assert_eq!(report.image.as_bytes(), raw.as_slice());
        assert_eq!(coordinator.current_result().unwrap().as_bytes(), raw.as_slice());
    }

    #[tokio::test]
    async fn crop_error_falls_back_to_raw() {
        let raw = png(64, 64, 90);
        let coordinator = coordinator_with(still(raw.clone()), Arc::new(TaskHelperHost::new()));
        let report = coordinator
            .capture_region(context(SelectionRect::new(500.0, 500.0, 20.0, 20.0), 64.0, 64.0))
            .await
            .unwrap();

        assert!(matches!(report.fallback, Some(HelperError::Crop(_))));
        assert_eq!(report.image.as_bytes(), raw.as_slice());
    }

    #[tokio::test]
    async fn capture_failure_leaves_slot_untouched() {
        let coordinator = coordinator_with(still(Vec::new()), Arc::new(TaskHelperHost::new()));
        coordinator.slot.set(CroppedImage::from_png(vec![7]));

        let err = coordinator
            .capture_region(context(SelectionRect::new(0.0, 0.0, 20.0, 20.0), 64.0, 64.0))
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::NoActiveTarget));
        assert_eq!(coordinator.current_result().unwrap().as_bytes(), &[7]);
    }

    struct Sequence {
        frames: Vec<Vec<u8>>,
        next: AtomicUsize,
    }

    #[async_trait]
    impl Screengrabber for Sequence {
        async fn is_available(&self) -> bool {
            true
        }

        async fn capture_visible(&self) -> Result<RawScreenshot, CaptureError> {
            let i = self.next.fetch_add(1, Ordering::SeqCst);
            Ok(RawScreenshot::from_png(self.frames[i % self.frames.len()].clone()))
        }

        fn name(&self) -> &'static str {
            "sequence"
        }
    }

    #[tokio::test]
    async fn second_capture_replaces_first() {
        let grabber = Sequence {
            frames: vec![png(32, 32, 10), png(32, 32, 200)],
            next: AtomicUsize::new(0),
        };
        let coordinator = coordinator_with(grabber, Arc::new(TaskHelperHost::new()));
        let ctx = context(SelectionRect::new(0.0, 0.0, 16.0, 16.0), 32.0, 32.0);

        let first = coordinator.capture_region(ctx).await.unwrap();
        let second = coordinator.capture_region(ctx).await.unwrap();
        assert_ne!(first.image, second.image);

        let current = coordinator.current_result().unwrap();
        assert_eq!(current, second.image);
        let img = image::load_from_memory(current.as_bytes()).unwrap();
        assert_eq!(img.get_pixel(0, 0), Rgba([200, 200, 200, 255]));
    }

    #[tokio::test]
    async fn get_does_not_clear_but_clear_does() {
        let coordinator = coordinator_with(still(png(8, 8, 1)), Arc::new(TaskHelperHost::new()));
        coordinator.capture_visible_to_slot().await.unwrap();

        assert!(coordinator.current_result().is_some());
        assert!(coordinator.current_result().is_some());
        coordinator.clear_current_result();
        assert!(coordinator.current_result().is_none());
    }

    #[tokio::test]
    async fn save_writes_current_result() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = CaptureCoordinator::new(
            ScreenshotManager::with_grabbers(vec![Box::new(still(png(8, 8, 1)))]),
            Arc::new(TaskHelperHost::new()),
            Arc::new(DirectoryDownloader::new(Some(dir.path().to_path_buf()))),
        );

        assert!(matches!(
            coordinator.save_current_result().await,
            Err(DownloadError::NothingToSave)
        ));

        let image = coordinator.capture_visible_to_slot().await.unwrap();
        let path = coordinator.save_current_result().await.unwrap();
        assert_eq!(path.parent(), Some(dir.path()));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("screenshot_") && name.ends_with(".png"));
        assert!(!name.contains(':'));
        assert_eq!(std::fs::read(&path).unwrap(), image.as_bytes());
    }

    #[tokio::test]
    async fn router_serves_slot_requests() {
        let handle = coordinator_with(still(png(40, 40, 5)), Arc::new(TaskHelperHost::new())).spawn();
        assert!(handle.current_result().await.is_none());

        let report = handle
            .capture_region(context(SelectionRect::new(0.0, 0.0, 10.0, 10.0), 40.0, 40.0))
            .await
            .unwrap();
        assert!(report.is_cropped());
        assert_eq!(handle.current_result().await, Some(report.image));

        handle.clear_current_result();
        assert!(handle.current_result().await.is_none());
    }

    /// First capture never returns; later ones succeed.
    struct StallsOnce {
        frame: Vec<u8>,
        calls: AtomicUsize,
        stalled: Arc<Notify>,
    }

    #[async_trait]
    impl Screengrabber for StallsOnce {
        async fn is_available(&self) -> bool {
            true
        }

        async fn capture_visible(&self) -> Result<RawScreenshot, CaptureError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                self.stalled.notify_one();
                std::future::pending::<()>().await;
            }
            Ok(RawScreenshot::from_png(self.frame.clone()))
        }

        fn name(&self) -> &'static str {
            "stalls once"
        }
    }

    #[tokio::test]
    async fn newer_selection_supersedes_stalled_cycle() {
        let reached = Arc::new(Notify::new());
        let grabber = StallsOnce {
            frame: png(40, 40, 5),
            calls: AtomicUsize::new(0),
            stalled: reached.clone(),
        };
        let handle = coordinator_with(grabber, Arc::new(TaskHelperHost::new())).spawn();
        let ctx = context(SelectionRect::new(0.0, 0.0, 10.0, 10.0), 40.0, 40.0);

        let stalled = handle.confirm_selection(ctx);
        reached.notified().await;
        let report = handle.capture_region(ctx).await.unwrap();
        assert!(report.is_cropped());
        assert!(matches!(stalled.wait().await, Err(PendingError::Disconnected)));
    }

    #[tokio::test]
    async fn stalled_screenshot_does_not_block_slot_reads() {
        let reached = Arc::new(Notify::new());
        let grabber = StallsOnce {
            frame: png(40, 40, 5),
            calls: AtomicUsize::new(0),
            stalled: reached.clone(),
        };
        let coordinator = coordinator_with(grabber, Arc::new(TaskHelperHost::new()));
        coordinator.slot.set(CroppedImage::from_png(vec![7]));
        let handle = coordinator.spawn();

        let capture = tokio::spawn({
            let handle = handle.clone();
            async move { handle.capture_visible().await }
        });
        reached.notified().await;

        let current = tokio::time::timeout(Duration::from_secs(5), handle.current_result())
            .await
            .expect("slot read waited on the screenshot");
        assert_eq!(current, Some(CroppedImage::from_png(vec![7])));

        let ctx = context(SelectionRect::new(0.0, 0.0, 10.0, 10.0), 40.0, 40.0);
        let report = tokio::time::timeout(Duration::from_secs(5), handle.capture_region(ctx))
            .await
            .expect("selection waited on the screenshot")
            .unwrap();
        assert!(report.is_cropped());
        capture.abort();
    }

    /// First helper accepts the request but never answers.
    struct HangsOnce {
        acquired: Arc<Notify>,
        calls: AtomicUsize,
        parked: Mutex<Option<mpsc::Receiver<crate::messages::HelperMessage>>>,
        inner: TaskHelperHost,
    }

    #[async_trait]
    impl HelperHost for HangsOnce {
        async fn acquire(&self) -> Result<HelperHandle, HelperError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                let (tx, rx) = mpsc::channel(1);
                *self.parked.lock().unwrap() = Some(rx);
                self.acquired.notify_one();
                return Ok(HelperHandle::new(0, tx, None));
            }
            self.inner.acquire().await
        }

        fn name(&self) -> &'static str {
            "hangs once"
        }
    }

    #[tokio::test]
    async fn stale_helper_is_torn_down_by_next_cycle() {
        let acquired = Arc::new(Notify::new());
        let host = Arc::new(HangsOnce {
            acquired: acquired.clone(),
            calls: AtomicUsize::new(0),
            parked: Mutex::new(None),
            inner: TaskHelperHost::new(),
        });
        let handle = coordinator_with(still(png(40, 40, 5)), host.clone()).spawn();
        let ctx = context(SelectionRect::new(0.0, 0.0, 10.0, 10.0), 40.0, 40.0);

        let hung = handle.confirm_selection(ctx);
        acquired.notified().await;
        let report = handle.capture_region(ctx).await.unwrap();
        assert!(report.is_cropped());
        assert!(matches!(hung.wait().await, Err(PendingError::Disconnected)));

        let mut parked = host.parked.lock().unwrap().take().unwrap();
        let drained = tokio::time::timeout(Duration::from_secs(5), async {
            while parked.recv().await.is_some() {}
        })
        .await;
        assert!(drained.is_ok(), "stale helper inbox still open");
    }
}
