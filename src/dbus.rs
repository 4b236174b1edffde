// SPDX-License-Identifier: GPL-3.0-only

use crate::coordinator::CoordinatorHandle;
use crate::error::PendingError;
use crate::geometry::{CaptureContext, PageMetrics, ScrollOffset, SelectionRect, ViewportSize};
use crate::screenshot::ScreenshotManager;
use crate::settings::APP_ID;
use std::collections::HashMap;
use zbus::{connection, fdo, interface, zvariant::Value, Connection};

pub struct CaptureService {
    coordinator: CoordinatorHandle,
    screenshots: ScreenshotManager,
}

impl CaptureService {
    #[must_use]
    pub fn new(coordinator: CoordinatorHandle, screenshots: ScreenshotManager) -> Self {
        Self {
            coordinator,
            screenshots,
        }
    }
}

fn failed(err: impl std::fmt::Display) -> fdo::Error {
    fdo::Error::Failed(err.to_string())
}

fn pending_failed(err: PendingError) -> fdo::Error {
    match err {
        PendingError::Capture(err) => failed(format!("Screenshot failed: {}", err.to_user_facing())),
        other => failed(other),
    }
}

#[interface(name = "io.github.RegionSnap")]
impl CaptureService {
    /// Capture the visible viewport
    ///
    /// # Returns
    /// PNG image data of the whole viewport
    async fn capture_visible(&self) -> fdo::Result<Vec<u8>> {
        let raw = self.coordinator.capture_visible().await.map_err(pending_failed)?;
        Ok(raw.as_bytes().to_vec())
    }

    /// Capture the visible viewport and keep it as the current result
    async fn capture_entire_screen(&self) -> fdo::Result<Vec<u8>> {
        let image = self
            .coordinator
            .capture_visible_to_slot()
            .await
            .map_err(pending_failed)?;
        Ok(image.into_bytes())
    }

    /// Capture a region of the viewport
    ///
    /// # Arguments
    /// * `left`, `top`, `width`, `height` - Selection in viewport pixels
    /// * `viewport_width`, `viewport_height` - Logical viewport size
    /// * `scroll_x`, `scroll_y` - Page scroll offset
    /// * `device_pixel_ratio` - Device pixel ratio of the page
    ///
    /// # Returns
    /// A dictionary containing:
    /// * `image_data` - PNG image data of the region, or of the whole viewport on fallback
    /// * `cropped` - Whether the crop succeeded
    /// * `fallback_reason` - Why the whole viewport was kept (optional)
    #[allow(clippy::too_many_arguments)]
    async fn capture_region(
        &self,
        left: f64,
        top: f64,
        width: f64,
        height: f64,
        viewport_width: f64,
        viewport_height: f64,
        scroll_x: f64,
        scroll_y: f64,
        device_pixel_ratio: f64,
    ) -> fdo::Result<HashMap<String, Value<'static>>> {
        let context = CaptureContext::new(
            SelectionRect::new(left, top, width, height),
            PageMetrics {
                scroll: ScrollOffset {
                    x: scroll_x,
                    y: scroll_y,
                },
                device_pixel_ratio,
                viewport: ViewportSize::new(viewport_width, viewport_height),
            },
        );

        let report = self
            .coordinator
            .capture_region(context)
            .await
            .map_err(pending_failed)?;

        let mut response = HashMap::new();
        response.insert("cropped".to_string(), Value::Bool(report.is_cropped()));
        if let Some(reason) = &report.fallback {
            response.insert(
                "fallback_reason".to_string(),
                Value::Str(reason.to_string().into()),
            );
        }
        response.insert(
            "image_data".to_string(),
            Value::Array(report.image.into_bytes().into()),
        );

        Ok(response)
    }

    /// Get the current result without clearing it
    ///
    /// # Returns
    /// PNG image data, empty if there is no result
    async fn get_current_result(&self) -> fdo::Result<Vec<u8>> {
        Ok(self
            .coordinator
            .current_result()
            .await
            .map(|image| image.into_bytes())
            .unwrap_or_default())
    }

    async fn clear_current_result(&self) -> fdo::Result<()> {
        self.coordinator.clear_current_result();
        Ok(())
    }

    /// Save the current result
    ///
    /// # Returns
    /// Path of the written file
    async fn save_current_result(&self) -> fdo::Result<String> {
        let path = self
            .coordinator
            .save_current_result()
            .await
            .map_err(|err| failed(err.to_user_facing()))?;
        Ok(path.to_string_lossy().into_owned())
    }

    /// Get available screenshot backends
    async fn get_available_backends(&self) -> fdo::Result<Vec<String>> {
        Ok(self.screenshots.get_available_grabbers().await)
    }
}

/// Keeps the bus name owned while alive
pub struct CaptureServiceInterface {
    _connection: Connection,
}

impl CaptureServiceInterface {
    /// Create a new D-Bus service interface
    #[allow(clippy::missing_errors_doc)]
    pub async fn new(service: CaptureService) -> zbus::Result<Self> {
        let object_path = format!("/{}", APP_ID.replace('.', "/"));
        let connection = connection::Builder::session()?
            .name(APP_ID)?
            .serve_at(object_path.as_str(), service)?
            .build()
            .await?;

        Ok(Self {
            _connection: connection,
        })
    }

    /// Run the D-Bus service until SIGTERM or SIGINT
    #[allow(clippy::missing_errors_doc)]
    pub async fn run(&self) -> zbus::Result<()> {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;

        log::info!("D-Bus service running as {APP_ID}");

        tokio::select! {
            _ = sigterm.recv() => {
                log::info!("Received SIGTERM, shutting down");
            },
            _ = sigint.recv() => {
                log::info!("Received SIGINT, shutting down");
            },
        }

        Ok(())
    }
}
