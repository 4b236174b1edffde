// SPDX-License-Identifier: GPL-3.0-only

use clap::{ArgAction, Parser, Subcommand};
use region_snap::dbus::{CaptureService, CaptureServiceInterface};
use region_snap::download::DirectoryDownloader;
use region_snap::error_handling::set_notifications_enabled;
use region_snap::notifications::init_notification_manager;
use region_snap::overlay::{HeadlessSurface, OverlayEvent, OverlayOutcome, SelectorOverlay};
use region_snap::screenshot::still_image::StillImageScreengrabber;
use region_snap::settings::{CaptureSettings, SettingsManager};
use region_snap::{
    CaptureCoordinator, CoordinatorHandle, PageMetrics, ScreenshotManager, SelectionRect,
    TaskHelperHost, ViewportSize,
};
use region_snap::geometry::ScrollOffset;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
struct Args {
    /// Send a notification when a screenshot is saved or fails [default: from settings]
    #[clap(long,
        default_missing_value("true"),
        num_args(0..=1),
        require_equals(true),
        action = ArgAction::Set)]
    notify: Option<bool>,
    /// Offer the last confirmed region again when `region` gets no rectangle [default: from settings]
    #[clap(long,
        default_missing_value("true"),
        num_args(0..=1),
        require_equals(true),
        action = ArgAction::Set)]
    remember_selection: Option<bool>,
    /// The directory to save the screenshot to [default: from settings]
    #[clap(short, long)]
    save_dir: Option<PathBuf>,
    /// Use this PNG as the visible viewport instead of asking the screenshot portal
    #[clap(long)]
    source: Option<PathBuf>,
    /// More output, repeat for debug logs
    #[clap(short, long, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Capture the visible viewport and save it
    Visible,
    /// Select a region, capture it and save the crop.
    /// Without a rectangle the remembered selection is confirmed
    Region(RegionArgs),
    /// Serve the capture pipeline on the session bus
    Serve,
}

#[derive(clap::Args, Debug, Clone)]
struct RegionArgs {
    #[clap(long, allow_hyphen_values = true, requires_all = ["top", "width", "height"])]
    left: Option<f64>,
    #[clap(long, allow_hyphen_values = true, requires_all = ["left", "width", "height"])]
    top: Option<f64>,
    #[clap(long, requires_all = ["left", "top", "height"])]
    width: Option<f64>,
    #[clap(long, requires_all = ["left", "top", "width"])]
    height: Option<f64>,
    /// Logical viewport size as WIDTHxHEIGHT; without it the crop scales by --dpr.
    /// Needed to check that a remembered selection still fits
    #[clap(long, value_parser = parse_viewport, required_unless_present = "left")]
    viewport: Option<ViewportSize>,
    #[clap(long, default_value_t = 0.0)]
    scroll_x: f64,
    #[clap(long, default_value_t = 0.0)]
    scroll_y: f64,
    /// Device pixel ratio of the page
    #[clap(long, default_value_t = 1.0)]
    dpr: f64,
}

impl RegionArgs {
    fn rect(&self) -> Option<SelectionRect> {
        Some(SelectionRect::new(self.left?, self.top?, self.width?, self.height?))
    }

    fn metrics(&self) -> PageMetrics {
        PageMetrics {
            scroll: ScrollOffset {
                x: self.scroll_x,
                y: self.scroll_y,
            },
            device_pixel_ratio: self.dpr,
            viewport: self.viewport.unwrap_or_default(),
        }
    }
}

fn parse_viewport(value: &str) -> Result<ViewportSize, String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {value:?}"))?;
    let width: f64 = width.trim().parse().map_err(|e| format!("bad width: {e}"))?;
    let height: f64 = height.trim().parse().map_err(|e| format!("bad height: {e}"))?;
    Ok(ViewportSize::new(width, height))
}

fn load_settings() -> (Option<SettingsManager>, CaptureSettings) {
    match SettingsManager::new() {
        Ok(manager) => {
            let settings = manager.settings.clone();
            (Some(manager), settings)
        }
        Err(e) => {
            log::warn!("settings unavailable, using defaults: {e}");
            (None, CaptureSettings::default())
        }
    }
}

async fn save(coordinator: &CoordinatorHandle) -> Result<(), String> {
    let path = coordinator
        .save_current_result()
        .await
        .map_err(|e| e.to_user_facing())?;
    println!("{}", path.display());
    Ok(())
}

async fn capture_region(
    coordinator: &CoordinatorHandle,
    region: &RegionArgs,
    settings: &CaptureSettings,
    manager: Option<&mut SettingsManager>,
) -> Result<(), String> {
    let surface = HeadlessSurface::new(region.metrics());
    let overlay = SelectorOverlay::new(surface, coordinator.clone())
        .with_min_selection_size(settings.min_selection_size);

    let (overlay, outcome) = match region.rect() {
        Some(rect) => {
            let mut overlay = overlay;
            let outcome = overlay.select_rect(rect);
            (overlay, outcome)
        }
        None => {
            let mut overlay = overlay.with_remembered(settings.remembered_selection());
            let outcome = overlay.handle(OverlayEvent::ConfirmClicked);
            (overlay, outcome)
        }
    };

    let Some(OverlayOutcome::Dispatched(pending)) = outcome else {
        return Err(match region.rect() {
            Some(_) => format!(
                "selection must be at least {0}x{0} pixels",
                settings.min_selection_size.max(region_snap::geometry::MIN_SELECTION_SIZE)
            ),
            None => "no remembered selection fits this viewport; pass --left, --top, --width and --height".to_string(),
        });
    };

    let mut surface = overlay.surface().clone();
    let report = pending
        .finish(&mut surface, settings.processing_timeout())
        .await
        .map_err(|e| e.to_string())?;
    if let Some(reason) = &report.fallback {
        region_snap::report_warning!(
            "Crop Unavailable",
            &format!("Saved the whole viewport instead: {reason}")
        );
    }

    if let Some(manager) = manager {
        if let Err(e) = manager.update_selection_area(overlay.confirmed()) {
            log::warn!("could not remember the selection: {e}");
        }
    }

    save(coordinator).await
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), String> {
    let args = Args::parse();

    let filter = match args.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
    log::debug!(
        "region-snap {} ({})",
        region_snap::VERSION,
        region_snap::GIT_SHA.unwrap_or("unknown commit")
    );

    let (mut manager, mut settings) = load_settings();
    if let Some(notify) = args.notify {
        settings.notify = notify;
    }
    if let Some(remember) = args.remember_selection {
        settings.remember_selection_area = remember;
        if let Some(manager) = manager.as_mut() {
            if let Err(e) = manager.set_remember_selection_area(remember) {
                log::warn!("could not store the remember setting: {e}");
            }
        }
    }
    if let Some(dir) = args.save_dir.clone() {
        settings.save_directory = Some(dir);
    }

    set_notifications_enabled(settings.notify);
    if settings.notify {
        init_notification_manager().await;
    }

    let screenshots = match &args.source {
        Some(path) => ScreenshotManager::with_grabbers(vec![Box::new(
            StillImageScreengrabber::from_file(path),
        )]),
        None => ScreenshotManager::new(),
    };

    let coordinator = CaptureCoordinator::new(
        screenshots.clone(),
        Arc::new(TaskHelperHost::new()),
        Arc::new(DirectoryDownloader::new(settings.save_directory.clone())),
    )
    .with_settle_delay(settings.settle_delay())
    .spawn();

    match &args.command {
        Command::Visible => {
            coordinator
                .capture_visible_to_slot()
                .await
                .map_err(|e| e.to_string())?;
            save(&coordinator).await
        }
        Command::Region(region) => {
            capture_region(&coordinator, region, &settings, manager.as_mut()).await
        }
        Command::Serve => {
            let service = CaptureService::new(coordinator, screenshots);
            let interface = CaptureServiceInterface::new(service)
                .await
                .map_err(|e| format!("failed to start D-Bus service: {e}"))?;
            interface.run().await.map_err(|e| e.to_string())
        }
    }
}
