// SPDX-License-Identifier: GPL-3.0-only

use cosmic_config::{Config, ConfigGet, ConfigSet, CosmicConfigEntry};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::geometry::{SelectionRect, MIN_SELECTION_SIZE};

pub const APP_ID: &str = "io.github.RegionSnap";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Where saved screenshots go; the Pictures directory when unset
    pub save_directory: Option<PathBuf>,
    /// Whether to post desktop notifications for saves and failures
    pub notify: bool,
    /// Smallest accepted selection edge, in viewport pixels
    pub min_selection_size: f64,
    /// How long the processing indicator waits for a result
    pub processing_timeout_secs: u64,
    /// Pause between removing the overlay and taking the screenshot
    pub settle_delay_ms: u64,
    /// Whether to offer the last selection again next time
    pub remember_selection_area: bool,
    pub last_selection_area: Option<SelectionArea>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionArea {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl From<SelectionRect> for SelectionArea {
    fn from(rect: SelectionRect) -> Self {
        Self {
            x: rect.left,
            y: rect.top,
            width: rect.width,
            height: rect.height,
        }
    }
}

impl From<SelectionArea> for SelectionRect {
    fn from(area: SelectionArea) -> Self {
        SelectionRect::new(area.x, area.y, area.width, area.height)
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            save_directory: dirs::picture_dir(),
            notify: true,
            min_selection_size: MIN_SELECTION_SIZE,
            processing_timeout_secs: 15,
            settle_delay_ms: 100,
            remember_selection_area: false,
            last_selection_area: None,
        }
    }
}

impl CaptureSettings {
    #[must_use]
    pub fn processing_timeout(&self) -> Duration {
        Duration::from_secs(self.processing_timeout_secs)
    }

    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// The selection to restore, if remembering is enabled.
    #[must_use]
    pub fn remembered_selection(&self) -> Option<SelectionRect> {
        self.remember_selection_area
            .then_some(self.last_selection_area)
            .flatten()
            .map(SelectionRect::from)
    }
}

impl CosmicConfigEntry for CaptureSettings {
    const VERSION: u64 = 1;

    fn write_entry(&self, config: &Config) -> Result<(), cosmic_config::Error> {
        config.set("save_directory", &self.save_directory)?;
        config.set("notify", self.notify)?;
        config.set("min_selection_size", self.min_selection_size)?;
        config.set("processing_timeout_secs", self.processing_timeout_secs)?;
        config.set("settle_delay_ms", self.settle_delay_ms)?;
        config.set("remember_selection_area", self.remember_selection_area)?;
        config.set("last_selection_area", &self.last_selection_area)?;
        Ok(())
    }

    fn get_entry(config: &Config) -> Result<Self, (Vec<cosmic_config::Error>, Self)> {
        let mut errors = Vec::new();
        let default = Self::default();

        let save_directory = config.get("save_directory")
            .unwrap_or_else(|e| { errors.push(e); default.save_directory.clone() });

        let notify = config.get("notify")
            .unwrap_or_else(|e| { errors.push(e); default.notify });

        let min_selection_size = config.get("min_selection_size")
            .unwrap_or_else(|e| { errors.push(e); default.min_selection_size });

        let processing_timeout_secs = config.get("processing_timeout_secs")
            .unwrap_or_else(|e| { errors.push(e); default.processing_timeout_secs });

        let settle_delay_ms = config.get("settle_delay_ms")
            .unwrap_or_else(|e| { errors.push(e); default.settle_delay_ms });

        let remember_selection_area = config.get("remember_selection_area")
            .unwrap_or_else(|e| { errors.push(e); default.remember_selection_area });

        let last_selection_area = config.get("last_selection_area")
            .unwrap_or_else(|e| { errors.push(e); default.last_selection_area });

        let settings = Self {
            save_directory,
            notify,
            min_selection_size,
            processing_timeout_secs,
            settle_delay_ms,
            remember_selection_area,
            last_selection_area,
        };

        if errors.is_empty() {
            Ok(settings)
        } else {
            Err((errors, settings))
        }
    }

    fn update_keys<T>(&mut self, config: &Config, _keys: &[T]) -> (Vec<cosmic_config::Error>, Vec<&'static str>)
    where
        T: AsRef<str>
    {
        // Every key is cheap to read, so reload them all
        match Self::get_entry(config) {
            Ok(new_settings) => {
                *self = new_settings;
                (vec![], vec![])
            }
            Err((errors, new_settings)) => {
                *self = new_settings;
                (errors, vec![])
            }
        }
    }
}

pub struct SettingsManager {
    pub config: Config,
    pub settings: CaptureSettings,
}

impl SettingsManager {
    #[allow(clippy::missing_errors_doc)]
    pub fn new() -> Result<Self, cosmic_config::Error> {
        let config = Config::new(APP_ID, CaptureSettings::VERSION)?;
        let settings = match CaptureSettings::get_entry(&config) {
            Ok(settings) => settings,
            Err((errors, settings)) => {
                for err in errors {
                    log::debug!("using default for setting: {err}");
                }
                settings
            }
        };

        Ok(Self { config, settings })
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn save(&self) -> Result<(), cosmic_config::Error> {
        self.settings.write_entry(&self.config)
    }

    /// Stores the last confirmed selection; a no-op unless remembering is enabled.
    #[allow(clippy::missing_errors_doc)]
    pub fn update_selection_area(
        &mut self,
        area: Option<SelectionRect>,
    ) -> Result<(), cosmic_config::Error> {
        if !self.settings.remember_selection_area {
            return Ok(());
        }
        self.settings.last_selection_area = area.map(SelectionArea::from);
        self.save()
    }

    #[allow(clippy::missing_errors_doc)]
    pub fn set_remember_selection_area(&mut self, remember: bool) -> Result<(), cosmic_config::Error> {
        self.settings.remember_selection_area = remember;
        self.save()
    }
}
