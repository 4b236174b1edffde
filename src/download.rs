// SPDX-License-Identifier: GPL-3.0-only

//! The file-save primitive used to persist the current result.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::DownloadError;

/// `screenshot_<ISO 8601 timestamp>.png`, with `:` replaced so the name is valid everywhere.
#[must_use]
pub fn screenshot_filename(taken_at: DateTime<Utc>) -> String {
    let stamp = taken_at.to_rfc3339_opts(SecondsFormat::Millis, true);
    format!("screenshot_{}.png", stamp.replace(':', "-"))
}

#[async_trait]
pub trait Downloader: Send + Sync {
    /// Stores `data` under `filename` and returns where it ended up.
    ///
    /// # Errors
    /// Returns `DownloadError` if there is nowhere to write or the write fails
    async fn download(&self, data: &[u8], filename: &str) -> Result<PathBuf, DownloadError>;
}

/// Writes downloads into one directory, the Pictures directory by default.
pub struct DirectoryDownloader {
    directory: Option<PathBuf>,
}

impl DirectoryDownloader {
    #[must_use]
    pub fn new(directory: Option<PathBuf>) -> Self {
        Self { directory }
    }

    /// The requested directory if it exists, otherwise the Pictures directory
    fn target_dir(&self) -> Result<PathBuf, DownloadError> {
        self.directory
            .clone()
            .filter(|dir| dir.is_dir())
            .or_else(dirs::picture_dir)
            .ok_or_else(|| DownloadError::MissingSaveDirectory(self.directory.clone()))
    }
}

impl Default for DirectoryDownloader {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl Downloader for DirectoryDownloader {
    async fn download(&self, data: &[u8], filename: &str) -> Result<PathBuf, DownloadError> {
        let dir = self.target_dir()?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|error| DownloadError::Write {
                error,
                context: "creating the save directory",
            })?;

        let path = dir.join(filename);
        tokio::fs::write(&path, data)
            .await
            .map_err(|error| DownloadError::Write {
                error,
                context: "writing the screenshot",
            })?;

        log::info!("saved {} bytes to {}", data.len(), path.display());
        Ok(path)
    }
}
