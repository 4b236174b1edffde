// SPDX-License-Identifier: GPL-3.0-only

//! Centralized error reporting
//!
//! Everything is written to the `log` facade. When desktop notifications are enabled,
//! user-relevant reports are additionally posted as freedesktop notifications.

use std::sync::atomic::{AtomicBool, Ordering};
use crate::notifications::{show_system_notification, notifications_available, NotificationType};

static NOTIFICATIONS_ENABLED: AtomicBool = AtomicBool::new(false);

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Failures that end the current capture cycle
    Error,
    /// Fallbacks or degraded results
    Warning,
    /// Informational messages about state changes
    Info,
}

impl ErrorSeverity {
    fn notification_type(self) -> NotificationType {
        match self {
            Self::Error => NotificationType::Error,
            Self::Warning => NotificationType::Warning,
            Self::Info => NotificationType::Info,
        }
    }

    fn log_level(self) -> log::Level {
        match self {
            Self::Error => log::Level::Error,
            Self::Warning => log::Level::Warn,
            Self::Info => log::Level::Info,
        }
    }
}

/// Set whether reports should also be posted as desktop notifications
pub fn set_notifications_enabled(enabled: bool) {
    NOTIFICATIONS_ENABLED.store(enabled, Ordering::Relaxed);
}

#[must_use]
pub fn notifications_enabled() -> bool {
    NOTIFICATIONS_ENABLED.load(Ordering::Relaxed)
}

/// Universal error reporting function
pub fn report_error(severity: ErrorSeverity, title: &str, message: &str) {
    log::log!(severity.log_level(), "{title}: {message}");
    notify(severity.notification_type(), title, message);
}

/// Show a success notification (convenience function)
pub fn report_success(title: &str, message: &str) {
    log::info!("{title}: {message}");
    notify(NotificationType::Success, title, message);
}

fn notify(notification_type: NotificationType, title: &str, message: &str) {
    if !notifications_enabled() {
        return;
    }
    // Reports can come from synchronous code running outside the runtime.
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        log::debug!("no async runtime, skipping notification for {title:?}");
        return;
    };

    let title = title.to_string();
    let message = message.to_string();
    runtime.spawn(async move {
        if !notifications_available().await {
            return;
        }
        if let Err(e) = show_system_notification(notification_type, &title, &message).await {
            log::warn!("Notification failed: {e}");
        }
    });
}

/// Convenience macros for common error reporting patterns
#[macro_export]
macro_rules! report_error {
    ($title:expr, $msg:expr) => {
        $crate::error_handling::report_error(
            $crate::error_handling::ErrorSeverity::Error,
            $title,
            $msg,
        )
    };
}

#[macro_export]
macro_rules! report_warning {
    ($title:expr, $msg:expr) => {
        $crate::error_handling::report_error(
            $crate::error_handling::ErrorSeverity::Warning,
            $title,
            $msg,
        )
    };
}
