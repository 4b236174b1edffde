// SPDX-License-Identifier: GPL-3.0-only

//! System notification support using freedesktop notification standard

use zbus::{proxy, Connection};
use std::collections::HashMap;

const APP_NAME: &str = "Region Snap";

/// Notification urgency levels
#[derive(Debug, Clone, Copy)]
pub enum NotificationUrgency {
    Low = 0,
    Normal = 1,
    Critical = 2,
}

/// Notification types with appropriate urgency and icons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationType {
    Info,
    Warning,
    Error,
    Success,
}

impl NotificationType {
    #[must_use]
    pub fn urgency(&self) -> NotificationUrgency {
        match self {
            NotificationType::Info | NotificationType::Success => NotificationUrgency::Low,
            NotificationType::Warning => NotificationUrgency::Normal,
            NotificationType::Error => NotificationUrgency::Critical,
        }
    }

    #[must_use]
    pub fn icon(&self) -> &'static str {
        match self {
            NotificationType::Info => "dialog-information",
            NotificationType::Success => "emblem-default",
            NotificationType::Warning => "dialog-warning",
            NotificationType::Error => "dialog-error",
        }
    }
}

/// Freedesktop Notifications D-Bus proxy
#[allow(clippy::too_many_arguments)]
#[proxy(
    interface = "org.freedesktop.Notifications",
    default_service = "org.freedesktop.Notifications",
    default_path = "/org/freedesktop/Notifications"
)]
trait Notifications {
    /// Show a notification
    fn notify(
        &self,
        app_name: &str,
        replaces_id: u32,
        app_icon: &str,
        summary: &str,
        body: &str,
        actions: Vec<&str>,
        hints: HashMap<&str, zbus::zvariant::Value<'_>>,
        expire_timeout: i32,
    ) -> zbus::Result<u32>;
}

/// System notification manager
pub struct NotificationManager {
    connection: Option<Connection>,
}

impl NotificationManager {
    pub async fn new() -> Self {
        let connection = match Connection::session().await {
            Ok(connection) => Some(connection),
            Err(e) => {
                log::debug!("session bus unavailable, notifications disabled: {e}");
                None
            }
        };
        Self { connection }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.connection.is_some()
    }

    #[allow(clippy::missing_errors_doc)]
    pub async fn show_notification(
        &self,
        notification_type: NotificationType,
        title: &str,
        message: &str,
    ) -> Result<u32, Box<dyn std::error::Error + Send + Sync>> {
        let Some(ref connection) = self.connection else {
            return Err("No D-Bus connection available for notifications".into());
        };
        let proxy = NotificationsProxy::new(connection).await?;

        let mut hints = HashMap::new();
        hints.insert("urgency", zbus::zvariant::Value::U8(notification_type.urgency() as u8));
        hints.insert("transient", zbus::zvariant::Value::Bool(true));

        let notification_id = proxy
            .notify(
                APP_NAME,
                0, // replaces_id (0 for new notification)
                notification_type.icon(),
                title,
                message,
                vec![],
                hints,
                5000, // expire_timeout (5 seconds)
            )
            .await?;

        Ok(notification_id)
    }
}

/// Global notification manager instance
static NOTIFICATION_MANAGER: std::sync::OnceLock<tokio::sync::Mutex<NotificationManager>> = std::sync::OnceLock::new();

/// Initialize the global notification manager
pub async fn init_notification_manager() {
    let manager = NotificationManager::new().await;
    let _ = NOTIFICATION_MANAGER.set(tokio::sync::Mutex::new(manager));
}

/// Show a system notification (convenience function)
#[allow(clippy::missing_errors_doc)]
pub async fn show_system_notification(
    notification_type: NotificationType,
    title: &str,
    message: &str,
) -> Result<u32, Box<dyn std::error::Error + Send + Sync>> {
    if let Some(manager_mutex) = NOTIFICATION_MANAGER.get() {
        let manager = manager_mutex.lock().await;
        manager.show_notification(notification_type, title, message).await
    } else {
        Err("Notification manager not initialized".into())
    }
}

pub async fn notifications_available() -> bool {
    if let Some(manager_mutex) = NOTIFICATION_MANAGER.get() {
        manager_mutex.lock().await.is_available()
    } else {
        false
    }
}
