//! Notifier that forwards notifications to `tracing`.

use crate::release::ports::{Notification, NotificationLevel, Notifier};

/// Logs every notification at a level matching its severity.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        let Notification { level, message } = notification;
        match level {
            NotificationLevel::Success | NotificationLevel::Info => {
                tracing::info!(%level, "{message}");
            }
            NotificationLevel::Warning => tracing::warn!(%level, "{message}"),
            NotificationLevel::Error => tracing::error!(%level, "{message}"),
        }
    }
}
