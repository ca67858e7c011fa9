use async_trait::async_trait;

use crate::error::Result;
use crate::types::ProgressNotification;

/// Delivers notifications to the caller of an in-flight request.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Send one progress notification.
    async fn notify_progress(&self, notification: ProgressNotification) -> Result<()>;
}

/// Sink that drops every notification.
pub struct NoopNotifier;

#[async_trait]
impl NotificationSink for NoopNotifier {
    async fn notify_progress(&self, _notification: ProgressNotification) -> Result<()> {
        Ok(())
    }
}
