//! Notification delivery contract.

use async_trait::async_trait;

use crate::error::NotifyError;
use crate::reminders::Notification;

/// Delivers one message. Failures come back as values, never panics.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Stable channel identifier (e.g. `smtp`, `maildir`).
    fn channel(&self) -> &'static str;

    async fn send(&self, message: &Notification) -> Result<(), NotifyError>;
}
