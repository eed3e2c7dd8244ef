//! Notification transport collaborator, out of scope for this crate
//!
//! A trait with default no-op methods plus one concrete no-op
//! implementation, so the reactor can call into a `NotificationService`
//! without this crate owning push/SMS/app delivery.

use crate::error::Result;

/// Delivery channel a notification is tagged with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationChannel {
    Info,
    Alert,
}

/// A single notification: the text body the stat formatter produced,
/// tagged with the channel/subtype the reactor's event table calls for.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub channel: NotificationChannel,
    pub subtype: &'static str,
    pub body: String,
}

impl Notification {
    pub fn info(subtype: &'static str, body: impl Into<String>) -> Self {
        Self {
            channel: NotificationChannel::Info,
            subtype,
            body: body.into(),
        }
    }

    pub fn alert(subtype: &'static str, body: impl Into<String>) -> Self {
        Self {
            channel: NotificationChannel::Alert,
            subtype,
            body: body.into(),
        }
    }
}

#[async_trait::async_trait]
pub trait NotificationService: Send + Sync {
    /// Deliver a notification. Default implementation is a no-op so drivers
    /// that don't care about delivery don't need to implement it.
    async fn notify(&self, notification: &Notification) -> Result<()> {
        let _ = notification;
        Ok(())
    }
}

/// Default notification service: discards everything
pub struct NoopNotificationService;

#[async_trait::async_trait]
impl NotificationService for NoopNotificationService {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_service_accepts_any_notification() {
        let service = NoopNotificationService;
        let n = Notification::info("charge.started", "Range - Charging");
        assert!(service.notify(&n).await.is_ok());
    }

    #[test]
    fn constructors_tag_channel() {
        assert_eq!(
            Notification::alert("valet.hood", "Hood opened").channel,
            NotificationChannel::Alert
        );
        assert_eq!(
            Notification::info("charge.started", "x").channel,
            NotificationChannel::Info
        );
    }
}
