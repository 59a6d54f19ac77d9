// Delivery of a fired reminder to the user.
use anyhow::Result;
use notify_rust::Notification;

pub trait NotificationSink {
    fn deliver(&mut self, notification_id: u32, title: &str, body: &str) -> Result<()>;
}

/// Desktop notification through the OS notification daemon.
#[derive(Debug, Clone, Default)]
pub struct DesktopNotifier;

impl NotificationSink for DesktopNotifier {
    fn deliver(&mut self, notification_id: u32, title: &str, body: &str) -> Result<()> {
        log::debug!("Showing notification {}: {}", notification_id, title);
        Notification::new()
            .summary(title)
            .body(body)
            .appname("Awqat")
            .show()?;
        Ok(())
    }
}

/// Writes reminders to the log only. Used by headless hosts.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn deliver(&mut self, notification_id: u32, title: &str, body: &str) -> Result<()> {
        log::info!("[{}] {}: {}", notification_id, title, body);
        Ok(())
    }
}
