//! Outbound delivery of reminders.

use async_trait::async_trait;
use calbot_calendar::Event;

/// Delivers a reminder for `event` to a chat destination (a room id).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, destination: &str, event: &Event) -> anyhow::Result<()>;
}

/// Plain-text body of a reminder message.
pub fn reminder_text(event: &Event) -> String {
    format!("Reminder: {} at {}", event.text, event.from.format("%H:%M"))
}
