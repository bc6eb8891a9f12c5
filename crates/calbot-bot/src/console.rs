//! Line-based console transport.
//!
//! Each input line is handled as a chat message from the configured console
//! user in the configured room. Replies and reminders are written to the same
//! output.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use calbot_calendar::Event;
use calbot_core::ConsoleConfig;
use calbot_services::{reminder_text, Notifier};
use parking_lot::Mutex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast;

use crate::commands::{CommandHandler, Reply};

/// Shared writer for replies and reminders.
#[derive(Clone)]
pub struct ConsoleOutput(Arc<Mutex<Box<dyn Write + Send>>>);

impl ConsoleOutput {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self(Arc::new(Mutex::new(Box::new(writer))))
    }

    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }

    fn write_block(&self, text: &str) -> std::io::Result<()> {
        let mut out = self.0.lock();
        writeln!(out, "{}", text)?;
        writeln!(out)?;
        out.flush()
    }

    fn write_reply(&self, reply: &Reply) -> std::io::Result<()> {
        self.write_block(&reply.msg)
    }
}

/// Delivers reminders by printing them.
pub struct ConsoleNotifier {
    out: ConsoleOutput,
}

impl ConsoleNotifier {
    pub fn new(out: ConsoleOutput) -> Self {
        Self { out }
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn notify(&self, destination: &str, event: &Event) -> anyhow::Result<()> {
        tracing::debug!("Reminder for {}: {}", destination, event.text);
        self.out.write_block(&reminder_text(event))?;
        Ok(())
    }
}

/// Read commands from `input` until it ends or shutdown is signalled.
pub async fn run_console<R>(
    handler: &CommandHandler,
    console: &ConsoleConfig,
    input: R,
    out: &ConsoleOutput,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();

    loop {
        let line = tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Console stopped by shutdown");
                break;
            }
            line = lines.next_line() => line?,
        };

        let Some(line) = line else {
            tracing::info!("Console input closed");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        for reply in handler
            .handle(&console.user_id, &console.room_id, &line)
            .await
        {
            out.write_reply(&reply)?;
        }
    }

    Ok(())
}
