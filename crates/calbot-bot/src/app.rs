//! Service wiring and lifecycle for the bot process.
//!
//! [`BotServices`] owns the user registry, the command handler and the
//! periodic reminder refresh. Shutdown is broadcast to every subscriber and
//! cancels the refresh loop.

use std::sync::Arc;
use std::time::Duration;

use calbot_calendar::{CalendarHttpClient, RetryConfig};
use calbot_core::{AppError, Config, ConfigError};
use calbot_services::{
    HttpSourceFactory, Notifier, RegistryError, ReminderSettings, SqliteRegistrationStore,
    UserRegistry,
};
use chrono_tz::Tz;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::commands::CommandHandler;

pub struct BotServices {
    registry: Arc<UserRegistry>,
    handler: Arc<CommandHandler>,

    /// Shutdown signal broadcaster
    shutdown_tx: broadcast::Sender<()>,

    refresh_cancel: CancellationToken,
    refresh_interval: Duration,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl BotServices {
    pub fn new(registry: Arc<UserRegistry>, zone: Tz, refresh_interval: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);
        let handler = Arc::new(CommandHandler::new(registry.clone(), zone));

        Self {
            registry,
            handler,
            shutdown_tx,
            refresh_cancel: CancellationToken::new(),
            refresh_interval,
            refresh_task: Mutex::new(None),
        }
    }

    /// Open storage, build the calendar stack and load every registration.
    pub async fn from_config(
        config: &Config,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, AppError> {
        let zone = config
            .calendars
            .tz()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let store = SqliteRegistrationStore::open(&config.storage.sqlite_path)?;
        tracing::info!("Registrations stored in {}", config.storage.sqlite_path.display());

        let retry = RetryConfig {
            max_retries: config.calendars.max_retries,
            ..RetryConfig::default()
        };
        let http = CalendarHttpClient::new(config.calendars.request_timeout(), retry)
            .map_err(|e| AppError::Other(anyhow::anyhow!("Failed to create HTTP client: {}", e)))?;
        let factory = HttpSourceFactory::new(http, zone, config.calendars.cache_period());

        let registry = Arc::new(UserRegistry::new(
            Arc::new(Mutex::new(store)),
            Arc::new(factory),
            notifier,
            ReminderSettings {
                lead_times: config.reminders.lead_times(),
                lookahead: config.reminders.lookahead(),
            },
        ));

        let users = registry.load().await.map_err(|e| match e {
            RegistryError::Storage(db) => AppError::Database(db),
            other => AppError::Other(other.into()),
        })?;
        tracing::info!("Loaded {} users", users);

        Ok(Self::new(registry, zone, config.reminders.refresh_interval()))
    }

    /// Arm every user's reminders and start the periodic refresh.
    pub async fn start(&self) {
        let failed = self.registry.refresh_all().await;
        if failed > 0 {
            tracing::warn!("{} users could not be armed at startup", failed);
        }

        if self.refresh_interval.is_zero() {
            tracing::info!("Periodic reminder refresh disabled");
            return;
        }

        let registry = self.registry.clone();
        let token = self.refresh_cancel.clone();
        let period = self.refresh_interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let failed = registry.refresh_all().await;
                        tracing::debug!("Reminder refresh done, {} users failed", failed);
                    }
                }
            }
            tracing::debug!("Reminder refresh loop stopped");
        });

        if let Some(old) = self.refresh_task.lock().replace(task) {
            old.abort();
        }
    }

    pub fn registry(&self) -> &Arc<UserRegistry> {
        &self.registry
    }

    pub fn handler(&self) -> Arc<CommandHandler> {
        self.handler.clone()
    }

    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresh_task
            .lock()
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    /// Signal shutdown, stop every background task and let reminder
    /// deliveries in progress finish.
    pub async fn shutdown(&self) {
        tracing::info!("Bot shutdown initiated");

        let _ = self.shutdown_tx.send(());
        self.refresh_cancel.cancel();
        self.registry.stop_all();

        if let Some(task) = self.refresh_task.lock().take() {
            task.abort();
        }
        self.registry.flush().await;

        tracing::info!("Bot shutdown complete");
    }
}
