pub mod config;
pub mod error;

pub use config::{
    CalendarsConfig, Config, ConsoleConfig, RemindersConfig, StorageConfig, ValidationResult,
};
pub use error::{AppError, ConfigError, DatabaseError, RusqliteErrorExt};

use anyhow::Result;

/// Initialize logging for the bot process. Logs go to stderr so they do not
/// mix with console replies.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    tracing::info!("Calbot core initialized");
    Ok(())
}
