//! Process-level error types for the calendar bot.
//!
//! Startup failures are mapped to a process exit code; storage failures carry a
//! message that is safe to show in a chat reply.

use thiserror::Error;

/// Top-level error for process startup and wiring.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Config(e) => e.user_message(),
            AppError::Database(e) => e.user_message(),
            AppError::Io(_) => "A file operation failed.",
            AppError::Other(_) => "An unexpected error occurred.",
        }
    }

    /// Exit code used when the process cannot start.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(ConfigError::Created(_)) => 2,
            AppError::Config(_) => 1,
            AppError::Database(_) => 4,
            AppError::Io(_) | AppError::Other(_) => 1,
        }
    }
}

/// Database/storage errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Data corruption detected: {0}")]
    Corruption(String),

    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

impl DatabaseError {
    pub fn user_message(&self) -> &'static str {
        match self {
            DatabaseError::ConnectionFailed(_) => "Unable to access stored calendars.",
            DatabaseError::QueryFailed(_) | DatabaseError::TaskFailed(_) => {
                "Saving your calendars failed. Please try again."
            }
            DatabaseError::Corruption(_) => "Stored data may be corrupted.",
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A default configuration file was written and should be reviewed.
    #[error("Configuration file created at {0}")]
    Created(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Created(_) => {
                "Configuration file created. Please fill in the values and rerun the application."
            }
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
        }
    }
}

/// Extension trait for converting rusqlite errors to our error types.
pub trait RusqliteErrorExt {
    fn into_database_error(self) -> DatabaseError;
}

impl RusqliteErrorExt for rusqlite::Error {
    fn into_database_error(self) -> DatabaseError {
        match &self {
            rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("corrupt") => {
                DatabaseError::Corruption(self.to_string())
            }
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::CannotOpen =>
            {
                DatabaseError::ConnectionFailed(self.to_string())
            }
            _ => DatabaseError::QueryFailed(self.to_string()),
        }
    }
}
