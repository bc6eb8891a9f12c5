use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a single-line message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub calendars: CalendarsConfig,

    #[serde(default)]
    pub reminders: RemindersConfig,

    #[serde(default)]
    pub console: ConsoleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the SQLite database holding users and calendar registrations
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: PathBuf,
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("calbot")
}

fn default_sqlite_path() -> PathBuf {
    default_config_dir().join("calbot.db")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: default_sqlite_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarsConfig {
    /// How long fetched events are reused before the source is queried again
    #[serde(default = "default_cache_minutes")]
    pub cache_minutes: u32,

    /// Zone used for floating times, all-day dates and UTC timestamps
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Retries for transient HTTP failures (timeouts, 5xx)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_cache_minutes() -> u32 {
    5
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_request_timeout_secs() -> u64 {
    20
}

fn default_max_retries() -> u32 {
    2
}

impl Default for CalendarsConfig {
    fn default() -> Self {
        Self {
            cache_minutes: default_cache_minutes(),
            timezone: default_timezone(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl CalendarsConfig {
    pub fn cache_period(&self) -> Duration {
        Duration::from_secs(u64::from(self.cache_minutes) * 60)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Parse the configured zone name.
    pub fn tz(&self) -> Result<chrono_tz::Tz> {
        self.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|e| anyhow::anyhow!("Unknown timezone {:?}: {}", self.timezone, e))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemindersConfig {
    /// Minutes before an event start at which reminders are sent
    #[serde(default = "default_lead_minutes")]
    pub lead_minutes: Vec<u32>,

    /// How far ahead of now reminders are planned
    #[serde(default = "default_lookahead_minutes")]
    pub lookahead_minutes: u32,

    /// Interval at which every user's reminders are recomputed
    #[serde(default = "default_refresh_minutes")]
    pub refresh_minutes: u32,
}

fn default_lead_minutes() -> Vec<u32> {
    vec![0, 10]
}

fn default_lookahead_minutes() -> u32 {
    60
}

fn default_refresh_minutes() -> u32 {
    60
}

impl Default for RemindersConfig {
    fn default() -> Self {
        Self {
            lead_minutes: default_lead_minutes(),
            lookahead_minutes: default_lookahead_minutes(),
            refresh_minutes: default_refresh_minutes(),
        }
    }
}

impl RemindersConfig {
    pub fn lead_times(&self) -> Vec<Duration> {
        self.lead_minutes
            .iter()
            .map(|m| Duration::from_secs(u64::from(*m) * 60))
            .collect()
    }

    pub fn lookahead(&self) -> Duration {
        Duration::from_secs(u64::from(self.lookahead_minutes) * 60)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.refresh_minutes) * 60)
    }
}

/// Identity used by the console transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    #[serde(default = "default_console_user")]
    pub user_id: String,

    #[serde(default = "default_console_room")]
    pub room_id: String,
}

fn default_console_user() -> String {
    "@console:local".to_string()
}

fn default_console_room() -> String {
    "!console:local".to_string()
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            user_id: default_console_user(),
            room_id: default_console_room(),
        }
    }
}

impl Config {
    /// Get the default path of the configuration file
    pub fn default_path() -> PathBuf {
        default_config_dir().join("config.toml")
    }

    /// Load configuration from `path`.
    ///
    /// When the file does not exist it is created with the default values and
    /// the returned flag is `true`, so the caller can ask the operator to
    /// review it before running.
    pub fn load(path: &Path) -> Result<(Self, bool)> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            return Ok((config, true));
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok((config, false))
    }

    /// Load configuration and validate it
    ///
    /// Warnings are logged; errors fail the load.
    pub fn load_validated(path: &Path) -> Result<(Self, bool)> {
        let (config, is_new) = Self::load(path)?;
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, is_new))
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if let Err(e) = self.calendars.tz() {
            result.add_error("calendars.timezone", e.to_string());
        }

        if self.calendars.cache_minutes == 0 {
            result.add_warning(
                "calendars.cache_minutes",
                "Caching disabled, every query contacts the calendar server",
            );
        }

        if self.calendars.request_timeout_secs == 0 {
            result.add_error(
                "calendars.request_timeout_secs",
                "Request timeout must be greater than 0",
            );
        }

        if self.reminders.lead_minutes.is_empty() {
            result.add_warning("reminders.lead_minutes", "No reminders will be sent");
        }

        if self.reminders.lead_minutes.iter().any(|m| *m > 24 * 60) {
            result.add_warning(
                "reminders.lead_minutes",
                "Lead time is more than 24 hours",
            );
        }

        if self.reminders.refresh_minutes == 0 {
            result.add_error(
                "reminders.refresh_minutes",
                "Refresh interval must be greater than 0",
            );
        }

        if self.reminders.lookahead_minutes < self.reminders.refresh_minutes {
            result.add_warning(
                "reminders.lookahead_minutes",
                "Lookahead is shorter than the refresh interval, some reminders may be missed",
            );
        }

        result
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }
}
