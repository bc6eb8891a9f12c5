//! Calendar-specific error types.

use thiserror::Error;

/// Errors produced while fetching or combining calendars.
///
/// Payloads are plain strings so the error can be cloned and handed to every
/// caller that waited on the same fetch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    /// The user has not registered any calendar.
    #[error("no calendars")]
    NoCalendars,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Invalid calendar data: {0}")]
    InvalidData(String),

    #[error("Invalid calendar address: {0}")]
    InvalidUrl(String),
}

impl CalendarError {
    /// User-friendly error message for chat replies.
    pub fn user_message(&self) -> String {
        match self {
            Self::NoCalendars => {
                "You haven't configured any calendars. Use the 'cal add' command to start."
                    .to_string()
            }
            Self::InvalidUrl(_) => "The calendar address is not valid.".to_string(),
            Self::Network(_) | Self::Timeout(_) | Self::Status { .. } | Self::InvalidData(_) => {
                "Oops, something went wrong".to_string()
            }
        }
    }

    /// Whether this error came from contacting or decoding a calendar source.
    pub fn is_fetch_error(&self) -> bool {
        !matches!(self, Self::NoCalendars | Self::InvalidUrl(_))
    }

    /// Whether this error is worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429 || *status == 408,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for CalendarError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            }
        } else {
            Self::Network(err.to_string())
        }
    }
}
