//! Calendar sources and event normalization for calbot.
//!
//! Provides CalDAV and iCal clients, a caching decorator, the combined view
//! over a user's calendars and day grouping for listings.

pub mod cache;
pub mod caldav;
pub mod client;
pub mod combined;
pub mod error;
pub mod format;
pub mod ical;
pub mod ics;
pub mod period;
pub mod retry;
pub mod source;
pub mod types;

pub use cache::CachingCalendar;
pub use caldav::CalDavCalendar;
pub use client::{CalendarHttpClient, CalendarUrl};
pub use combined::CombinedCalendar;
pub use error::CalendarError;
pub use format::{format_to_days, EventDay};
pub use ical::ICalCalendar;
pub use period::{period_range, start_of_iso_week, Period};
pub use retry::RetryConfig;
pub use source::{CalendarSource, EventQuery};
pub use types::{between, sort_events, CalendarKind, Event, TimeRange};
