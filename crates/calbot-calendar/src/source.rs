//! The capability every calendar backend provides.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CalendarError;
use crate::types::{Event, TimeRange};

/// A source of events bound to one calendar address.
///
/// Implementations return the events whose start lies in `range`, sorted
/// ascending by start time.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    async fn fetch(&self, range: TimeRange) -> Result<Vec<Event>, CalendarError>;
}

#[async_trait]
impl<T: CalendarSource + ?Sized> CalendarSource for Arc<T> {
    async fn fetch(&self, range: TimeRange) -> Result<Vec<Event>, CalendarError> {
        (**self).fetch(range).await
    }
}

/// Anything that can answer "which events start in this range", such as the
/// union of a user's calendars.
#[async_trait]
pub trait EventQuery: Send + Sync {
    async fn events(&self, range: TimeRange) -> Result<Vec<Event>, CalendarError>;
}
