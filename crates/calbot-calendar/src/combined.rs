//! The union of a user's calendars.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CalendarError;
use crate::source::{CalendarSource, EventQuery};
use crate::types::{between, sort_events, Event, TimeRange};

/// Merges several sources into one ascending event sequence.
///
/// A failing source fails the whole query; partial results are never
/// returned.
#[derive(Clone, Default)]
pub struct CombinedCalendar {
    sources: Vec<Arc<dyn CalendarSource>>,
}

impl CombinedCalendar {
    pub fn new(sources: Vec<Arc<dyn CalendarSource>>) -> Self {
        Self { sources }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[async_trait]
impl EventQuery for CombinedCalendar {
    async fn events(&self, range: TimeRange) -> Result<Vec<Event>, CalendarError> {
        if self.sources.is_empty() {
            return Err(CalendarError::NoCalendars);
        }

        let mut events = Vec::new();
        for source in &self.sources {
            let fetched = source.fetch(TimeRange::all()).await?;
            events.extend(between(fetched, range));
        }

        sort_events(&mut events);
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::types::test_support::event_at;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FixedSource(Vec<Event>);

    #[async_trait]
    impl CalendarSource for FixedSource {
        async fn fetch(&self, range: TimeRange) -> Result<Vec<Event>, CalendarError> {
            Ok(between(self.0.clone(), range))
        }
    }

    struct FailingSource(AtomicU32);

    #[async_trait]
    impl CalendarSource for FailingSource {
        async fn fetch(&self, _range: TimeRange) -> Result<Vec<Event>, CalendarError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(CalendarError::Status {
                status: 500,
                url: "http://cal.invalid".into(),
            })
        }
    }

    #[tokio::test]
    async fn test_no_sources_is_no_calendars() {
        let combined = CombinedCalendar::default();
        let err = combined.events(TimeRange::all()).await.unwrap_err();
        assert_eq!(err, CalendarError::NoCalendars);
    }

    #[tokio::test]
    async fn test_merges_sorted() {
        let work = FixedSource(vec![
            event_at(2020, 1, 1, 9, 0, 30, "standup"),
            event_at(2020, 1, 1, 14, 0, 60, "review"),
        ]);
        let home = FixedSource(vec![
            event_at(2020, 1, 1, 8, 0, 30, "breakfast"),
            event_at(2020, 1, 1, 12, 0, 60, "lunch"),
        ]);
        let combined = CombinedCalendar::new(vec![Arc::new(work), Arc::new(home)]);

        let events = combined.events(TimeRange::all()).await.unwrap();
        let texts: Vec<_> = events.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["breakfast", "standup", "lunch", "review"]);
    }

    #[tokio::test]
    async fn test_range_is_inclusive() {
        let cal = FixedSource(vec![
            event_at(2020, 1, 1, 9, 0, 30, "edge-start"),
            event_at(2020, 1, 1, 10, 0, 30, "edge-end"),
            event_at(2020, 1, 1, 11, 0, 30, "outside"),
        ]);
        let combined = CombinedCalendar::new(vec![Arc::new(cal)]);
        let range = TimeRange::between(
            Utc.with_ymd_and_hms(2020, 1, 1, 9, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2020, 1, 1, 10, 0, 0).unwrap(),
        );
        let events = combined.events(range).await.unwrap();
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn test_one_failure_aborts() {
        let ok = FixedSource(vec![event_at(2020, 1, 1, 9, 0, 30, "a")]);
        let combined = CombinedCalendar::new(vec![
            Arc::new(ok),
            Arc::new(FailingSource(AtomicU32::new(0))),
        ]);
        let err = combined.events(TimeRange::all()).await.unwrap_err();
        assert!(err.is_fetch_error());
    }
}
