//! Event model and range filtering shared by every calendar source.

use chrono::{DateTime, FixedOffset, Utc};

/// A calendar event as the bot sees it.
///
/// Times keep the offset of the zone the event was defined in, so day
/// boundaries are computed in the event's own zone. `from <= to` is expected
/// but not enforced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub from: DateTime<FixedOffset>,
    pub to: DateTime<FixedOffset>,
    pub text: String,
}

impl Event {
    pub fn new(
        from: DateTime<FixedOffset>,
        to: DateTime<FixedOffset>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            from,
            to,
            text: text.into(),
        }
    }

    pub fn start_utc(&self) -> DateTime<Utc> {
        self.from.with_timezone(&Utc)
    }
}

/// Inclusive bounds on event start times. An unset bound does not filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// No filtering at all.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(from: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            until: Some(until),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.until.is_none()
    }

    /// Whether `event` starts inside the range. Only the start time is
    /// checked; an event may end after `until`.
    pub fn contains(&self, event: &Event) -> bool {
        let start = event.start_utc();
        if let Some(from) = self.from {
            if start < from {
                return false;
            }
        }
        if let Some(until) = self.until {
            if until < start {
                return false;
            }
        }
        true
    }
}

/// Keep the events that start inside `range`, preserving order.
pub fn between(events: Vec<Event>, range: TimeRange) -> Vec<Event> {
    if range.is_unbounded() {
        return events;
    }
    events.into_iter().filter(|ev| range.contains(ev)).collect()
}

/// Stable ascending sort by start time.
pub fn sort_events(events: &mut [Event]) {
    events.sort_by_key(Event::start_utc);
}

/// Protocol of a registered calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalendarKind {
    CalDav,
    ICal,
}

impl CalendarKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalendarKind::CalDav => "caldav",
            CalendarKind::ICal => "ical",
        }
    }

    /// Human name used in replies.
    pub fn display_name(&self) -> &'static str {
        match self {
            CalendarKind::CalDav => "CalDAV",
            CalendarKind::ICal => "ical",
        }
    }
}

impl std::fmt::Display for CalendarKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CalendarKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "caldav" => Ok(CalendarKind::CalDav),
            "ical" => Ok(CalendarKind::ICal),
            other => Err(format!("unknown calendar type: {}", other)),
        }
    }
}


#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::test_support::event_at;
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        let ev = event_at(2020, 1, 1, 10, 0, 60, "meeting");
        assert!(TimeRange::between(utc(2020, 1, 1, 10), utc(2020, 1, 1, 10)).contains(&ev));
        assert!(!TimeRange::between(utc(2020, 1, 1, 11), utc(2020, 1, 1, 12)).contains(&ev));
        assert!(!TimeRange::between(utc(2020, 1, 1, 8), utc(2020, 1, 1, 9)).contains(&ev));
    }

    #[test]
    fn test_range_ignores_end_time() {
        let ev = event_at(2020, 1, 1, 10, 0, 600, "long");
        assert!(TimeRange::between(utc(2020, 1, 1, 9), utc(2020, 1, 1, 11)).contains(&ev));
    }

    #[test]
    fn test_half_open_range() {
        let ev = event_at(2020, 1, 1, 10, 0, 60, "meeting");
        let range = TimeRange {
            from: Some(utc(2020, 1, 1, 9)),
            until: None,
        };
        assert!(range.contains(&ev));
        assert!(TimeRange::all().contains(&ev));
    }

    #[test]
    fn test_between_is_idempotent() {
        let events = vec![
            event_at(2020, 1, 1, 8, 0, 30, "a"),
            event_at(2020, 1, 1, 10, 0, 30, "b"),
            event_at(2020, 1, 1, 12, 0, 30, "c"),
        ];
        let range = TimeRange::between(utc(2020, 1, 1, 9), utc(2020, 1, 1, 12));
        let once = between(events, range);
        let twice = between(once.clone(), range);
        assert_eq!(once, twice);
        assert_eq!(once.len(), 2);
    }

    #[test]
    fn test_sort_is_stable() {
        let mut events = vec![
            event_at(2020, 1, 2, 8, 0, 30, "late"),
            event_at(2020, 1, 1, 8, 0, 30, "first"),
            event_at(2020, 1, 1, 8, 0, 30, "second"),
        ];
        sort_events(&mut events);
        let texts: Vec<_> = events.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "late"]);
    }

    #[test]
    fn test_calendar_kind_parse() {
        assert_eq!("CalDAV".parse::<CalendarKind>().unwrap(), CalendarKind::CalDav);
        assert_eq!("ical".parse::<CalendarKind>().unwrap(), CalendarKind::ICal);
        assert!("webcal".parse::<CalendarKind>().is_err());
        assert_eq!(CalendarKind::CalDav.to_string(), "caldav");
    }
}
