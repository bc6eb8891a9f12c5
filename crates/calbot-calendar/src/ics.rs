//! ICS parsing using the icalendar crate's parser.

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;
use icalendar::{
    parser::{read_calendar, unfold, Component},
    CalendarDateTime, DatePerhapsTime,
};

use crate::error::CalendarError;
use crate::types::Event;

/// Parse every VEVENT in an iCalendar document.
///
/// `zone` is used for all-day dates, floating times, unknown `TZID`s and to
/// present UTC timestamps. Events without a usable `DTSTART` are skipped; a
/// missing `DTEND` yields a zero-length event.
pub fn parse_events(content: &str, zone: Tz) -> Result<Vec<Event>, CalendarError> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).map_err(|e| CalendarError::InvalidData(e.to_string()))?;

    let mut events = Vec::new();
    for component in calendar.components.iter().filter(|c| c.name == "VEVENT") {
        match parse_vevent(component, zone) {
            Some(event) => events.push(event),
            None => tracing::debug!("Skipping VEVENT without a usable DTSTART"),
        }
    }

    Ok(events)
}

fn parse_vevent(vevent: &Component<'_>, zone: Tz) -> Option<Event> {
    let from = vevent
        .find_prop("DTSTART")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .and_then(|dpt| to_datetime(dpt, zone))?;

    let to = vevent
        .find_prop("DTEND")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .and_then(|dpt| to_datetime(dpt, zone))
        .unwrap_or(from);

    let text = vevent
        .find_prop("SUMMARY")
        .map(|p| unescape_text(p.val.as_ref()))
        .unwrap_or_default();

    Some(Event { from, to, text })
}

fn to_datetime(dpt: DatePerhapsTime, zone: Tz) -> Option<DateTime<FixedOffset>> {
    match dpt {
        DatePerhapsTime::Date(date) => localize(date.and_time(NaiveTime::MIN), zone),
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => {
            Some(dt.with_timezone(&zone).fixed_offset())
        }
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => localize(naive, zone),
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, tzid }) => {
            let tz = match tzid.parse::<Tz>() {
                Ok(tz) => tz,
                Err(_) => {
                    tracing::debug!("Unknown TZID {:?}, using {}", tzid, zone);
                    zone
                }
            };
            localize(date_time, tz)
        }
    }
}

/// Resolve a wall time in `tz`. Times that fall in a DST gap are moved forward
/// by an hour.
fn localize(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<FixedOffset>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .map(|dt| dt.fixed_offset())
}

fn unescape_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push(' '),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use chrono::{NaiveDate, Timelike};

    const FEED: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//test//EN\r\n\
BEGIN:VEVENT\r\n\
UID:1\r\n\
DTSTART;TZID=Europe/Amsterdam:20200101T220000\r\n\
DTEND;TZID=Europe/Amsterdam:20200102T020000\r\n\
SUMMARY:New year\\, party\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:2\r\n\
DTSTART:20200103T090000Z\r\n\
SUMMARY:No end\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:3\r\n\
DTSTART;VALUE=DATE:20200105\r\n\
DTEND;VALUE=DATE:20200106\r\n\
SUMMARY:Holiday\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:4\r\n\
SUMMARY:Broken\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    #[test]
    fn test_parse_feed() {
        let events = parse_events(FEED, chrono_tz::Europe::Amsterdam).unwrap();
        assert_eq!(events.len(), 3);

        assert_eq!(events[0].text, "New year, party");
        assert_eq!(events[0].from.hour(), 22);
        assert_eq!(events[0].from.offset().local_minus_utc(), 3600);
        assert_eq!(events[0].to.date_naive(), NaiveDate::from_ymd_opt(2020, 1, 2).unwrap());
    }

    #[test]
    fn test_missing_end_is_zero_length() {
        let events = parse_events(FEED, chrono_tz::Europe::Amsterdam).unwrap();
        let no_end = &events[1];
        assert_eq!(no_end.from, no_end.to);
        // 09:00Z shown in the configured zone
        assert_eq!(no_end.from.hour(), 10);
    }

    #[test]
    fn test_all_day_uses_configured_zone() {
        let events = parse_events(FEED, chrono_tz::UTC).unwrap();
        let holiday = &events[2];
        assert_eq!(holiday.text, "Holiday");
        assert_eq!(holiday.from.hour(), 0);
        assert_eq!(holiday.from.date_naive(), NaiveDate::from_ymd_opt(2020, 1, 5).unwrap());
    }

    #[test]
    fn test_unknown_tzid_falls_back() {
        let feed = "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nDTSTART;TZID=Nowhere/Special:20200101T100000\r\nSUMMARY:x\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n";
        let events = parse_events(feed, chrono_tz::UTC).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].from.hour(), 10);
        assert_eq!(events[0].from.offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_unescape_text() {
        assert_eq!(unescape_text("a\\;b\\nc\\\\"), "a;b c\\");
    }
}
