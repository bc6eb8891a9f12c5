//! Grouping of events into calendar days for listings.

use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveTime};

use crate::types::Event;

/// Events that touch one calendar date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDay {
    pub date: NaiveDate,
    /// Start of the first event copy placed in the bucket: the event's own
    /// start on its start date, local midnight on later dates.
    pub day: DateTime<FixedOffset>,
    pub events: Vec<Event>,
}

/// Split `events` into per-day buckets.
///
/// Buckets appear in the order their dates are first encountered. An event
/// spanning several dates is copied into each of them, with the boundary that
/// lies outside a copy's date moved to that date's midnight. Dates are
/// compared in each event's own offset.
pub fn format_to_days(events: &[Event]) -> Vec<EventDay> {
    let mut days: Vec<EventDay> = Vec::new();

    for event in events {
        let start_date = event.from.date_naive();
        let end_date = event.to.date_naive();
        let mut cur = event.from;

        loop {
            let cur_date = cur.date_naive();

            let mut copy = event.clone();
            if start_date != end_date {
                if cur_date != start_date {
                    copy.from = midnight(cur_date, event.from.offset());
                }
                if cur_date != end_date {
                    if let Some(next) = cur_date.checked_add_days(Days::new(1)) {
                        copy.to = midnight(next, event.to.offset());
                    }
                }
            }

            // linear scan keeps encounter order without a separate index
            match days.iter_mut().find(|d| d.date == cur_date) {
                Some(bucket) => bucket.events.push(copy),
                None => days.push(EventDay {
                    date: cur_date,
                    day: copy.from,
                    events: vec![copy],
                }),
            }

            if cur_date >= end_date {
                break;
            }
            match cur.checked_add_days(Days::new(1)) {
                Some(next) => cur = next,
                None => break,
            }
        }
    }

    days
}

fn midnight(date: NaiveDate, offset: &FixedOffset) -> DateTime<FixedOffset> {
    let local = date.and_time(NaiveTime::MIN);
    DateTime::from_naive_utc_and_offset(local - *offset, *offset)
}
