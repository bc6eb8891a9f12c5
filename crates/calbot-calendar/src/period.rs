//! Day and week boundaries used by the listing commands.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

use crate::types::TimeRange;

/// A listing period relative to "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Today,
    ThisWeek,
    NextWeek,
    LastWeek,
    /// ISO week `week` of ISO year `year`.
    Week { year: i32, week: u32 },
}

impl Period {
    pub fn is_week(&self) -> bool {
        !matches!(self, Period::Today)
    }
}

/// 00:00 of the day containing `now`, in `now`'s zone.
pub fn start_of_day(now: DateTime<Tz>) -> DateTime<Tz> {
    local_midnight(now.date_naive(), now.timezone())
}

/// Monday 00:00 of the week containing `now`.
pub fn start_of_week(now: DateTime<Tz>) -> DateTime<Tz> {
    let back = now.weekday().num_days_from_monday();
    let monday = now
        .date_naive()
        .checked_sub_days(Days::new(u64::from(back)))
        .unwrap_or_else(|| now.date_naive());
    local_midnight(monday, now.timezone())
}

/// Monday 00:00 of ISO week `week` in `year`, or `None` if the year has no
/// such week.
pub fn start_of_iso_week(year: i32, week: u32, tz: Tz) -> Option<DateTime<Tz>> {
    let monday = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)?;
    Some(local_midnight(monday, tz))
}

/// `[from, until)` covered by `period`: one day for [`Period::Today`], seven
/// for week periods. `None` for a week that does not exist.
pub fn period_range(period: Period, now: DateTime<Tz>) -> Option<(DateTime<Tz>, DateTime<Tz>)> {
    let tz = now.timezone();
    let (from, days) = match period {
        Period::Today => (start_of_day(now), 1),
        Period::ThisWeek => (start_of_week(now), 7),
        Period::NextWeek => (shift_days(start_of_week(now), 7)?, 7),
        Period::LastWeek => (shift_days(start_of_week(now), -7)?, 7),
        Period::Week { year, week } => (start_of_iso_week(year, week, tz)?, 7),
    };
    let until = shift_days(from, days)?;
    Some((from, until))
}

impl From<(DateTime<Tz>, DateTime<Tz>)> for TimeRange {
    fn from((from, until): (DateTime<Tz>, DateTime<Tz>)) -> Self {
        TimeRange::between(from.with_timezone(&Utc), until.with_timezone(&Utc))
    }
}

fn shift_days(at: DateTime<Tz>, days: i64) -> Option<DateTime<Tz>> {
    let date = if days >= 0 {
        at.date_naive().checked_add_days(Days::new(days.unsigned_abs()))?
    } else {
        at.date_naive().checked_sub_days(Days::new(days.unsigned_abs()))?
    };
    Some(local_midnight(date, at.timezone()))
}

/// First instant of `date` in `tz`. Zones that skip midnight start the day at
/// the first valid local time after it.
fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Tz> {
    let naive = date.and_time(NaiveTime::MIN);
    (0..=3)
        .find_map(|hours| {
            tz.from_local_datetime(&(naive + chrono::Duration::hours(hours)))
                .earliest()
        })
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use chrono::Timelike;
    use chrono_tz::Europe::Amsterdam;

    fn ymd(date: DateTime<Tz>) -> (i32, u32, u32) {
        (date.year(), date.month(), date.day())
    }

    #[test]
    fn test_iso_week_start() {
        let cases = [
            (2020, 1, (2019, 12, 30)),
            (2020, 2, (2020, 1, 6)),
            (2020, 25, (2020, 6, 15)),
            (2020, 40, (2020, 9, 28)),
            (2020, 46, (2020, 11, 9)),
        ];
        for (year, week, expected) in cases {
            let start = start_of_iso_week(year, week, chrono_tz::UTC).unwrap();
            assert_eq!(ymd(start), expected, "{} week {}", year, week);
            assert_eq!(start.hour(), 0);
        }
    }

    #[test]
    fn test_iso_week_out_of_range() {
        assert!(start_of_iso_week(2020, 54, chrono_tz::UTC).is_none());
        assert!(start_of_iso_week(2020, 0, chrono_tz::UTC).is_none());
        // 2020 has 53 ISO weeks
        assert!(start_of_iso_week(2020, 53, chrono_tz::UTC).is_some());
    }

    #[test]
    fn test_start_of_week_is_monday() {
        // Sunday
        let now = Amsterdam.with_ymd_and_hms(2020, 1, 12, 15, 30, 0).unwrap();
        let start = start_of_week(now);
        assert_eq!(ymd(start), (2020, 1, 6));
        assert_eq!(start.weekday(), Weekday::Mon);
        assert_eq!(start.hour(), 0);

        // Monday itself
        let now = Amsterdam.with_ymd_and_hms(2020, 1, 6, 0, 0, 0).unwrap();
        assert_eq!(ymd(start_of_week(now)), (2020, 1, 6));
    }

    #[test]
    fn test_period_ranges() {
        let now = Amsterdam.with_ymd_and_hms(2020, 1, 8, 12, 0, 0).unwrap();

        let (from, until) = period_range(Period::Today, now).unwrap();
        assert_eq!(ymd(from), (2020, 1, 8));
        assert_eq!(ymd(until), (2020, 1, 9));

        let (from, until) = period_range(Period::NextWeek, now).unwrap();
        assert_eq!(ymd(from), (2020, 1, 13));
        assert_eq!(ymd(until), (2020, 1, 20));

        let (from, _) = period_range(Period::LastWeek, now).unwrap();
        assert_eq!(ymd(from), (2019, 12, 30));

        let (from, _) = period_range(Period::Week { year: 2020, week: 25 }, now).unwrap();
        assert_eq!(ymd(from), (2020, 6, 15));

        assert!(period_range(Period::Week { year: 2020, week: 60 }, now).is_none());
    }

    #[test]
    fn test_week_across_dst_change_is_seven_days() {
        // DST starts on Sunday 29 March 2020 in Amsterdam
        let now = Amsterdam.with_ymd_and_hms(2020, 3, 25, 12, 0, 0).unwrap();
        let (from, until) = period_range(Period::ThisWeek, now).unwrap();
        assert_eq!(ymd(from), (2020, 3, 23));
        assert_eq!(ymd(until), (2020, 3, 30));
        assert_eq!(until.hour(), 0);
        assert_eq!((until - from).num_hours(), 7 * 24 - 1);
    }
}
