//! iCal feed source. The feed is downloaded on every fetch; wrap it in a
//! [`CachingCalendar`](crate::cache::CachingCalendar) to avoid that.

use async_trait::async_trait;
use chrono_tz::Tz;
use tracing::instrument;

use crate::client::{CalendarHttpClient, CalendarUrl};
use crate::error::CalendarError;
use crate::ics::parse_events;
use crate::source::CalendarSource;
use crate::types::{between, sort_events, Event, TimeRange};

pub struct ICalCalendar {
    http: CalendarHttpClient,
    target: CalendarUrl,
    zone: Tz,
}

impl ICalCalendar {
    pub fn new(http: CalendarHttpClient, address: &str, zone: Tz) -> Result<Self, CalendarError> {
        Ok(Self {
            http,
            target: CalendarUrl::parse(address)?,
            zone,
        })
    }

    pub async fn validate(&self) -> Result<(), CalendarError> {
        self.fetch(TimeRange::all()).await.map(|_| ())
    }
}

#[async_trait]
impl CalendarSource for ICalCalendar {
    #[instrument(skip(self), fields(url = %self.target.url), level = "debug")]
    async fn fetch(&self, range: TimeRange) -> Result<Vec<Event>, CalendarError> {
        let body = self.http.get_text(&self.target).await?;

        if !body.trim_start().starts_with("BEGIN:VCALENDAR") {
            return Err(CalendarError::InvalidData(
                "response is not an iCalendar document".to_string(),
            ));
        }

        let mut events = between(parse_events(&body, self.zone)?, range);
        sort_events(&mut events);
        tracing::debug!("Fetched {} iCal events", events.len());
        Ok(events)
    }
}
