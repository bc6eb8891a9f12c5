//! CalDAV-backed calendar source.
//!
//! The whole collection is requested with a calendar-query REPORT and filtered
//! locally on start time, so servers without time-range support still work.

use async_trait::async_trait;
use chrono_tz::Tz;
use tracing::instrument;

use crate::client::{CalendarHttpClient, CalendarUrl};
use crate::error::CalendarError;
use crate::ics::parse_events;
use crate::source::CalendarSource;
use crate::types::{between, sort_events, Event, TimeRange};

const CALENDAR_QUERY: &str = r#"<?xml version="1.0" encoding="utf-8" ?>
<C:calendar-query xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
    <D:prop>
        <D:getetag/>
        <C:calendar-data/>
    </D:prop>
    <C:filter>
        <C:comp-filter name="VCALENDAR">
            <C:comp-filter name="VEVENT"/>
        </C:comp-filter>
    </C:filter>
</C:calendar-query>"#;

pub struct CalDavCalendar {
    http: CalendarHttpClient,
    target: CalendarUrl,
    zone: Tz,
}

impl CalDavCalendar {
    pub fn new(http: CalendarHttpClient, address: &str, zone: Tz) -> Result<Self, CalendarError> {
        Ok(Self {
            http,
            target: CalendarUrl::parse(address)?,
            zone,
        })
    }

    /// Fetch once to check that the address is a working CalDAV collection.
    pub async fn validate(&self) -> Result<(), CalendarError> {
        self.fetch(TimeRange::all()).await.map(|_| ())
    }
}

#[async_trait]
impl CalendarSource for CalDavCalendar {
    #[instrument(skip(self), fields(url = %self.target.url), level = "debug")]
    async fn fetch(&self, range: TimeRange) -> Result<Vec<Event>, CalendarError> {
        let body = self.http.report(&self.target, CALENDAR_QUERY).await?;

        let mut events = Vec::new();
        for data in parse_multistatus(&body)? {
            events.extend(parse_events(&data, self.zone)?);
        }

        let mut events = between(events, range);
        sort_events(&mut events);
        tracing::debug!("Fetched {} CalDAV events", events.len());
        Ok(events)
    }
}

/// Extract the `calendar-data` payloads from a multistatus response.
fn parse_multistatus(body: &str) -> Result<Vec<String>, CalendarError> {
    let doc = roxmltree::Document::parse(body)
        .map_err(|e| CalendarError::InvalidData(format!("multistatus: {}", e)))?;

    let root = doc.root_element();
    if root.tag_name().name() != "multistatus" {
        return Err(CalendarError::InvalidData(format!(
            "expected multistatus, got {}",
            root.tag_name().name()
        )));
    }

    let payloads = root
        .descendants()
        .filter(|n| n.tag_name().name() == "response")
        .filter_map(|response| {
            response
                .descendants()
                .find(|n| n.tag_name().name() == "calendar-data")
                .and_then(|n| n.text())
                .map(|s| s.to_string())
        })
        .collect();

    Ok(payloads)
}
