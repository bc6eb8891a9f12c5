//! Text commands and their replies.
//!
//! Command words and calendar names are matched lower-cased; calendar
//! addresses keep their case.

use std::sync::Arc;

use calbot_calendar::{
    format_to_days, period_range, CalendarError, CalendarKind, EventQuery, Period, TimeRange,
};
use calbot_services::{RegistryError, RoomCheck, UserRegistry};
use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;

use crate::help::{format_all_help, format_help, format_usage, HELP_CAL, USAGE_CAL_ADD, USAGE_CAL_REMOVE};

const NO_CALENDARS: &str =
    "You haven't configured any calendars. Use the 'cal add' command to start.";
const SOMETHING_WENT_WRONG: &str = "Oops, something went wrong";

/// A reply as plain text plus an optional HTML rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub msg: String,
    pub msg_formatted: String,
}

impl Reply {
    pub fn new(msg: impl Into<String>, msg_formatted: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            msg_formatted: msg_formatted.into(),
        }
    }

    pub fn plain(msg: impl Into<String>) -> Self {
        Self::new(msg, "")
    }
}

pub struct CommandHandler {
    registry: Arc<UserRegistry>,
    zone: Tz,
}

impl CommandHandler {
    pub fn new(registry: Arc<UserRegistry>, zone: Tz) -> Self {
        Self { registry, zone }
    }

    pub async fn handle(&self, sender: &str, room: &str, body: &str) -> Vec<Reply> {
        self.handle_at(sender, room, body, Utc::now()).await
    }

    /// Handle one message as if it arrived at `now`.
    pub async fn handle_at(
        &self,
        sender: &str,
        room: &str,
        body: &str,
        now: DateTime<Utc>,
    ) -> Vec<Reply> {
        let mut replies = Vec::new();

        match self.registry.ensure_room(sender, room).await {
            Ok(RoomCheck::Different(canonical)) => replies.push(Reply::plain(format!(
                "This is not the room we normally use. Please go to: {}",
                canonical
            ))),
            Ok(_) => {}
            Err(e) => {
                tracing::error!("Could not store room for {}: {}", sender, e);
                replies.push(Reply::plain(SOMETHING_WENT_WRONG));
            }
        }

        let raw: Vec<&str> = body.trim().split(' ').collect();
        let args: Vec<String> = raw.iter().map(|a| a.to_lowercase()).collect();
        let arg = |i: usize| args.get(i).map(String::as_str);

        let result = match arg(0).unwrap_or_default() {
            "events" | "week" => match parse_week_args(&args, now.with_timezone(&self.zone).year()) {
                Ok(period) => self.list_events(sender, period, now).await,
                Err(errors) => {
                    replies.extend(errors);
                    Ok(Reply::default())
                }
            },
            "today" => self.list_events(sender, Period::Today, now).await,
            "next" => match arg(1) {
                Some("week") => self.list_events(sender, Period::NextWeek, now).await,
                _ => Ok(Reply::plain("Next what? 'next week'?")),
            },
            "last" | "prev" | "previous" => match arg(1) {
                Some("week") => self.list_events(sender, Period::LastWeek, now).await,
                _ => Ok(Reply::plain("Last what? 'last week'?")),
            },
            "cal" | "calendar" => match arg(1) {
                None | Some("list") => Ok(self.list_calendars(sender)),
                Some("add") => self.add_calendar(sender, &args, &raw).await,
                Some("remove") => self.remove_calendar(sender, &args).await,
                Some(_) => {
                    replies.push(Reply::plain("Unknown option"));
                    Ok(format_help(&HELP_CAL))
                }
            },
            "help" | "?" => Ok(format_all_help()),
            _ => {
                replies.push(Reply::plain("Unknown command"));
                Ok(format_all_help())
            }
        };

        match result {
            Ok(reply) if !reply.msg.is_empty() => replies.push(reply),
            Ok(_) => {}
            Err(e) if e.is_user_error() => {
                tracing::debug!("Command from {} rejected: {}", sender, e);
                replies.push(Reply::plain(e.user_message()));
            }
            Err(e) => {
                tracing::error!("Command {:?} from {} failed: {}", body, sender, e);
                replies.push(Reply::plain(SOMETHING_WENT_WRONG));
            }
        }

        replies
    }

    async fn list_events(
        &self,
        sender: &str,
        period: Period,
        now: DateTime<Utc>,
    ) -> Result<Reply, RegistryError> {
        let Some((from, until)) = period_range(period, now.with_timezone(&self.zone)) else {
            return Ok(Reply::plain("Invalid week specified"));
        };

        let calendar = self.registry.combined_calendar(sender);
        let events = match calendar.events(TimeRange::from((from, until))).await {
            Ok(events) => events,
            Err(CalendarError::NoCalendars) => return Ok(Reply::plain(NO_CALENDARS)),
            Err(e) => return Err(e.into()),
        };

        let mut lines = Vec::new();
        let mut lines_f = Vec::new();

        if period.is_week() {
            let week = from.iso_week().week();
            lines.extend([format!("Week {}", week), String::new()]);
            lines_f.extend([format!("<b>Week {}</b>", week), String::new()]);
        }

        for (i, day) in format_to_days(&events).iter().enumerate() {
            if until < day.day {
                continue;
            }
            if i > 0 {
                lines.push(String::new());
                lines_f.push(String::new());
            }

            let header = day.day.format("%A %-d %B").to_string();
            lines_f.push(format!("<b>{}</b>", header));
            lines.push(header);

            for ev in &day.events {
                let (start, end) = (ev.from.format("%H:%M"), ev.to.format("%H:%M"));
                lines.push(format!("{} - {}: {}", start, end, ev.text));
                lines_f.push(format!("<code>{} - {}</code>: {}", start, end, ev.text));
            }
        }

        Ok(Reply::new(lines.join("\n"), lines_f.join("<br />")))
    }

    fn list_calendars(&self, sender: &str) -> Reply {
        let calendars = self.registry.calendars(sender);
        if calendars.is_empty() {
            return Reply::plain(NO_CALENDARS);
        }

        let (mut lines, mut lines_f) = if calendars.len() == 1 {
            (
                vec!["You have one calendar".to_string()],
                vec!["You have <b>one</b> calendar".to_string()],
            )
        } else {
            (
                vec![format!("You have {} calendars", calendars.len())],
                vec![format!("You have <b>{}</b> calendars", calendars.len())],
            )
        };
        lines.push(String::new());
        lines_f.push(String::new());

        for (i, cal) in calendars.iter().enumerate() {
            if i > 0 {
                lines.push(String::new());
                lines_f.push(String::new());
            }
            lines.push(cal.name.clone());
            lines.push(format!("type: {}", cal.kind));
            lines_f.push(format!("<b>{}</b>", cal.name));
            lines_f.push(format!("type: {}", cal.kind));
        }

        Reply::new(lines.join("\n"), lines_f.join("<br />"))
    }

    async fn add_calendar(
        &self,
        sender: &str,
        args: &[String],
        raw: &[&str],
    ) -> Result<Reply, RegistryError> {
        if args.len() < 5 {
            return Ok(format_usage(&USAGE_CAL_ADD));
        }

        let name = args[2].as_str();
        let exists = self
            .registry
            .user(sender)
            .map(|u| u.has_calendar(name))
            .unwrap_or(false);
        if exists {
            return Ok(duplicate_reply(name));
        }

        let Ok(kind) = args[3].parse::<CalendarKind>() else {
            return Ok(Reply::plain(
                "Invalid calendar type specified. Supported types are 'caldav' and 'ical'.",
            ));
        };

        match self.registry.add_calendar(sender, name, kind, raw[4]).await {
            Ok(_) => Ok(Reply::plain("Calendar added")),
            Err(RegistryError::DuplicateCalendarName(_)) => Ok(duplicate_reply(name)),
            Err(e) => Err(e),
        }
    }

    async fn remove_calendar(&self, sender: &str, args: &[String]) -> Result<Reply, RegistryError> {
        if args.len() < 3 {
            return Ok(format_usage(&USAGE_CAL_REMOVE));
        }

        let name = args[2].as_str();
        match self.registry.remove_calendar(sender, name).await {
            Ok(()) => Ok(Reply::new(
                format!("Calendar {} removed", name),
                format!("Calendar <b>{}</b> removed", name),
            )),
            Err(RegistryError::CalendarNotFound(_)) => Ok(Reply::new(
                format!("There is no calendar named {}", name),
                format!("There is no calendar named <b>{}</b>", name),
            )),
            Err(e) => Err(e),
        }
    }
}

fn duplicate_reply(name: &str) -> Reply {
    Reply::new(
        format!(
            "You already have a calendar named {}. Please choose a different name",
            name
        ),
        format!(
            "You already have a calendar named <b>{}</b>. Please choose a different name.",
            name
        ),
    )
}

/// `week`, `week N` or `week Y N`. Errors are the replies to send.
fn parse_week_args(args: &[String], current_year: i32) -> Result<Period, Vec<Reply>> {
    let (year, week) = match args.len() {
        0 | 1 => return Ok(Period::ThisWeek),
        2 => (Ok(current_year), args[1].parse::<u32>()),
        _ => (args[1].parse::<i32>(), args[2].parse::<u32>()),
    };

    match (year, week) {
        (Ok(year), Ok(week)) => Ok(Period::Week { year, week }),
        (year, week) => {
            let mut errors = Vec::new();
            if year.is_err() {
                errors.push(Reply::plain("Invalid year specified"));
            }
            if week.is_err() {
                errors.push(Reply::plain("Invalid week specified"));
            }
            Err(errors)
        }
    }
}
