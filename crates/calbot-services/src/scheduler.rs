//! Per-user reminder scheduling.
//!
//! A [`ReminderScheduler`] turns the upcoming events of a calendar into a
//! sorted list of reminders and runs one background task that fires them at
//! their wall-clock time. Re-arming replaces the list; the running task is
//! only restarted when the next reminder changes.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use calbot_calendar::{CalendarError, Event, EventQuery, TimeRange};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

pub type SendFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Callback invoked when a reminder is due. Deliveries of one scheduler are
/// awaited one at a time, in reminder order.
pub type SendFn = Arc<dyn Fn(Event) -> SendFuture + Send + Sync>;

/// A point in time at which the user is reminded of `event`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub when: DateTime<Utc>,
    pub event: Event,
}

/// What an [`ReminderScheduler::arm`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmOutcome {
    /// No loop was running; one was started.
    Started,
    /// The next reminder changed; the old loop was stopped and a new one started.
    Restarted,
    /// The next reminder is the same; the running loop keeps going with the
    /// new list.
    Unchanged,
    /// Nothing to remind about; any running loop was stopped.
    Idle,
}

#[derive(Default)]
struct SchedulerState {
    reminders: VecDeque<Reminder>,
    /// Identifies the loop allowed to consume `reminders`.
    generation: u64,
    cancel: Option<CancellationToken>,
    /// Reminders already handed to `send` that may still show up in a
    /// recomputed list.
    fired: Vec<Reminder>,
}

pub struct ReminderScheduler {
    lead_times: Vec<chrono::Duration>,
    lookahead: chrono::Duration,
    send: SendFn,
    state: Arc<Mutex<SchedulerState>>,
    /// Held for the duration of one delivery.
    delivery: Arc<tokio::sync::Mutex<()>>,
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::days(365))
}

impl ReminderScheduler {
    pub fn new(lead_times: &[Duration], lookahead: Duration, send: SendFn) -> Self {
        Self {
            lead_times: lead_times.iter().copied().map(to_chrono).collect(),
            lookahead: to_chrono(lookahead),
            send,
            state: Arc::new(Mutex::new(SchedulerState::default())),
            delivery: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    fn max_lead(&self) -> chrono::Duration {
        self.lead_times
            .iter()
            .copied()
            .max()
            .unwrap_or_else(chrono::Duration::zero)
    }

    /// Reminders for events starting in `[now, now + lookahead + max lead]`
    /// whose time is strictly after `now`, sorted by time. Ties keep event
    /// order.
    pub async fn create_reminders(
        &self,
        calendar: &dyn EventQuery,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reminder>, CalendarError> {
        let until = now + self.lookahead + self.max_lead();
        let events = calendar.events(TimeRange::between(now, until)).await?;

        let mut reminders = Vec::new();
        for event in events {
            for lead in &self.lead_times {
                let when = event.start_utc() - *lead;
                if when > now {
                    reminders.push(Reminder {
                        when,
                        event: event.clone(),
                    });
                }
            }
        }

        reminders.sort_by_key(|r| r.when);
        Ok(reminders)
    }

    /// Recompute the reminders and make sure a loop is delivering them.
    ///
    /// On error the current list and loop are left as they were.
    pub async fn arm(
        &self,
        calendar: &dyn EventQuery,
        now: DateTime<Utc>,
    ) -> Result<ArmOutcome, CalendarError> {
        let mut reminders = self.create_reminders(calendar, now).await?;

        let mut state = self.state.lock();
        // The loop may have fired some of these while the calendar was queried.
        state.fired.retain(|f| f.when > now);
        reminders.retain(|r| !state.fired.contains(r));
        let running = state.cancel.is_some();

        if reminders.is_empty() {
            stop_locked(&mut state);
            return Ok(ArmOutcome::Idle);
        }

        if running && state.reminders.front() == reminders.first() {
            tracing::debug!("Next reminder unchanged, keeping loop ({} pending)", reminders.len());
            state.reminders = reminders.into();
            return Ok(ArmOutcome::Unchanged);
        }

        stop_locked(&mut state);
        state.reminders = reminders.into();
        let token = CancellationToken::new();
        state.cancel = Some(token.clone());
        let generation = state.generation;
        drop(state);

        tokio::spawn(reminder_loop(
            self.state.clone(),
            self.delivery.clone(),
            self.send.clone(),
            token,
            generation,
        ));

        Ok(if running {
            ArmOutcome::Restarted
        } else {
            ArmOutcome::Started
        })
    }

    /// Stop the loop and forget pending reminders.
    pub fn stop(&self) {
        stop_locked(&mut self.state.lock());
    }

    pub fn is_armed(&self) -> bool {
        self.state.lock().cancel.is_some()
    }

    pub fn pending(&self) -> Vec<Reminder> {
        self.state.lock().reminders.iter().cloned().collect()
    }

    /// Wait for a delivery in progress to finish.
    pub async fn wait_idle(&self) {
        let _turn = self.delivery.lock().await;
    }
}

impl Drop for ReminderScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn stop_locked(state: &mut SchedulerState) {
    if let Some(token) = state.cancel.take() {
        token.cancel();
    }
    state.reminders.clear();
    state.generation += 1;
}

async fn reminder_loop(
    state: Arc<Mutex<SchedulerState>>,
    delivery: Arc<tokio::sync::Mutex<()>>,
    send: SendFn,
    token: CancellationToken,
    generation: u64,
) {
    loop {
        let next = {
            let mut st = state.lock();
            if st.generation != generation || token.is_cancelled() {
                return;
            }
            match st.reminders.front() {
                Some(next) => next.clone(),
                None => {
                    st.cancel = None;
                    tracing::debug!("No reminders left, loop finished");
                    return;
                }
            }
        };

        let wait = (next.when - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        tracing::debug!("Next reminder for {:?} in {:?}", next.event.text, wait);

        tokio::select! {
            _ = token.cancelled() => {
                tracing::debug!("Reminder loop stopped");
                return;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        let _turn = delivery.lock().await;
        let due = {
            let mut st = state.lock();
            if st.generation != generation || token.is_cancelled() {
                return;
            }
            // The tail may have been swapped while sleeping; only fire what we
            // waited for.
            if st.reminders.front() != Some(&next) {
                continue;
            }
            let due = st.reminders.pop_front();
            st.fired.push(next);
            due
        };

        if let Some(reminder) = due {
            send(reminder.event).await;
        }
    }
}
