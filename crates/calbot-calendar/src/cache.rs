//! In-memory cache in front of a calendar source.
//!
//! The full event set of the wrapped source is kept for a fixed period and
//! then dropped by a timer task. Concurrent cache misses are collapsed into a
//! single upstream fetch.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::task::AbortHandle;

use crate::error::CalendarError;
use crate::source::CalendarSource;
use crate::types::{between, Event, TimeRange};

pub const DEFAULT_CACHE_PERIOD: Duration = Duration::from_secs(5 * 60);

#[derive(Default)]
struct CacheState {
    events: Option<Arc<Vec<Event>>>,
    expiry: Option<AbortHandle>,
    /// Bumped on every population so a stale timer cannot clear a newer cache.
    generation: u64,
}

#[derive(Default)]
struct FillSlot {
    last_error: Option<CalendarError>,
}

#[derive(Default)]
struct CacheInner {
    state: RwLock<CacheState>,
    fill: tokio::sync::Mutex<FillSlot>,
    attempts: AtomicU64,
}

impl CacheInner {
    fn cached(&self) -> Option<Arc<Vec<Event>>> {
        self.state.read().events.clone()
    }

    fn clean(&self) {
        let mut state = self.state.write();
        state.events = None;
        if let Some(timer) = state.expiry.take() {
            timer.abort();
        }
    }

    fn expire(&self, generation: u64) {
        let mut state = self.state.write();
        if state.generation == generation {
            tracing::debug!("Calendar cache expired");
            state.events = None;
            state.expiry = None;
        }
    }
}

/// Decorator that memoizes a [`CalendarSource`] for `period`.
pub struct CachingCalendar {
    source: Arc<dyn CalendarSource>,
    period: Duration,
    inner: Arc<CacheInner>,
}

impl CachingCalendar {
    pub fn new(source: Arc<dyn CalendarSource>, period: Duration) -> Self {
        Self {
            source,
            period,
            inner: Arc::new(CacheInner::default()),
        }
    }

    pub fn with_default_period(source: Arc<dyn CalendarSource>) -> Self {
        Self::new(source, DEFAULT_CACHE_PERIOD)
    }

    /// The complete event set, fetched from the wrapped source on a miss.
    pub async fn events(&self) -> Result<Arc<Vec<Event>>, CalendarError> {
        if let Some(events) = self.inner.cached() {
            return Ok(events);
        }

        let seen = self.inner.attempts.load(Ordering::Acquire);
        let mut slot = self.inner.fill.lock().await;

        // Another caller filled the cache while we waited.
        if let Some(events) = self.inner.cached() {
            return Ok(events);
        }
        // Another caller tried and failed while we waited; share its outcome.
        if self.inner.attempts.load(Ordering::Acquire) != seen {
            if let Some(err) = slot.last_error.clone() {
                return Err(err);
            }
        }

        let result = self.source.fetch(TimeRange::all()).await;
        self.inner.attempts.fetch_add(1, Ordering::AcqRel);

        match result {
            Ok(events) => {
                slot.last_error = None;
                let events = Arc::new(events);
                self.populate(events.clone());
                Ok(events)
            }
            Err(e) => {
                tracing::warn!("Calendar fetch failed, cache left empty: {}", e);
                slot.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    fn populate(&self, events: Arc<Vec<Event>>) {
        let mut state = self.inner.state.write();
        state.generation += 1;
        state.events = Some(events);
        if let Some(old) = state.expiry.take() {
            old.abort();
        }

        let generation = state.generation;
        let period = self.period;
        let weak: Weak<CacheInner> = Arc::downgrade(&self.inner);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(period).await;
            if let Some(inner) = weak.upgrade() {
                inner.expire(generation);
            }
        });
        state.expiry = Some(timer.abort_handle());
    }

    /// Drop the cached events and cancel the pending expiry. Idempotent.
    pub fn clean(&self) {
        self.inner.clean();
    }

    pub fn is_cached(&self) -> bool {
        self.inner.state.read().events.is_some()
    }

    pub fn has_pending_expiry(&self) -> bool {
        self.inner.state.read().expiry.is_some()
    }
}

impl Drop for CachingCalendar {
    fn drop(&mut self) {
        self.inner.clean();
    }
}

#[async_trait]
impl CalendarSource for CachingCalendar {
    async fn fetch(&self, range: TimeRange) -> Result<Vec<Event>, CalendarError> {
        let events = self.events().await?;
        Ok(between(events.as_ref().clone(), range))
    }
}
