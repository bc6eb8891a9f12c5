//! Users, their calendars and their reminder schedulers.
//!
//! The registry is loaded once from the [`RegistrationStore`] at startup and
//! mutated in memory afterwards, writing through to the store. Calendar
//! sources are built once per registration and reused for every query.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use calbot_calendar::{
    CachingCalendar, CalDavCalendar, CalendarError, CalendarHttpClient, CalendarKind,
    CalendarSource, CombinedCalendar, Event, ICalCalendar,
};
use calbot_core::DatabaseError;
use chrono::Utc;
use chrono_tz::Tz;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use crate::notifier::Notifier;
use crate::scheduler::{ArmOutcome, ReminderScheduler, SendFn, SendFuture};
use crate::store::{RegistrationStore, StoreResult};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Calendar not found: {0}")]
    CalendarNotFound(String),

    #[error("Duplicate calendar name: {0}")]
    DuplicateCalendarName(String),

    #[error("Address is not a supported {kind} calendar: {reason}")]
    UnsupportedCalendarType {
        kind: CalendarKind,
        reason: CalendarError,
    },

    #[error(transparent)]
    Calendar(#[from] CalendarError),

    #[error(transparent)]
    Storage(#[from] DatabaseError),
}

impl RegistryError {
    /// Reply text for the chat user.
    pub fn user_message(&self) -> String {
        match self {
            Self::CalendarNotFound(name) => format!("There is no calendar named {}", name),
            Self::DuplicateCalendarName(name) => format!(
                "You already have a calendar named {}. Please choose a different name",
                name
            ),
            Self::UnsupportedCalendarType { kind, .. } => format!(
                "Specified address is not a supported {} calendar",
                kind.display_name()
            ),
            Self::Calendar(e) => e.user_message(),
            Self::Storage(_) => "Oops, something went wrong".to_string(),
        }
    }

    /// Errors caused by the user's input rather than by a failure.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::CalendarNotFound(_)
                | Self::DuplicateCalendarName(_)
                | Self::UnsupportedCalendarType { .. }
                | Self::Calendar(CalendarError::NoCalendars)
        )
    }
}

/// Builds calendar sources for registrations.
#[async_trait]
pub trait SourceFactory: Send + Sync {
    fn build(&self, kind: CalendarKind, uri: &str)
        -> Result<Arc<dyn CalendarSource>, CalendarError>;

    /// Fetch once from `uri` to check it is a calendar of `kind`.
    async fn probe(&self, kind: CalendarKind, uri: &str) -> Result<(), CalendarError>;
}

/// Builds CalDAV and iCal sources over HTTP, cached for `cache_period`.
pub struct HttpSourceFactory {
    http: CalendarHttpClient,
    zone: Tz,
    cache_period: Duration,
}

impl HttpSourceFactory {
    pub fn new(http: CalendarHttpClient, zone: Tz, cache_period: Duration) -> Self {
        Self {
            http,
            zone,
            cache_period,
        }
    }

    fn build_uncached(
        &self,
        kind: CalendarKind,
        uri: &str,
    ) -> Result<Arc<dyn CalendarSource>, CalendarError> {
        let source: Arc<dyn CalendarSource> = match kind {
            CalendarKind::CalDav => {
                Arc::new(CalDavCalendar::new(self.http.clone(), uri, self.zone)?)
            }
            CalendarKind::ICal => Arc::new(ICalCalendar::new(self.http.clone(), uri, self.zone)?),
        };
        Ok(source)
    }
}

#[async_trait]
impl SourceFactory for HttpSourceFactory {
    fn build(
        &self,
        kind: CalendarKind,
        uri: &str,
    ) -> Result<Arc<dyn CalendarSource>, CalendarError> {
        let source = self.build_uncached(kind, uri)?;
        if self.cache_period.is_zero() {
            return Ok(source);
        }
        Ok(Arc::new(CachingCalendar::new(source, self.cache_period)))
    }

    async fn probe(&self, kind: CalendarKind, uri: &str) -> Result<(), CalendarError> {
        match kind {
            CalendarKind::CalDav => {
                CalDavCalendar::new(self.http.clone(), uri, self.zone)?
                    .validate()
                    .await
            }
            CalendarKind::ICal => {
                ICalCalendar::new(self.http.clone(), uri, self.zone)?
                    .validate()
                    .await
            }
        }
    }
}

/// Lead times and lookahead applied to every user's scheduler.
#[derive(Debug, Clone)]
pub struct ReminderSettings {
    pub lead_times: Vec<Duration>,
    pub lookahead: Duration,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            lead_times: vec![Duration::ZERO, Duration::from_secs(10 * 60)],
            lookahead: Duration::from_secs(60 * 60),
        }
    }
}

/// A registered calendar with its live source.
pub struct UserCalendar {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub kind: CalendarKind,
    pub uri: String,
    source: Arc<dyn CalendarSource>,
}

impl UserCalendar {
    pub fn source(&self) -> Arc<dyn CalendarSource> {
        self.source.clone()
    }
}

impl std::fmt::Debug for UserCalendar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCalendar")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

pub struct User {
    pub user_id: String,
    room: Arc<RwLock<Option<String>>>,
    calendars: RwLock<Vec<Arc<UserCalendar>>>,
    /// Serialises calendar additions so the name check holds until the push.
    adding: tokio::sync::Mutex<()>,
    scheduler: ReminderScheduler,
}

impl User {
    /// Canonical room for this user, if one has been established.
    pub fn room(&self) -> Option<String> {
        self.room.read().clone()
    }

    pub fn calendars(&self) -> Vec<Arc<UserCalendar>> {
        self.calendars.read().clone()
    }

    pub fn has_calendar(&self, name: &str) -> bool {
        self.find_calendar(name).is_some()
    }

    fn find_calendar(&self, name: &str) -> Option<Arc<UserCalendar>> {
        let name = name.to_lowercase();
        self.calendars
            .read()
            .iter()
            .find(|c| c.name.to_lowercase() == name)
            .cloned()
    }

    /// Snapshot of the user's calendars as one query target.
    pub fn combined_calendar(&self) -> CombinedCalendar {
        CombinedCalendar::new(self.calendars.read().iter().map(|c| c.source()).collect())
    }

    pub fn scheduler(&self) -> &ReminderScheduler {
        &self.scheduler
    }
}

/// Result of checking the room a message arrived in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomCheck {
    /// The user had no room yet; this one was stored.
    Stored,
    Same,
    /// The message came from another room than the canonical one.
    Different(String),
}

pub struct UserRegistry {
    users: RwLock<HashMap<String, Arc<User>>>,
    store: Arc<Mutex<dyn RegistrationStore>>,
    factory: Arc<dyn SourceFactory>,
    notifier: Arc<dyn Notifier>,
    settings: ReminderSettings,
}

impl UserRegistry {
    pub fn new(
        store: Arc<Mutex<dyn RegistrationStore>>,
        factory: Arc<dyn SourceFactory>,
        notifier: Arc<dyn Notifier>,
        settings: ReminderSettings,
    ) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            store,
            factory,
            notifier,
            settings,
        }
    }

    async fn with_store<T, F>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&dyn RegistrationStore) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || {
            let guard = store.lock();
            f(&*guard)
        })
        .await
        .map_err(|e| DatabaseError::TaskFailed(e.to_string()))?
    }

    fn new_user(&self, user_id: &str, room: Option<String>) -> Arc<User> {
        let room = Arc::new(RwLock::new(room));
        let send = reminder_sender(user_id.to_string(), room.clone(), self.notifier.clone());
        Arc::new(User {
            user_id: user_id.to_string(),
            room,
            calendars: RwLock::new(Vec::new()),
            adding: tokio::sync::Mutex::new(()),
            scheduler: ReminderScheduler::new(
                &self.settings.lead_times,
                self.settings.lookahead,
                send,
            ),
        })
    }

    /// Load every user and registration from the store.
    pub async fn load(&self) -> Result<usize, RegistryError> {
        let (stored_users, stored_calendars) = self
            .with_store(|s| Ok((s.load_users()?, s.load_calendars()?)))
            .await?;

        let mut users: HashMap<String, Arc<User>> = HashMap::new();
        for stored in stored_users {
            let user = self.new_user(&stored.user_id, stored.room_id);
            users.insert(stored.user_id, user);
        }

        let mut loaded = 0;
        for cal in stored_calendars {
            let source = match self.factory.build(cal.kind, &cal.uri) {
                Ok(source) => source,
                Err(e) => {
                    tracing::warn!("Skipping calendar {} ({}): {}", cal.id, cal.name, e);
                    continue;
                }
            };
            let user = users
                .entry(cal.user_id.clone())
                .or_insert_with(|| self.new_user(&cal.user_id, None))
                .clone();
            user.calendars.write().push(Arc::new(UserCalendar {
                id: cal.id,
                user_id: cal.user_id,
                name: cal.name,
                kind: cal.kind,
                uri: cal.uri,
                source,
            }));
            loaded += 1;
        }

        tracing::info!("Loaded {} users with {} calendars", users.len(), loaded);
        *self.users.write() = users;
        Ok(loaded)
    }

    pub fn user(&self, user_id: &str) -> Option<Arc<User>> {
        self.users.read().get(user_id).cloned()
    }

    pub fn users(&self) -> Vec<Arc<User>> {
        self.users.read().values().cloned().collect()
    }

    fn get_or_create(&self, user_id: &str) -> Arc<User> {
        if let Some(user) = self.user(user_id) {
            return user;
        }
        self.users
            .write()
            .entry(user_id.to_string())
            .or_insert_with(|| self.new_user(user_id, None))
            .clone()
    }

    /// Record `room_id` as the user's room if none is known yet, otherwise
    /// report whether it matches.
    pub async fn ensure_room(&self, user_id: &str, room_id: &str) -> Result<RoomCheck, RegistryError> {
        let user = self.get_or_create(user_id);

        if let Some(room) = user.room() {
            return Ok(if room == room_id {
                RoomCheck::Same
            } else {
                RoomCheck::Different(room)
            });
        }

        let (uid, rid) = (user_id.to_string(), room_id.to_string());
        self.with_store(move |s| s.update_user_room(&uid, &rid)).await?;
        *user.room.write() = Some(room_id.to_string());
        tracing::info!("Stored room {} for {}", room_id, user_id);
        Ok(RoomCheck::Stored)
    }

    pub fn calendars(&self, user_id: &str) -> Vec<Arc<UserCalendar>> {
        self.user(user_id)
            .map(|u| u.calendars())
            .unwrap_or_default()
    }

    pub fn combined_calendar(&self, user_id: &str) -> CombinedCalendar {
        self.user(user_id)
            .map(|u| u.combined_calendar())
            .unwrap_or_default()
    }

    /// Validate, persist and activate a new calendar for `user_id`.
    pub async fn add_calendar(
        &self,
        user_id: &str,
        name: &str,
        kind: CalendarKind,
        uri: &str,
    ) -> Result<Arc<UserCalendar>, RegistryError> {
        let user = self.get_or_create(user_id);
        let adding = user.adding.lock().await;
        if user.has_calendar(name) {
            return Err(RegistryError::DuplicateCalendarName(name.to_string()));
        }

        if let Err(reason) = self.factory.probe(kind, uri).await {
            tracing::debug!("Probe of {} calendar failed: {}", kind, reason);
            return Err(RegistryError::UnsupportedCalendarType { kind, reason });
        }
        let source = self
            .factory
            .build(kind, uri)
            .map_err(|reason| RegistryError::UnsupportedCalendarType { kind, reason })?;

        let (uid, n, u) = (user_id.to_string(), name.to_string(), uri.to_string());
        let id = self
            .with_store(move |s| s.add_calendar(&uid, &n, kind, &u))
            .await?;

        let calendar = Arc::new(UserCalendar {
            id,
            user_id: user_id.to_string(),
            name: name.to_string(),
            kind,
            uri: uri.to_string(),
            source,
        });
        user.calendars.write().push(calendar.clone());
        drop(adding);
        tracing::info!("Added {} calendar {} for {}", kind, name, user_id);

        self.refresh_logged(&user).await;
        Ok(calendar)
    }

    pub async fn remove_calendar(&self, user_id: &str, name: &str) -> Result<(), RegistryError> {
        let user = self
            .user(user_id)
            .ok_or_else(|| RegistryError::CalendarNotFound(name.to_string()))?;
        let calendar = user
            .find_calendar(name)
            .ok_or_else(|| RegistryError::CalendarNotFound(name.to_string()))?;

        let (uid, n) = (user_id.to_string(), calendar.name.clone());
        self.with_store(move |s| s.remove_calendar(&uid, &n)).await?;

        user.calendars.write().retain(|c| c.id != calendar.id);
        tracing::info!("Removed calendar {} for {}", calendar.name, user_id);

        self.refresh_logged(&user).await;
        Ok(())
    }

    /// Recompute one user's reminders. A user without calendars goes idle.
    pub async fn refresh_user(&self, user: &User) -> Result<ArmOutcome, CalendarError> {
        let calendar = user.combined_calendar();
        match user.scheduler.arm(&calendar, Utc::now()).await {
            Err(CalendarError::NoCalendars) => {
                user.scheduler.stop();
                Ok(ArmOutcome::Idle)
            }
            other => other,
        }
    }

    async fn refresh_logged(&self, user: &User) {
        match self.refresh_user(user).await {
            Ok(outcome) => tracing::debug!("Reminders for {}: {:?}", user.user_id, outcome),
            Err(e) => tracing::warn!("Could not refresh reminders for {}: {}", user.user_id, e),
        }
    }

    /// Recompute every user's reminders; failures are logged and skipped
    /// until the next round. Returns the number of users that failed.
    pub async fn refresh_all(&self) -> usize {
        let mut failed = 0;
        for user in self.users() {
            if let Err(e) = self.refresh_user(&user).await {
                tracing::warn!("Skipping reminder refresh for {}: {}", user.user_id, e);
                failed += 1;
            }
        }
        failed
    }

    pub fn stop_all(&self) {
        for user in self.users() {
            user.scheduler.stop();
        }
    }

    /// Wait for reminder deliveries still in progress.
    pub async fn flush(&self) {
        for user in self.users() {
            user.scheduler.wait_idle().await;
        }
    }
}

fn reminder_sender(
    user_id: String,
    room: Arc<RwLock<Option<String>>>,
    notifier: Arc<dyn Notifier>,
) -> SendFn {
    Arc::new(move |event: Event| -> SendFuture {
        let destination = room.read().clone();
        let notifier = notifier.clone();
        let user_id = user_id.clone();
        Box::pin(async move {
            let Some(destination) = destination else {
                tracing::warn!("No room known for {}, dropping reminder for {:?}", user_id, event.text);
                return;
            };
            if let Err(e) = notifier.notify(&destination, &event).await {
                tracing::error!("Failed to deliver reminder to {}: {}", destination, e);
            }
        })
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::store::SqliteRegistrationStore;
    use calbot_calendar::{between, EventQuery, TimeRange};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FixedSource(Vec<Event>);

    #[async_trait]
    impl CalendarSource for FixedSource {
        async fn fetch(&self, range: TimeRange) -> Result<Vec<Event>, CalendarError> {
            Ok(between(self.0.clone(), range))
        }
    }

    /// Accepts any address except ones containing "bad".
    struct StaticFactory {
        events: Vec<Event>,
        probes: AtomicU32,
        probe_delay: Duration,
    }

    #[async_trait]
    impl SourceFactory for StaticFactory {
        fn build(
            &self,
            _kind: CalendarKind,
            _uri: &str,
        ) -> Result<Arc<dyn CalendarSource>, CalendarError> {
            Ok(Arc::new(FixedSource(self.events.clone())))
        }

        async fn probe(&self, _kind: CalendarKind, uri: &str) -> Result<(), CalendarError> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.probe_delay).await;
            if uri.contains("bad") {
                return Err(CalendarError::Status {
                    status: 404,
                    url: uri.to_string(),
                });
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier(Mutex<Vec<(String, String)>>);

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, destination: &str, event: &Event) -> anyhow::Result<()> {
            self.0.lock().push((destination.to_string(), event.text.clone()));
            Ok(())
        }
    }

    fn soon(ms: i64, text: &str) -> Event {
        let from = (Utc::now() + chrono::Duration::milliseconds(ms)).fixed_offset();
        Event::new(from, from, text)
    }

    fn registry_with(
        store: SqliteRegistrationStore,
        events: Vec<Event>,
    ) -> (UserRegistry, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier::default());
        let registry = registry_full(store, events, Duration::ZERO, notifier.clone());
        (registry, notifier)
    }

    fn registry_full(
        store: SqliteRegistrationStore,
        events: Vec<Event>,
        probe_delay: Duration,
        notifier: Arc<dyn Notifier>,
    ) -> UserRegistry {
        UserRegistry::new(
            Arc::new(Mutex::new(store)),
            Arc::new(StaticFactory {
                events,
                probes: AtomicU32::new(0),
                probe_delay,
            }),
            notifier,
            ReminderSettings {
                lead_times: vec![Duration::ZERO],
                lookahead: Duration::from_secs(3600),
            },
        )
    }

    #[tokio::test]
    async fn test_add_and_list() {
        let (registry, _) = registry_with(SqliteRegistrationStore::in_memory().unwrap(), vec![]);
        registry
            .add_calendar("@a:x", "work", CalendarKind::CalDav, "https://dav/")
            .await
            .unwrap();

        let calendars = registry.calendars("@a:x");
        assert_eq!(calendars.len(), 1);
        assert_eq!(calendars[0].name, "work");
        assert!(registry.calendars("@b:x").is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_name_is_case_insensitive() {
        let (registry, _) = registry_with(SqliteRegistrationStore::in_memory().unwrap(), vec![]);
        registry
            .add_calendar("@a:x", "Work", CalendarKind::CalDav, "https://dav/")
            .await
            .unwrap();
        let err = registry
            .add_calendar("@a:x", "work", CalendarKind::ICal, "https://feed/")
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateCalendarName(_)));
        assert!(err.is_user_error());
    }

    #[tokio::test]
    async fn test_failed_probe_rejects_add() {
        let (registry, _) = registry_with(SqliteRegistrationStore::in_memory().unwrap(), vec![]);
        let err = registry
            .add_calendar("@a:x", "home", CalendarKind::ICal, "https://bad/")
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Specified address is not a supported ical calendar");
        assert!(registry.calendars("@a:x").is_empty());
    }

    #[tokio::test]
    async fn test_remove() {
        let (registry, _) = registry_with(SqliteRegistrationStore::in_memory().unwrap(), vec![]);
        registry
            .add_calendar("@a:x", "home", CalendarKind::ICal, "https://feed/")
            .await
            .unwrap();

        let err = registry.remove_calendar("@a:x", "work").await.unwrap_err();
        assert!(matches!(err, RegistryError::CalendarNotFound(_)));

        registry.remove_calendar("@a:x", "HOME").await.unwrap();
        assert!(registry.calendars("@a:x").is_empty());
        let err = registry
            .combined_calendar("@a:x")
            .events(TimeRange::all())
            .await
            .unwrap_err();
        assert_eq!(err, CalendarError::NoCalendars);
    }

    #[tokio::test]
    async fn test_ensure_room() {
        let (registry, _) = registry_with(SqliteRegistrationStore::in_memory().unwrap(), vec![]);
        assert_eq!(registry.ensure_room("@a:x", "!one").await.unwrap(), RoomCheck::Stored);
        assert_eq!(registry.ensure_room("@a:x", "!one").await.unwrap(), RoomCheck::Same);
        assert_eq!(
            registry.ensure_room("@a:x", "!two").await.unwrap(),
            RoomCheck::Different("!one".into())
        );
    }

    #[tokio::test]
    async fn test_load_restores_registrations() {
        let store = SqliteRegistrationStore::in_memory().unwrap();
        store.add_user("@a:x", "!room").unwrap();
        store
            .add_calendar("@a:x", "work", CalendarKind::CalDav, "https://dav/")
            .unwrap();
        store
            .add_calendar("@b:x", "feed", CalendarKind::ICal, "https://feed/")
            .unwrap();

        let (registry, _) = registry_with(store, vec![]);
        assert_eq!(registry.load().await.unwrap(), 2);
        assert_eq!(registry.users().len(), 2);
        assert_eq!(registry.user("@a:x").unwrap().room(), Some("!room".into()));
        assert_eq!(registry.user("@b:x").unwrap().room(), None);
    }

    #[tokio::test]
    async fn test_reminders_reach_the_users_room() {
        let (registry, notifier) = registry_with(
            SqliteRegistrationStore::in_memory().unwrap(),
            vec![soon(150, "standup")],
        );
        registry.ensure_room("@a:x", "!room").await.unwrap();
        registry
            .add_calendar("@a:x", "work", CalendarKind::CalDav, "https://dav/")
            .await
            .unwrap();

        let user = registry.user("@a:x").unwrap();
        assert!(user.scheduler().is_armed());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(
            *notifier.0.lock(),
            vec![("!room".to_string(), "standup".to_string())]
        );
    }

    #[tokio::test]
    async fn test_refresh_without_calendars_is_idle() {
        let (registry, _) = registry_with(SqliteRegistrationStore::in_memory().unwrap(), vec![]);
        registry.ensure_room("@a:x", "!room").await.unwrap();
        let user = registry.user("@a:x").unwrap();
        assert_eq!(registry.refresh_user(&user).await.unwrap(), ArmOutcome::Idle);
        assert_eq!(registry.refresh_all().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_adds_with_same_name() {
        let registry = registry_full(
            SqliteRegistrationStore::in_memory().unwrap(),
            vec![],
            Duration::from_millis(50),
            Arc::new(RecordingNotifier::default()),
        );

        let (a, b) = tokio::join!(
            registry.add_calendar("@a:x", "work", CalendarKind::CalDav, "https://a/"),
            registry.add_calendar("@a:x", "WORK", CalendarKind::ICal, "https://b/"),
        );
        assert!(a.is_ok());
        assert!(matches!(b, Err(RegistryError::DuplicateCalendarName(_))));
        assert_eq!(registry.calendars("@a:x").len(), 1);
    }

    /// Takes 100 ms for the first reminder it sees.
    #[derive(Default)]
    struct SlowFirstNotifier(Mutex<Vec<String>>);

    #[async_trait]
    impl Notifier for SlowFirstNotifier {
        async fn notify(&self, _destination: &str, event: &Event) -> anyhow::Result<()> {
            if event.text == "first" {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            self.0.lock().push(event.text.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_slow_delivery_does_not_reorder_reminders() {
        let notifier = Arc::new(SlowFirstNotifier::default());
        let registry = registry_full(
            SqliteRegistrationStore::in_memory().unwrap(),
            vec![soon(150, "first"), soon(170, "second")],
            Duration::ZERO,
            notifier.clone(),
        );
        registry.ensure_room("@a:x", "!room").await.unwrap();
        registry
            .add_calendar("@a:x", "work", CalendarKind::CalDav, "https://dav/")
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(350)).await;
        registry.stop_all();
        registry.flush().await;
        assert_eq!(*notifier.0.lock(), vec!["first", "second"]);
    }
}
