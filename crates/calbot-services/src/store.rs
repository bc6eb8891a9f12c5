//! Persistence of users and calendar registrations.
//!
//! `RegistrationStore` is synchronous; callers on the async side wrap it in
//! `Arc<Mutex<_>>` and go through `spawn_blocking`.

use std::path::Path;

use calbot_calendar::CalendarKind;
use calbot_core::{DatabaseError, RusqliteErrorExt};
use rusqlite::{params, Connection, OptionalExtension};

pub type StoreResult<T> = Result<T, DatabaseError>;

/// A persisted user and the room reminders are sent to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUser {
    pub user_id: String,
    pub room_id: Option<String>,
}

/// A persisted calendar registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCalendar {
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub kind: CalendarKind,
    pub uri: String,
}

pub trait RegistrationStore: Send {
    fn load_users(&self) -> StoreResult<Vec<StoredUser>>;

    fn add_user(&self, user_id: &str, room_id: &str) -> StoreResult<()>;

    fn update_user_room(&self, user_id: &str, room_id: &str) -> StoreResult<()>;

    /// Every registration of every user, oldest first.
    fn load_calendars(&self) -> StoreResult<Vec<StoredCalendar>>;

    /// Store a registration and return its id.
    fn add_calendar(
        &self,
        user_id: &str,
        name: &str,
        kind: CalendarKind,
        uri: &str,
    ) -> StoreResult<i64>;

    /// Delete the registration named `name` (case-insensitive). Returns
    /// whether a row was removed.
    fn remove_calendar(&self, user_id: &str, name: &str) -> StoreResult<bool>;
}

pub struct SqliteRegistrationStore {
    conn: Connection,
}

impl SqliteRegistrationStore {
    /// Open (or create) the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;
            }
        }
        let conn = Connection::open(path).map_err(RusqliteErrorExt::into_database_error)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(RusqliteErrorExt::into_database_error)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        self.conn
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS user (
                    user_id TEXT NOT NULL PRIMARY KEY,
                    room_id TEXT,
                    created DATETIME DEFAULT CURRENT_TIMESTAMP
                );

                CREATE TABLE IF NOT EXISTS calendar (
                    id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL,
                    name TEXT NOT NULL,
                    cal_type TEXT NOT NULL,
                    uri TEXT NOT NULL,
                    created DATETIME DEFAULT CURRENT_TIMESTAMP
                );

                CREATE INDEX IF NOT EXISTS idx_calendar_user ON calendar(user_id);
                CREATE UNIQUE INDEX IF NOT EXISTS idx_calendar_user_name
                    ON calendar(user_id, lower(name));
                "#,
            )
            .map_err(RusqliteErrorExt::into_database_error)
    }

    fn user_exists(&self, user_id: &str) -> StoreResult<bool> {
        self.conn
            .query_row(
                "SELECT 1 FROM user WHERE user_id = ?1",
                params![user_id],
                |_| Ok(()),
            )
            .optional()
            .map(|row| row.is_some())
            .map_err(RusqliteErrorExt::into_database_error)
    }
}

impl RegistrationStore for SqliteRegistrationStore {
    fn load_users(&self) -> StoreResult<Vec<StoredUser>> {
        let mut stmt = self
            .conn
            .prepare("SELECT user_id, room_id FROM user ORDER BY created, user_id")
            .map_err(RusqliteErrorExt::into_database_error)?;

        let rows = stmt
            .query_map([], |row| {
                let room_id: Option<String> = row.get(1)?;
                Ok(StoredUser {
                    user_id: row.get(0)?,
                    room_id: room_id.filter(|r| !r.is_empty()),
                })
            })
            .map_err(RusqliteErrorExt::into_database_error)?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(RusqliteErrorExt::into_database_error)
    }

    fn add_user(&self, user_id: &str, room_id: &str) -> StoreResult<()> {
        self.conn
            .execute(
                "INSERT INTO user (user_id, room_id) VALUES (?1, ?2)",
                params![user_id, room_id],
            )
            .map_err(RusqliteErrorExt::into_database_error)?;
        Ok(())
    }

    fn update_user_room(&self, user_id: &str, room_id: &str) -> StoreResult<()> {
        if !self.user_exists(user_id)? {
            return self.add_user(user_id, room_id);
        }
        self.conn
            .execute(
                "UPDATE user SET room_id = ?1 WHERE user_id = ?2",
                params![room_id, user_id],
            )
            .map_err(RusqliteErrorExt::into_database_error)?;
        Ok(())
    }

    fn load_calendars(&self) -> StoreResult<Vec<StoredCalendar>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, user_id, name, cal_type, uri FROM calendar ORDER BY id")
            .map_err(RusqliteErrorExt::into_database_error)?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(RusqliteErrorExt::into_database_error)?;

        let mut calendars = Vec::new();
        for row in rows {
            let (id, user_id, name, cal_type, uri) =
                row.map_err(RusqliteErrorExt::into_database_error)?;
            match cal_type.parse::<CalendarKind>() {
                Ok(kind) => calendars.push(StoredCalendar {
                    id,
                    user_id,
                    name,
                    kind,
                    uri,
                }),
                Err(_) => {
                    tracing::warn!("Skipping calendar {} with unknown type {:?}", id, cal_type);
                }
            }
        }

        Ok(calendars)
    }

    fn add_calendar(
        &self,
        user_id: &str,
        name: &str,
        kind: CalendarKind,
        uri: &str,
    ) -> StoreResult<i64> {
        self.conn
            .execute(
                "INSERT INTO calendar (user_id, name, cal_type, uri) VALUES (?1, ?2, ?3, ?4)",
                params![user_id, name, kind.as_str(), uri],
            )
            .map_err(RusqliteErrorExt::into_database_error)?;
        Ok(self.conn.last_insert_rowid())
    }

    fn remove_calendar(&self, user_id: &str, name: &str) -> StoreResult<bool> {
        let removed = self
            .conn
            .execute(
                "DELETE FROM calendar WHERE user_id = ?1 AND lower(name) = lower(?2)",
                params![user_id, name],
            )
            .map_err(RusqliteErrorExt::into_database_error)?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_calendar_roundtrip() {
        let store = SqliteRegistrationStore::in_memory().unwrap();
        let first = store
            .add_calendar("@a:x", "Work", CalendarKind::CalDav, "https://dav.example/work/")
            .unwrap();
        let second = store
            .add_calendar("@b:x", "feed", CalendarKind::ICal, "https://example/feed.ics")
            .unwrap();
        assert!(second > first);

        let calendars = store.load_calendars().unwrap();
        assert_eq!(calendars.len(), 2);
        assert_eq!(calendars[0].name, "Work");
        assert_eq!(calendars[0].kind, CalendarKind::CalDav);
        assert_eq!(calendars[1].user_id, "@b:x");
    }

    #[test]
    fn test_names_are_unique_per_user() {
        let store = SqliteRegistrationStore::in_memory().unwrap();
        store
            .add_calendar("@a:x", "Work", CalendarKind::CalDav, "https://a/")
            .unwrap();
        assert!(store
            .add_calendar("@a:x", "WORK", CalendarKind::ICal, "https://b/")
            .is_err());
        store
            .add_calendar("@b:x", "work", CalendarKind::ICal, "https://b/")
            .unwrap();
        assert_eq!(store.load_calendars().unwrap().len(), 2);
    }

    #[test]
    fn test_remove_is_case_insensitive_and_per_user() {
        let store = SqliteRegistrationStore::in_memory().unwrap();
        store
            .add_calendar("@a:x", "Work", CalendarKind::CalDav, "https://a/")
            .unwrap();
        store
            .add_calendar("@b:x", "work", CalendarKind::CalDav, "https://b/")
            .unwrap();

        assert!(store.remove_calendar("@a:x", "WORK").unwrap());
        assert!(!store.remove_calendar("@a:x", "work").unwrap());

        let remaining = store.load_calendars().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].user_id, "@b:x");
    }

    #[test]
    fn test_unknown_type_rows_are_skipped() {
        let store = SqliteRegistrationStore::in_memory().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO calendar (user_id, name, cal_type, uri) VALUES ('@a:x', 'old', 'gcal', 'x')",
                [],
            )
            .unwrap();
        store
            .add_calendar("@a:x", "new", CalendarKind::ICal, "https://feed/")
            .unwrap();

        let calendars = store.load_calendars().unwrap();
        assert_eq!(calendars.len(), 1);
        assert_eq!(calendars[0].name, "new");
    }

    #[test]
    fn test_users_and_rooms() {
        let store = SqliteRegistrationStore::in_memory().unwrap();
        store.add_user("@a:x", "!one:x").unwrap();
        store.update_user_room("@a:x", "!two:x").unwrap();
        // updating an unknown user creates it
        store.update_user_room("@b:x", "!three:x").unwrap();

        let mut users = store.load_users().unwrap();
        users.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        assert_eq!(
            users,
            vec![
                StoredUser {
                    user_id: "@a:x".into(),
                    room_id: Some("!two:x".into()),
                },
                StoredUser {
                    user_id: "@b:x".into(),
                    room_id: Some("!three:x".into()),
                },
            ]
        );

        assert!(store.add_user("@a:x", "!dup:x").is_err());
    }

    #[test]
    fn test_persists_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("calbot.db");
        {
            let store = SqliteRegistrationStore::open(&path).unwrap();
            store
                .add_calendar("@a:x", "home", CalendarKind::ICal, "https://feed/")
                .unwrap();
            store.add_user("@a:x", "!room:x").unwrap();
        }

        let store = SqliteRegistrationStore::open(&path).unwrap();
        assert_eq!(store.load_calendars().unwrap().len(), 1);
        assert_eq!(store.load_users().unwrap().len(), 1);
    }
}
