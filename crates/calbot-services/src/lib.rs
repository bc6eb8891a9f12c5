//! Registration storage, reminder scheduling and the user registry.

pub mod notifier;
pub mod registry;
pub mod scheduler;
pub mod store;

pub use notifier::{reminder_text, Notifier};
pub use registry::{
    HttpSourceFactory, ReminderSettings, RegistryError, RoomCheck, SourceFactory, User,
    UserCalendar, UserRegistry,
};
pub use scheduler::{ArmOutcome, Reminder, ReminderScheduler, SendFn, SendFuture};
pub use store::{RegistrationStore, SqliteRegistrationStore, StoredCalendar, StoredUser};
