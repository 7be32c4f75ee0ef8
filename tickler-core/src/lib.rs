//! tickler-core: task model and the deadline reminder scanner.

pub mod book;
pub mod error;
pub mod notifier;
pub mod reminders;
pub mod scanner;
pub mod schedule;
pub mod store;
pub mod task;
pub mod time;
pub mod user;

pub use book::{NewTask, OrderField, Ordering, TaskBook, TaskQuery};
pub use error::{BookError, NotifyError, ScanError, StoreError};
pub use notifier::Notifier;
pub use reminders::{Notification, render_reminder};
pub use scanner::{DeadlineScanner, MAX_FALLBACK, ScanPolicy, ScanReport};
pub use schedule::run_periodic;
pub use store::{MemoryStore, TaskStore};
pub use task::{Priority, ReminderState, Task, TaskStatus};
pub use time::{TimeLeft, parse_deadline, parse_local_deadline_to_utc};
pub use user::{OwnerContact, User};
