//! Task store contract consumed by the scanner, plus an in-memory store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::book::TaskBook;
use crate::error::StoreError;
use crate::task::Task;
use crate::user::OwnerContact;

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Not completed, not reminded, deadline within `[now, window_end]`.
    async fn find_eligible_for_reminder(
        &self,
        now: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<Task>, StoreError>;

    /// Not completed, not reminded, has a deadline. At most `limit` tasks.
    async fn find_any_unreminded(&self, limit: usize) -> Result<Vec<Task>, StoreError>;

    /// Set the reminder flag only if it is currently unset.
    ///
    /// `Ok(false)` when the task was already reminded or no longer exists.
    async fn compare_and_set_reminder_sent(&self, task_id: &str) -> Result<bool, StoreError>;

    /// Contact projection of a task owner.
    async fn owner_contact(&self, owner_id: &str) -> Result<Option<OwnerContact>, StoreError>;
}

/// Store backed by a [`TaskBook`] behind a mutex. Every operation is atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    book: Mutex<TaskBook>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_book(book: TaskBook) -> Self {
        Self {
            book: Mutex::new(book),
        }
    }

    /// Run a closure against the book, e.g. for CRUD operations.
    pub fn with<R>(&self, f: impl FnOnce(&mut TaskBook) -> R) -> R {
        f(&mut self.book.lock())
    }

    pub fn get(&self, id: &str) -> Option<Task> {
        self.book.lock().get(id).cloned()
    }

    pub fn snapshot(&self) -> TaskBook {
        self.book.lock().clone()
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn find_eligible_for_reminder(
        &self,
        now: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<Task>, StoreError> {
        Ok(self.book.lock().due_within(now, window_end))
    }

    async fn find_any_unreminded(&self, limit: usize) -> Result<Vec<Task>, StoreError> {
        Ok(self.book.lock().any_unreminded(limit))
    }

    async fn compare_and_set_reminder_sent(&self, task_id: &str) -> Result<bool, StoreError> {
        Ok(self.book.lock().mark_reminded(task_id))
    }

    async fn owner_contact(&self, owner_id: &str) -> Result<Option<OwnerContact>, StoreError> {
        Ok(self.book.lock().owner_contact(owner_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::NewTask;
    use crate::user::User;
    use chrono::{Duration, TimeZone};

    #[tokio::test]
    async fn compare_and_set_succeeds_once() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        let store = MemoryStore::new();
        let id = store.with(|book| {
            book.add_user(User::new("u1", "anna", "anna@example.com")).unwrap();
            book.create_task("u1", NewTask::new("a").with_deadline(now + Duration::minutes(5)), now)
                .unwrap()
                .id
                .clone()
        });

        assert_eq!(store.find_eligible_for_reminder(now, now + Duration::hours(1)).await.unwrap().len(), 1);
        assert!(store.compare_and_set_reminder_sent(&id).await.unwrap());
        assert!(!store.compare_and_set_reminder_sent(&id).await.unwrap());
        assert!(store.find_eligible_for_reminder(now, now + Duration::hours(1)).await.unwrap().is_empty());
        assert!(store.find_any_unreminded(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn owner_contact_is_projected_from_user() {
        let store = MemoryStore::new();
        store.with(|book| {
            book.add_user(User::new("u1", "anna", "anna@example.com").with_first_name("Anna"))
        })
        .unwrap();

        let contact = store.owner_contact("u1").await.unwrap().unwrap();
        assert_eq!(contact.display_name, "Anna");
        assert!(store.owner_contact("nobody").await.unwrap().is_none());
    }
}
