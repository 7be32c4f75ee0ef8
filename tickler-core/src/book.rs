//! TaskBook: the ordered record of users and tasks behind every store.
//!
//! Purpose:
//! - Hold the CRUD rules (daily quota, soft delete, restore, owner scoping) in
//!   one place so the in-memory store and the file store behave identically.
//! - Answer the two reminder queries and the conditional reminder update.
//!
//! Design:
//! - Tasks are kept in creation order; that order is the store's "natural
//!   order" the scanner sees.
//! - Ids are sequential (`task-0001`, ...). Lookups are linear, which is fine
//!   for a personal tracker.
//!
//! Listing rules:
//! - priority filter accepts `1..=3` or `low|medium|high`
//! - status filter defaults to `active`
//! - ordering by `priority|deadline|created_at|title`, `-` prefix for DESC

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BookError;
use crate::task::{Priority, Task, TaskStatus};
use crate::user::{OwnerContact, User};

/// Input for [`TaskBook::create_task`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub deadline: Option<DateTime<Utc>>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderField {
    Priority,
    Deadline,
    CreatedAt,
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ordering {
    pub field: OrderField,
    pub descending: bool,
}

impl Ordering {
    /// Parse `priority`, `-deadline`, ...
    pub fn parse(raw: &str) -> Result<Self, BookError> {
        let raw = raw.trim();
        let (descending, name) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let field = match name {
            "priority" => OrderField::Priority,
            "deadline" => OrderField::Deadline,
            "created_at" => OrderField::CreatedAt,
            "title" => OrderField::Title,
            _ => return Err(BookError::UnknownOrdering(raw.to_string())),
        };
        Ok(Self { field, descending })
    }

    fn compare(&self, a: &Task, b: &Task) -> std::cmp::Ordering {
        let ord = match self.field {
            OrderField::Priority => a.priority.cmp(&b.priority),
            OrderField::Deadline => a.deadline.cmp(&b.deadline),
            OrderField::CreatedAt => a.created_at.cmp(&b.created_at),
            OrderField::Title => a.title.cmp(&b.title),
        };
        if self.descending { ord.reverse() } else { ord }
    }
}

/// Filters for [`TaskBook::list`]. The default shows active tasks in creation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskQuery {
    pub priority: Option<Priority>,
    /// `None` lists every status.
    pub status: Option<TaskStatus>,
    pub ordering: Option<Ordering>,
}

impl Default for TaskQuery {
    fn default() -> Self {
        Self {
            priority: None,
            status: Some(TaskStatus::Active),
            ordering: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskBook {
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    tasks: Vec<Task>,
    #[serde(default)]
    next_seq: u64,
}

impl TaskBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn user(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn add_user(&mut self, user: User) -> Result<(), BookError> {
        if self.user(&user.id).is_some() {
            return Err(BookError::DuplicateUser(user.id));
        }
        self.users.push(user);
        Ok(())
    }

    /// Insert a fully-formed task as is, replacing one with the same id.
    pub fn upsert(&mut self, task: Task) {
        match self.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(slot) => *slot = task,
            None => self.tasks.push(task),
        }
    }

    pub fn create_task(
        &mut self,
        owner: &str,
        input: NewTask,
        now: DateTime<Utc>,
    ) -> Result<&Task, BookError> {
        let title = input.title.trim();
        if title.is_empty() {
            return Err(BookError::EmptyTitle);
        }
        let user = self
            .user(owner)
            .ok_or_else(|| BookError::UserNotFound(owner.to_string()))?;

        let limit = user.daily_limit();
        let today = now.date_naive();
        let created_today = self
            .tasks
            .iter()
            .filter(|t| t.owner == owner && t.created_at.date_naive() == today)
            .count();
        if created_today >= limit {
            return Err(BookError::DailyLimitReached { limit });
        }

        self.next_seq += 1;
        let mut task = Task::new(format!("task-{:04}", self.next_seq), owner, title, now)
            .with_priority(input.priority);
        task.description = input.description.filter(|d| !d.trim().is_empty());
        task.deadline = input.deadline;

        self.tasks.push(task);
        let idx = self.tasks.len() - 1;
        Ok(&self.tasks[idx])
    }

    pub fn complete(&mut self, owner: &str, id: &str) -> Result<&Task, BookError> {
        let task = self.owned_mut(owner, id)?;
        task.is_completed = true;
        task.status = TaskStatus::Completed;
        Ok(task)
    }

    /// Soft delete: the task moves to the trash.
    pub fn delete(&mut self, owner: &str, id: &str) -> Result<&Task, BookError> {
        let task = self.owned_mut(owner, id)?;
        task.status = TaskStatus::Deleted;
        Ok(task)
    }

    /// Bring a task back from the archive or trash. Re-arms its reminder.
    pub fn restore(&mut self, owner: &str, id: &str) -> Result<&Task, BookError> {
        let task = self.owned_mut(owner, id)?;
        task.status = TaskStatus::Active;
        task.is_completed = false;
        task.reset_reminder();
        Ok(task)
    }

    /// Move the deadline. A new deadline earns a new reminder.
    pub fn reschedule(
        &mut self,
        owner: &str,
        id: &str,
        deadline: Option<DateTime<Utc>>,
    ) -> Result<&Task, BookError> {
        let task = self.owned_mut(owner, id)?;
        if task.deadline != deadline {
            task.deadline = deadline;
            task.reset_reminder();
        }
        Ok(task)
    }

    pub fn list(&self, owner: &str, query: &TaskQuery) -> Vec<Task> {
        let mut out: Vec<Task> = self
            .tasks
            .iter()
            .filter(|t| t.owner == owner)
            .filter(|t| query.priority.is_none_or(|p| t.priority == p))
            .filter(|t| query.status.is_none_or(|s| t.status == s))
            .cloned()
            .collect();

        if let Some(ordering) = query.ordering {
            // stable: ties keep creation order
            out.sort_by(|a, b| ordering.compare(a, b));
        }
        out
    }

    /// Primary reminder predicate, in natural order.
    pub fn due_within(&self, now: DateTime<Utc>, window_end: DateTime<Utc>) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|t| t.is_due_within(now, window_end))
            .cloned()
            .collect()
    }

    /// Fallback reminder predicate, in natural order, at most `limit` tasks.
    pub fn any_unreminded(&self, limit: usize) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|t| t.is_unreminded_candidate())
            .take(limit)
            .cloned()
            .collect()
    }

    /// Conditional update: flips the reminder only if it was not yet sent.
    /// `false` when already reminded or when the task does not exist.
    pub fn mark_reminded(&mut self, id: &str) -> bool {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id)
            .is_some_and(Task::mark_reminded)
    }

    pub fn owner_contact(&self, owner: &str) -> Option<OwnerContact> {
        self.user(owner).map(User::contact)
    }

    fn owned_mut(&mut self, owner: &str, id: &str) -> Result<&mut Task, BookError> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id && t.owner == owner)
            .ok_or_else(|| BookError::TaskNotFound(id.to_string()))
    }
}
