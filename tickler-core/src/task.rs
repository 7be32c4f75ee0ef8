//! Task model for the personal task tracker.
//!
//! Tasks are owned by a single user and live in a store. The deadline scanner
//! only ever touches the reminder state; everything else belongs to the CRUD
//! layer (see `crate::book`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low = 1,
    #[default]
    Medium = 2,
    High = 3,
}

impl Priority {
    /// Accepts either the numeric level (`1..=3`) or the name, case-insensitive.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Ok(level) = raw.parse::<u8>() {
            return match level {
                1 => Some(Self::Low),
                2 => Some(Self::Medium),
                3 => Some(Self::High),
                _ => None,
            };
        }
        match raw.to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Visibility state. Independent of `is_completed` and of reminder eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Active,
    /// In the archive.
    Completed,
    /// In the trash.
    Deleted,
}

impl TaskStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// Two-state reminder machine. The only transition the scanner may take is
/// `NotReminded -> Reminded`; the way back is reserved for restore/reschedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderState {
    #[default]
    NotReminded,
    Reminded,
}

impl ReminderState {
    /// Take the single allowed transition. Returns `false` when already reminded.
    pub fn advance(&mut self) -> bool {
        match self {
            Self::NotReminded => {
                *self = Self::Reminded;
                true
            }
            Self::Reminded => false,
        }
    }

    pub fn is_sent(self) -> bool {
        self == Self::Reminded
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    /// Id of the owning user.
    pub owner: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,

    pub priority: Priority,
    pub status: TaskStatus,
    pub is_completed: bool,

    /// Optional hard deadline (UTC).
    pub deadline: Option<DateTime<Utc>>,

    #[serde(default)]
    reminder: ReminderState,

    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        owner: impl Into<String>,
        title: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            owner: owner.into(),
            title: title.into(),
            description: None,
            priority: Priority::default(),
            status: TaskStatus::Active,
            is_completed: false,
            deadline: None,
            reminder: ReminderState::NotReminded,
            created_at,
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

    pub fn with_completed(mut self, is_completed: bool) -> Self {
        self.is_completed = is_completed;
        self
    }

    /// Seed the reminder state, e.g. for a task loaded from elsewhere.
    pub fn with_reminder(mut self, reminder: ReminderState) -> Self {
        self.reminder = reminder;
        self
    }

    pub fn reminder(&self) -> ReminderState {
        self.reminder
    }

    pub fn reminder_sent(&self) -> bool {
        self.reminder.is_sent()
    }

    pub(crate) fn mark_reminded(&mut self) -> bool {
        self.reminder.advance()
    }

    pub(crate) fn reset_reminder(&mut self) {
        self.reminder = ReminderState::NotReminded;
    }

    /// Not completed, has a deadline and has not been reminded yet.
    ///
    /// This is the fallback predicate; the primary one additionally bounds the
    /// deadline to the lead window (see [`Task::is_due_within`]).
    pub fn is_unreminded_candidate(&self) -> bool {
        !self.is_completed && self.deadline.is_some() && !self.reminder_sent()
    }

    /// Candidate whose deadline falls in `[now, window_end]` (both inclusive).
    pub fn is_due_within(&self, now: DateTime<Utc>, window_end: DateTime<Utc>) -> bool {
        self.is_unreminded_candidate()
            && self
                .deadline
                .is_some_and(|deadline| deadline >= now && deadline <= window_end)
    }
}
