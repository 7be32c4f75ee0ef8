//! Reminder rendering: turns a due task into an outbound notification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::Task;
use crate::time::TimeLeft;
use crate::user::OwnerContact;

const NO_DEADLINE: &str = "no deadline information";
const NO_DESCRIPTION: &str = "no description";

/// A message ready for a [`crate::notifier::Notifier`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// "H hours M minutes" until the deadline, or a sentinel for undated tasks.
pub fn time_left_label(task: &Task, now: DateTime<Utc>) -> String {
    match task.deadline {
        Some(deadline) => TimeLeft::until(deadline, now).to_string(),
        None => NO_DEADLINE.to_string(),
    }
}

pub fn reminder_subject(task: &Task) -> String {
    format!("⏰ Deadline reminder: {}", task.title)
}

pub fn reminder_body(task: &Task, owner: &OwnerContact, now: DateTime<Utc>) -> String {
    let description = task
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or(NO_DESCRIPTION);

    format!(
        "Hello {name}!\n\
         \n\
         Reminder about your task: {title}\n\
         \n\
         Time left: {left}\n\
         \n\
         Description: {description}\n\
         \n\
         Please finish the task on time!\n\
         \n\
         Best regards,\n\
         Tickler\n",
        name = owner.display_name,
        title = task.title,
        left = time_left_label(task, now),
    )
}

pub fn render_reminder(task: &Task, owner: &OwnerContact, now: DateTime<Utc>) -> Notification {
    Notification {
        recipient: owner.address.clone(),
        subject: reminder_subject(task),
        body: reminder_body(task, owner, now),
    }
}
