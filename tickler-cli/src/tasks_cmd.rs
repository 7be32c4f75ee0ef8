use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use clap::Subcommand;

use tickler_core::{NewTask, Ordering, Priority, Task, TaskQuery, TaskStatus, User, parse_deadline};

use crate::file_store::FileStore;
use crate::state::tasks_path;

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// Register a task owner
    Add {
        #[arg(long)]
        id: String,

        #[arg(long)]
        username: String,

        /// Reminder address
        #[arg(long)]
        email: String,

        /// Used in greetings instead of the username
        #[arg(long)]
        first_name: Option<String>,

        /// VIP users may create 30 tasks a day instead of 10
        #[arg(long, default_value_t = false)]
        vip: bool,
    },

    /// List registered users
    List,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Create a task
    Add {
        #[arg(long)]
        owner: String,

        #[arg(long)]
        title: String,

        #[arg(long)]
        description: Option<String>,

        /// low|medium|high or 1..3
        #[arg(long, default_value = "medium")]
        priority: String,

        /// RFC3339, or "YYYY-MM-DD HH:MM" in --tz
        #[arg(long)]
        deadline: Option<String>,

        #[arg(long, default_value = "UTC")]
        tz: String,
    },

    /// List a user's tasks
    List {
        #[arg(long)]
        owner: String,

        #[arg(long)]
        priority: Option<String>,

        /// active|completed|deleted|all
        #[arg(long, default_value = "active")]
        status: String,

        /// priority|deadline|created_at|title, prefix with - for descending
        #[arg(long)]
        ordering: Option<String>,
    },

    /// Mark a task done and move it to the archive
    Complete {
        #[arg(long)]
        owner: String,
        id: String,
    },

    /// Move a task to the trash
    Delete {
        #[arg(long)]
        owner: String,
        id: String,
    },

    /// Bring a task back from the archive or trash (re-arms its reminder)
    Restore {
        #[arg(long)]
        owner: String,
        id: String,
    },

    /// Change or clear a deadline (a new deadline re-arms the reminder)
    Reschedule {
        #[arg(long)]
        owner: String,
        id: String,

        /// Omit to clear the deadline
        #[arg(long)]
        deadline: Option<String>,

        #[arg(long, default_value = "UTC")]
        tz: String,
    },
}

fn store() -> Result<FileStore> {
    Ok(FileStore::open(tasks_path()?))
}

pub fn run_user(cmd: UserCommand) -> Result<()> {
    let store = store()?;
    match cmd {
        UserCommand::Add {
            id,
            username,
            email,
            first_name,
            vip,
        } => {
            let mut user = User::new(id, username, email).with_vip(vip);
            user.first_name = first_name;
            let label = format!("{} <{}>", user.display_name(), user.email);
            store.mutate(|book| book.add_user(user))?;
            println!("Added user {label}");
        }
        UserCommand::List => {
            let book = store.load()?;
            if book.users().is_empty() {
                println!("No users in {}", store.path().display());
            }
            for u in book.users() {
                println!(
                    "{} | {} | {} | limit {}/day",
                    u.id,
                    u.display_name(),
                    u.email,
                    u.daily_limit()
                );
            }
        }
    }
    Ok(())
}

pub fn run_task(cmd: TaskCommand) -> Result<()> {
    let store = store()?;
    let now = Utc::now();

    match cmd {
        TaskCommand::Add {
            owner,
            title,
            description,
            priority,
            deadline,
            tz,
        } => {
            let mut input = NewTask::new(title).with_priority(parse_priority(&priority)?);
            input.description = description;
            input.deadline = deadline.as_deref().map(|d| parse_deadline(d, &tz)).transpose()?;

            let task = store.mutate(|book| book.create_task(&owner, input, now).cloned())?;
            println!("Created {}", describe(&task, now));
        }
        TaskCommand::List {
            owner,
            priority,
            status,
            ordering,
        } => {
            let query = TaskQuery {
                priority: priority.as_deref().map(parse_priority).transpose()?,
                status: match status.as_str() {
                    "all" => None,
                    s => Some(TaskStatus::parse(s).ok_or_else(|| anyhow!("unknown status: {s}"))?),
                },
                ordering: ordering.as_deref().map(Ordering::parse).transpose()?,
            };
            let tasks = store.load()?.list(&owner, &query);
            if tasks.is_empty() {
                println!("No tasks.");
            }
            for t in &tasks {
                println!("{}", describe(t, now));
            }
        }
        TaskCommand::Complete { owner, id } => {
            let task = store.mutate(|book| book.complete(&owner, &id).cloned())?;
            println!("Completed {}", describe(&task, now));
        }
        TaskCommand::Delete { owner, id } => {
            let task = store.mutate(|book| book.delete(&owner, &id).cloned())?;
            println!("Moved to trash: {}", describe(&task, now));
        }
        TaskCommand::Restore { owner, id } => {
            let task = store.mutate(|book| book.restore(&owner, &id).cloned())?;
            println!("Restored {}", describe(&task, now));
        }
        TaskCommand::Reschedule {
            owner,
            id,
            deadline,
            tz,
        } => {
            let deadline = deadline.as_deref().map(|d| parse_deadline(d, &tz)).transpose()?;
            let task = store.mutate(|book| book.reschedule(&owner, &id, deadline).cloned())?;
            println!("Rescheduled {}", describe(&task, now));
        }
    }
    Ok(())
}

fn parse_priority(raw: &str) -> Result<Priority> {
    Priority::parse(raw)
        .ok_or_else(|| anyhow!("unknown priority: {raw}"))
        .context("expected low|medium|high or 1..3")
}

fn describe(t: &Task, now: DateTime<Utc>) -> String {
    let deadline = match t.deadline {
        Some(d) if d >= now => format!("due {} ({} left)", d.to_rfc3339(), tickler_core::TimeLeft::until(d, now)),
        Some(d) => format!("overdue since {}", d.to_rfc3339()),
        None => "no deadline".to_string(),
    };
    format!(
        "{} [{:?}/{:?}{}] {} | {}{}",
        t.id,
        t.status,
        t.priority,
        if t.is_completed { ", done" } else { "" },
        t.title,
        deadline,
        if t.reminder_sent() { " | reminded" } else { "" }
    )
}
