//! Error types at the core's seams.

/// Failures of the task store as a whole.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not be reached or read.
    #[error("task store unavailable: {0}")]
    Unavailable(String),

    #[error("task store i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be decoded.
    #[error("task store data is corrupt: {0}")]
    Corrupt(String),
}

/// A single delivery attempt failed. Never fatal to a scan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
    #[error("invalid recipient address: {0}")]
    InvalidRecipient(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider rejected the message: {0}")]
    Rejected(String),

    #[error("send timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// A scan could not run at all. Per-task failures never surface here.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("eligibility query failed: {0}")]
    Query(#[from] StoreError),
}

/// CRUD rule violations raised by [`crate::book::TaskBook`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookError {
    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("user already exists: {0}")]
    DuplicateUser(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("task title must not be empty")]
    EmptyTitle,

    #[error("daily task limit of {limit} reached")]
    DailyLimitReached { limit: usize },

    #[error("unknown ordering field: {0}")]
    UnknownOrdering(String),
}
