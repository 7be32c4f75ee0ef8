//! tickler-notify: delivery channels for deadline reminders.

pub mod address;
pub mod maildir;
pub mod smtp;
pub mod webhook;

pub use address::is_valid_email;
pub use maildir::MailDropNotifier;
pub use smtp::{SmtpNotifier, SmtpSettings};
pub use webhook::WebhookNotifier;

/// A channel is missing or has unusable settings. Reported once at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("notification channel `{channel}` requires `{setting}`")]
    Missing {
        channel: &'static str,
        setting: &'static str,
    },

    #[error("invalid `{setting}` for channel `{channel}`: {reason}")]
    Invalid {
        channel: &'static str,
        setting: &'static str,
        reason: String,
    },

    #[error("unknown notification channel: {0}")]
    UnknownChannel(String),
}
