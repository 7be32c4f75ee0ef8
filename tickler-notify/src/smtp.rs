//! SMTP channel (STARTTLS relay via lettre).

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tickler_core::{Notification, Notifier, NotifyError};
use tracing::debug;

use crate::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub from: String,
    /// Defaults to `from` when only a password is given.
    pub username: Option<String>,
    pub password: Option<String>,
}

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(settings: SmtpSettings) -> Result<Self, ConfigError> {
        let host = settings.host.trim();
        if host.is_empty() {
            return Err(ConfigError::Missing {
                channel: "smtp",
                setting: "smtp_host",
            });
        }

        let from: Mailbox = settings.from.parse().map_err(|e| ConfigError::Invalid {
            channel: "smtp",
            setting: "from",
            reason: format!("{e}"),
        })?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| ConfigError::Invalid {
                channel: "smtp",
                setting: "smtp_host",
                reason: e.to_string(),
            })?
            .port(settings.port);

        if let Some(password) = settings.password {
            let username = settings.username.unwrap_or_else(|| settings.from.clone());
            builder = builder.credentials(Credentials::new(username, password));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    fn channel(&self) -> &'static str {
        "smtp"
    }

    async fn send(&self, message: &Notification) -> Result<(), NotifyError> {
        let to: Mailbox = message
            .recipient
            .parse()
            .map_err(|_| NotifyError::InvalidRecipient(message.recipient.clone()))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .map_err(|e| NotifyError::Transport(format!("build message: {e}")))?;

        self.transport.send(email).await.map_err(|e| {
            if e.is_permanent() {
                NotifyError::Rejected(e.to_string())
            } else {
                NotifyError::Transport(e.to_string())
            }
        })?;

        debug!(to = %message.recipient, "reminder sent over smtp");
        Ok(())
    }
}
