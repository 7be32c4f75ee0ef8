use anyhow::Result;
use std::sync::Arc;

use tickler_core::Notifier;
use tickler_notify::{ConfigError, MailDropNotifier, SmtpNotifier, SmtpSettings, WebhookNotifier};

use crate::config::NotifySection;
use crate::state::default_maildir;

/// Build the configured channel. Any error here is a configuration error:
/// the scanner must not start.
pub fn build_notifier(cfg: &NotifySection) -> Result<Arc<dyn Notifier>> {
    let notifier: Arc<dyn Notifier> = match cfg.channel.trim() {
        "maildir" => {
            let dir = match &cfg.maildir_path {
                Some(p) => p.clone(),
                None => default_maildir()?,
            };
            Arc::new(MailDropNotifier::new(dir, cfg.from.clone())?)
        }
        "smtp" => {
            let host = cfg.smtp_host.clone().ok_or(ConfigError::Missing {
                channel: "smtp",
                setting: "smtp_host",
            })?;
            Arc::new(SmtpNotifier::new(SmtpSettings {
                host,
                port: cfg.smtp_port,
                from: cfg.from.clone(),
                username: cfg.smtp_username.clone(),
                password: cfg.smtp_password.clone(),
            })?)
        }
        "webhook" => {
            let url = cfg.webhook_url.as_deref().ok_or(ConfigError::Missing {
                channel: "webhook",
                setting: "webhook_url",
            })?;
            Arc::new(WebhookNotifier::new(url)?)
        }
        other => return Err(ConfigError::UnknownChannel(other.to_string()).into()),
    };
    Ok(notifier)
}
