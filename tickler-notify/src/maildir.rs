//! Mail-drop channel: every message becomes a text file in a directory.
//!
//! Useful in development and as a zero-setup default; nothing leaves the
//! machine. File names sort by time: `20260302-120000-4242-0001.log`, where
//! the middle part is the writer's pid. Files are created exclusively, so two
//! writers never overwrite each other's messages.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tickler_core::{Notification, Notifier, NotifyError};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::ConfigError;
use crate::address::is_valid_email;

/// Name collisions tolerated before giving up on a send.
const CREATE_ATTEMPTS: usize = 64;

const SEPARATOR: &str =
    "-------------------------------------------------------------------------------";

#[derive(Debug)]
pub struct MailDropNotifier {
    dir: PathBuf,
    from: String,
    seq: AtomicU64,
}

impl MailDropNotifier {
    pub fn new(dir: impl Into<PathBuf>, from: impl Into<String>) -> Result<Self, ConfigError> {
        let from = from.into();
        if !is_valid_email(&from) {
            return Err(ConfigError::Invalid {
                channel: "maildir",
                setting: "from",
                reason: format!("not an email address: {from}"),
            });
        }
        Ok(Self {
            dir: dir.into(),
            from,
            seq: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn render(&self, message: &Notification) -> String {
        format!(
            "From: {from}\nTo: {to}\nSubject: {subject}\nDate: {date}\n\n{body}\n{SEPARATOR}\n",
            from = self.from,
            to = message.recipient,
            subject = message.subject,
            date = Utc::now().to_rfc2822(),
            body = message.body,
        )
    }

    /// Create a fresh file, skipping names another writer already took.
    async fn create_unique(&self) -> Result<(PathBuf, File), NotifyError> {
        let pid = std::process::id();
        for _ in 0..CREATE_ATTEMPTS {
            let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
            let name = format!("{}-{pid}-{seq:04}.log", Utc::now().format("%Y%m%d-%H%M%S"));
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(NotifyError::Transport(format!("create {}: {e}", path.display())));
                }
            }
        }
        Err(NotifyError::Transport(format!(
            "no free file name in {} after {CREATE_ATTEMPTS} attempts",
            self.dir.display()
        )))
    }
}

#[async_trait]
impl Notifier for MailDropNotifier {
    fn channel(&self) -> &'static str {
        "maildir"
    }

    async fn send(&self, message: &Notification) -> Result<(), NotifyError> {
        if !is_valid_email(&message.recipient) {
            return Err(NotifyError::InvalidRecipient(message.recipient.clone()));
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| NotifyError::Transport(format!("create {}: {e}", self.dir.display())))?;

        let (path, mut file) = self.create_unique().await?;
        let write = async {
            file.write_all(self.render(message).as_bytes()).await?;
            file.flush().await
        };
        write
            .await
            .map_err(|e| NotifyError::Transport(format!("write {}: {e}", path.display())))?;

        debug!(path = %path.display(), to = %message.recipient, "reminder written to mail drop");
        Ok(())
    }
}
