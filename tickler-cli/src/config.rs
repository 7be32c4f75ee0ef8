use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use tickler_core::{MAX_FALLBACK, ScanPolicy};

use crate::state::ensure_tickler_home;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scan: ScanSection,
    pub notify: NotifySection,
    pub log: LogSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSection {
    /// Seconds between timer-driven scans.
    pub interval_secs: u64,
    /// A deadline this many minutes ahead counts as imminent.
    pub lead_minutes: i64,
    /// When nothing is due, remind about any unreminded task with a deadline.
    pub fallback_enabled: bool,
    pub fallback_limit: usize,
    pub send_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifySection {
    /// "maildir", "smtp" or "webhook".
    pub channel: String,
    pub from: String,

    /// For channel = "maildir" (default: ~/.tickler/sent_emails)
    pub maildir_path: Option<PathBuf>,

    /// For channel = "smtp"
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,

    /// For channel = "webhook"
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// tracing filter, overridden by TICKLER_LOG
    pub level: String,
}

impl Default for ScanSection {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            lead_minutes: 60,
            fallback_enabled: true,
            fallback_limit: 5,
            send_timeout_secs: 30,
        }
    }
}

impl Default for NotifySection {
    fn default() -> Self {
        Self {
            channel: "maildir".to_string(),
            from: "noreply@todoapp.com".to_string(),
            maildir_path: None,
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            webhook_url: None,
        }
    }
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ScanSection {
    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            bail!("[scan].interval_secs must be at least 1");
        }
        if self.lead_minutes <= 0 {
            bail!("[scan].lead_minutes must be positive");
        }
        if self.send_timeout_secs == 0 {
            bail!("[scan].send_timeout_secs must be at least 1");
        }
        if self.fallback_enabled && !(1..=MAX_FALLBACK).contains(&self.fallback_limit) {
            bail!("[scan].fallback_limit must be between 1 and {MAX_FALLBACK}");
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn policy(&self) -> ScanPolicy {
        ScanPolicy {
            lead_time: chrono::Duration::minutes(self.lead_minutes),
            fallback_limit: self.fallback_enabled.then_some(self.fallback_limit),
            send_timeout: Duration::from_secs(self.send_timeout_secs),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_tickler_home()?.join("config.toml"))
}

pub fn parse_config(s: &str) -> Result<Config> {
    let cfg: Config = toml::from_str(s).context("parse config.toml")?;
    cfg.scan.validate()?;
    Ok(cfg)
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    parse_config(&s)
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}

pub fn config_check() -> Result<()> {
    let cfg = load_config()?;
    let notify = &cfg.notify;

    println!("Scan config:\n");
    println!("- interval_secs: {}", cfg.scan.interval_secs);
    println!("- lead_minutes: {}", cfg.scan.lead_minutes);
    println!("- fallback_enabled: {}", cfg.scan.fallback_enabled);
    println!("- fallback_limit: {}", cfg.scan.fallback_limit);
    println!("- send_timeout_secs: {}", cfg.scan.send_timeout_secs);

    println!("\nNotify config:\n");
    println!("- channel: {}", notify.channel);
    println!("- from: {}", notify.from);

    match crate::notify::build_notifier(notify) {
        Ok(notifier) => println!("\nChannel `{}` is ready.", notifier.channel()),
        Err(e) => {
            println!("\nChannel is not usable: {e}");
            println!("\nWhat to configure next:");
            println!("Set {}:", config_path()?.display());
            println!("[notify]");
            println!("channel = \"smtp\"");
            println!("from = \"noreply@todoapp.com\"");
            println!("smtp_host = \"smtp.example.com\"");
            println!("smtp_port = 587");
            println!("smtp_password = \"...\"");
        }
    }

    Ok(())
}
