use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// `$TICKLER_HOME`, else `~/.tickler`.
pub fn tickler_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("TICKLER_HOME") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = std::env::var("HOME").context("HOME is not set (or set TICKLER_HOME)")?;
    Ok(PathBuf::from(home).join(".tickler"))
}

pub fn ensure_tickler_home() -> Result<PathBuf> {
    let dir = tickler_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn tasks_path() -> Result<PathBuf> {
    Ok(ensure_tickler_home()?.join("tasks.json"))
}

pub fn default_maildir() -> Result<PathBuf> {
    Ok(tickler_home()?.join("sent_emails"))
}
