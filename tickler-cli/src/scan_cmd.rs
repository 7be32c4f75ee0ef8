use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use tickler_core::{DeadlineScanner, Notifier, ScanReport, run_periodic};

use crate::config::{Config, load_config};
use crate::file_store::FileStore;
use crate::notify::build_notifier;
use crate::state::tasks_path;

type Scanner = DeadlineScanner<FileStore, dyn Notifier>;

/// Configuration problems surface here, before any scan runs.
fn build_scanner(cfg: &Config) -> Result<Scanner> {
    let notifier = build_notifier(&cfg.notify).context("notification channel is not configured")?;
    let store = Arc::new(FileStore::open(tasks_path()?));
    Ok(DeadlineScanner::new(store, notifier, cfg.scan.policy()))
}

/// On-demand trigger: one scan, then exit.
pub async fn scan(now: Option<String>, json: bool) -> Result<()> {
    let cfg = load_config()?;
    let scanner = build_scanner(&cfg)?;

    let now = match now {
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .with_context(|| format!("invalid --now '{raw}' (expected RFC3339)"))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    let report = scanner.run_scan(now).await.context("deadline scan failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &ScanReport) {
    println!("Sent notifications: {}", report.sent);
    println!(
        "processed={} failed={} unrecorded={} skipped={}{}",
        report.processed,
        report.failed,
        report.unrecorded,
        report.skipped,
        if report.fallback_used { " (fallback selection)" } else { "" }
    );
}

/// Timer-driven scans until Ctrl-C. On Unix, SIGUSR1 requests an extra scan.
pub async fn serve() -> Result<()> {
    let cfg = load_config()?;
    let scanner = build_scanner(&cfg)?;
    let (tx, rx) = mpsc::channel::<()>(8);

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut usr1 = signal(SignalKind::user_defined1()).context("install SIGUSR1 handler")?;
        tokio::spawn(async move {
            while usr1.recv().await.is_some() {
                info!("SIGUSR1 received; triggering deadline scan");
                if tx.send(()).await.is_err() {
                    break;
                }
            }
        });
    }
    #[cfg(not(unix))]
    drop(tx);

    info!(
        store = %tasks_path()?.display(),
        channel = %cfg.notify.channel,
        "serving deadline reminders"
    );

    run_periodic(scanner, cfg.scan.interval(), rx, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await;

    Ok(())
}
