//! Periodic trigger for the deadline scanner.
//!
//! The timer fires every `every`; a tick that lands while the previous timer
//! scan is still running is skipped rather than queued. On-demand requests
//! arriving on `on_demand` start an extra scan right away, even if one is in
//! flight; the scanner's ledger keeps the two from double-sending.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::notifier::Notifier;
use crate::scanner::DeadlineScanner;
use crate::store::TaskStore;

/// What started a scan; logged with its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Timer,
    OnDemand,
}

pub async fn run_periodic<S, N, F>(
    scanner: DeadlineScanner<S, N>,
    every: Duration,
    mut on_demand: mpsc::Receiver<()>,
    shutdown: F,
) where
    S: TaskStore + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut timer_scan: Option<JoinHandle<()>> = None;
    let mut manual_scans = JoinSet::new();
    let mut on_demand_open = true;

    tokio::pin!(shutdown);
    info!(every_secs = every.as_secs(), "deadline scheduler started");

    loop {
        tokio::select! {
            () = &mut shutdown => break,
            _ = ticker.tick() => {
                if timer_scan.as_ref().is_some_and(|h| !h.is_finished()) {
                    debug!("previous timer scan still running; skipping tick");
                    continue;
                }
                timer_scan = Some(tokio::spawn(scan_once(scanner.clone(), Trigger::Timer)));
            }
            request = on_demand.recv(), if on_demand_open => match request {
                Some(()) => {
                    manual_scans.spawn(scan_once(scanner.clone(), Trigger::OnDemand));
                }
                None => on_demand_open = false,
            },
            Some(_) = manual_scans.join_next(), if !manual_scans.is_empty() => {}
        }
    }

    info!("deadline scheduler stopping; waiting for in-flight scans");
    if let Some(handle) = timer_scan {
        let _ = handle.await;
    }
    while manual_scans.join_next().await.is_some() {}
}

async fn scan_once<S, N>(scanner: DeadlineScanner<S, N>, trigger: Trigger)
where
    S: TaskStore + ?Sized,
    N: Notifier + ?Sized,
{
    match scanner.run_scan(Utc::now()).await {
        Ok(report) => debug!(?trigger, sent = report.sent, "scan complete"),
        Err(e) => error!(?trigger, error = %e, "deadline scan failed"),
    }
}
