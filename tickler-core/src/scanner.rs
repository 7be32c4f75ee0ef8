//! Deadline scanner: one reminder per task, shortly before its deadline.
//!
//! Each scan:
//! - queries the primary window `[now, now + lead_time]`
//! - if nothing is due and the fallback is enabled, takes up to
//!   `fallback_limit` (never more than [`MAX_FALLBACK`]) unreminded tasks
//!   with any deadline instead
//! - for each selected task: renders the reminder, sends it (bounded by
//!   `send_timeout`), and only on success takes the conditional
//!   `NotReminded -> Reminded` transition in the store
//!
//! Scans may overlap (timer tick + on-demand trigger). Clones of one scanner
//! share a ledger of tasks being sent and tasks recorded while an older scan
//! was still running, so an overlapping scan neither re-sends nor re-marks.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{NotifyError, ScanError};
use crate::notifier::Notifier;
use crate::reminders::render_reminder;
use crate::store::TaskStore;
use crate::task::Task;

/// Hard cap on the fallback selection, whatever the policy asks for.
pub const MAX_FALLBACK: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanPolicy {
    /// How far ahead of `now` a deadline counts as imminent.
    pub lead_time: Duration,
    /// `None` disables the fallback selection. Capped at [`MAX_FALLBACK`].
    pub fallback_limit: Option<usize>,
    /// Upper bound on a single delivery attempt.
    pub send_timeout: std::time::Duration,
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self {
            lead_time: Duration::hours(1),
            fallback_limit: Some(MAX_FALLBACK),
            send_timeout: std::time::Duration::from_secs(30),
        }
    }
}

/// Summary of one scan.
///
/// `sent = recorded + unrecorded + (delivered but already marked elsewhere)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Selected tasks a delivery was attempted for, successful or not.
    pub processed: usize,
    /// Successful deliveries.
    pub sent: usize,
    /// Reminder transitions this scan won.
    pub recorded: usize,
    /// Delivered, but the transition could not be persisted.
    pub unrecorded: usize,
    pub failed: usize,
    /// Left to an overlapping scan.
    pub skipped: usize,
    pub fallback_used: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Recorded,
    AlreadyRecorded,
    Unrecorded,
    Failed,
    Skipped,
}

impl ScanReport {
    fn record(&mut self, outcome: Outcome) {
        if outcome == Outcome::Skipped {
            self.skipped += 1;
            return;
        }
        self.processed += 1;
        match outcome {
            Outcome::Recorded => {
                self.sent += 1;
                self.recorded += 1;
            }
            Outcome::AlreadyRecorded => self.sent += 1,
            Outcome::Unrecorded => {
                self.sent += 1;
                self.unrecorded += 1;
            }
            Outcome::Failed => self.failed += 1,
            Outcome::Skipped => {}
        }
    }
}

/// Shared bookkeeping for overlapping scans.
///
/// A recorded id is kept until every scan that started before the record was
/// made has finished; later scans read the store after the transition.
#[derive(Debug, Default)]
struct Ledger {
    next_scan: u64,
    running: BTreeSet<u64>,
    claimed: HashSet<String>,
    /// task id -> newest scan number issued when it was recorded
    recorded: HashMap<String, u64>,
}

impl Ledger {
    fn begin(&mut self) -> u64 {
        self.next_scan += 1;
        self.running.insert(self.next_scan);
        self.next_scan
    }

    fn end(&mut self, scan: u64) {
        self.running.remove(&scan);
        match self.running.first().copied() {
            Some(oldest) => self.recorded.retain(|_, at| *at >= oldest),
            None => self.recorded.clear(),
        }
    }

    fn try_claim(&mut self, id: &str) -> bool {
        if self.recorded.contains_key(id) {
            return false;
        }
        self.claimed.insert(id.to_string())
    }

    fn release(&mut self, id: &str, recorded: bool) {
        self.claimed.remove(id);
        if recorded {
            self.recorded.insert(id.to_string(), self.next_scan);
        }
    }
}

struct ScanGuard<'a> {
    ledger: &'a Mutex<Ledger>,
    scan: u64,
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.ledger.lock().end(self.scan);
    }
}

struct Claim<'a> {
    ledger: &'a Mutex<Ledger>,
    id: String,
    recorded: bool,
}

impl Claim<'_> {
    fn mark_recorded(&mut self) {
        self.recorded = true;
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.ledger.lock().release(&self.id, self.recorded);
    }
}

pub struct DeadlineScanner<S: ?Sized, N: ?Sized> {
    store: Arc<S>,
    notifier: Arc<N>,
    policy: ScanPolicy,
    ledger: Arc<Mutex<Ledger>>,
}

impl<S: ?Sized, N: ?Sized> Clone for DeadlineScanner<S, N> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            notifier: Arc::clone(&self.notifier),
            policy: self.policy,
            ledger: Arc::clone(&self.ledger),
        }
    }
}

impl<S, N> DeadlineScanner<S, N>
where
    S: TaskStore + ?Sized,
    N: Notifier + ?Sized,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>, policy: ScanPolicy) -> Self {
        Self {
            store,
            notifier,
            policy,
            ledger: Arc::new(Mutex::new(Ledger::default())),
        }
    }

    pub fn policy(&self) -> &ScanPolicy {
        &self.policy
    }

    /// Run one scan as of `now`.
    ///
    /// Fails only when the eligibility query itself fails; per-task problems
    /// are logged and counted in the report.
    pub async fn run_scan(&self, now: DateTime<Utc>) -> Result<ScanReport, ScanError> {
        let _scan = self.begin_scan();
        let (tasks, fallback_used) = self.select(now).await?;

        let mut report = ScanReport {
            fallback_used,
            ..ScanReport::default()
        };

        for task in &tasks {
            if !task.is_unreminded_candidate() {
                debug!(task_id = %task.id, "store returned an ineligible task; ignoring");
                continue;
            }
            report.record(self.remind(task, now).await);
        }

        info!(
            processed = report.processed,
            sent = report.sent,
            failed = report.failed,
            unrecorded = report.unrecorded,
            skipped = report.skipped,
            fallback = report.fallback_used,
            "deadline scan finished"
        );
        Ok(report)
    }

    async fn select(&self, now: DateTime<Utc>) -> Result<(Vec<Task>, bool), ScanError> {
        let window_end = now + self.policy.lead_time;
        let due = self
            .store
            .find_eligible_for_reminder(now, window_end)
            .await?;
        if !due.is_empty() {
            return Ok((due, false));
        }

        let Some(limit) = self.policy.fallback_limit.map(|l| l.min(MAX_FALLBACK)) else {
            return Ok((due, false));
        };
        let mut any = self.store.find_any_unreminded(limit).await?;
        any.truncate(limit);
        if any.is_empty() {
            return Ok((any, false));
        }
        debug!(count = any.len(), "nothing due in window; using fallback selection");
        Ok((any, true))
    }

    async fn remind(&self, task: &Task, now: DateTime<Utc>) -> Outcome {
        let Some(mut claim) = self.claim(&task.id) else {
            debug!(task_id = %task.id, "reminder handled by an overlapping scan");
            return Outcome::Skipped;
        };

        let contact = match self.store.owner_contact(&task.owner).await {
            Ok(Some(contact)) => contact,
            Ok(None) => {
                warn!(task_id = %task.id, owner = %task.owner, "reminder not sent: unknown owner");
                return Outcome::Failed;
            }
            Err(e) => {
                warn!(task_id = %task.id, owner = %task.owner, error = %e, "reminder not sent: owner lookup failed");
                return Outcome::Failed;
            }
        };

        let message = render_reminder(task, &contact, now);
        let timeout = self.policy.send_timeout;
        let delivery = match tokio::time::timeout(timeout, self.notifier.send(&message)).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout(timeout)),
        };

        if let Err(e) = delivery {
            warn!(
                task_id = %task.id,
                recipient = %message.recipient,
                channel = self.notifier.channel(),
                error = %e,
                "reminder not sent"
            );
            return Outcome::Failed;
        }

        match self.store.compare_and_set_reminder_sent(&task.id).await {
            Ok(true) => {
                claim.mark_recorded();
                info!(task_id = %task.id, recipient = %message.recipient, "reminder sent");
                Outcome::Recorded
            }
            Ok(false) => {
                claim.mark_recorded();
                warn!(task_id = %task.id, "reminder delivered but task was already marked");
                Outcome::AlreadyRecorded
            }
            Err(e) => {
                error!(
                    task_id = %task.id,
                    recipient = %message.recipient,
                    error = %e,
                    "reminder delivered but not recorded"
                );
                Outcome::Unrecorded
            }
        }
    }

    fn begin_scan(&self) -> ScanGuard<'_> {
        let scan = self.ledger.lock().begin();
        ScanGuard {
            ledger: &self.ledger,
            scan,
        }
    }

    fn claim(&self, id: &str) -> Option<Claim<'_>> {
        if !self.ledger.lock().try_claim(id) {
            return None;
        }
        Some(Claim {
            ledger: &self.ledger,
            id: id.to_string(),
            recorded: false,
        })
    }
}
