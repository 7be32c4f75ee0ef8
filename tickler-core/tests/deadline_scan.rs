use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use tickler_core::{
    DeadlineScanner, MAX_FALLBACK, MemoryStore, NewTask, Notification, Notifier, NotifyError,
    OwnerContact, ScanError, ScanPolicy, StoreError, Task, TaskStore, User,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()
}

/// Notifier double: records every attempt, fails for chosen titles, optional delay.
#[derive(Default)]
struct Scripted {
    attempts: Mutex<Vec<Notification>>,
    fail_titles: HashSet<String>,
    delay: Option<StdDuration>,
}

impl Scripted {
    fn failing(titles: &[&str]) -> Self {
        Self {
            fail_titles: titles.iter().map(|t| t.to_string()).collect(),
            ..Self::default()
        }
    }

    fn slow(delay: StdDuration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    fn attempts(&self) -> usize {
        self.attempts.lock().len()
    }
}

#[async_trait]
impl Notifier for Scripted {
    fn channel(&self) -> &'static str {
        "scripted"
    }

    async fn send(&self, message: &Notification) -> Result<(), NotifyError> {
        self.attempts.lock().push(message.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self
            .fail_titles
            .iter()
            .any(|t| message.subject.ends_with(t.as_str()))
        {
            return Err(NotifyError::Transport("connection refused".into()));
        }
        Ok(())
    }
}

fn store_with(tasks: &[(&str, Option<Duration>)]) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.with(|book| {
        book.add_user(User::new("u1", "anna", "anna@example.com").with_first_name("Anna"))
            .unwrap();
        for (title, offset) in tasks {
            let mut input = NewTask::new(*title);
            if let Some(offset) = offset {
                input = input.with_deadline(now() + *offset);
            }
            book.create_task("u1", input, now() - Duration::hours(1)).unwrap();
        }
    });
    store
}

fn reminded(store: &MemoryStore, id: &str) -> bool {
    store.get(id).unwrap().reminder_sent()
}

#[tokio::test]
async fn partial_failure_counts_and_leaves_failed_task_eligible() {
    let store = store_with(&[
        ("one", Some(Duration::minutes(10))),
        ("two", Some(Duration::minutes(20))),
        ("three", Some(Duration::minutes(30))),
    ]);
    let notifier = Arc::new(Scripted::failing(&["two"]));
    let scanner = DeadlineScanner::new(store.clone(), notifier.clone(), ScanPolicy::default());

    let report = scanner.run_scan(now()).await.unwrap();

    assert_eq!(report.processed, 3);
    assert_eq!(report.sent, 2);
    assert_eq!(report.failed, 1);
    assert!(!report.fallback_used);
    assert!(reminded(&store, "task-0001"));
    assert!(!reminded(&store, "task-0002"));
    assert!(reminded(&store, "task-0003"));

    // the failed one is retried on the next tick, and only that one
    let retry = DeadlineScanner::new(store.clone(), Arc::new(Scripted::default()), ScanPolicy::default());
    let again = retry.run_scan(now() + Duration::minutes(1)).await.unwrap();
    assert_eq!((again.processed, again.sent), (1, 1));
    assert!(reminded(&store, "task-0002"));
}

#[tokio::test]
async fn completed_and_undated_tasks_are_never_selected() {
    let store = store_with(&[("undated", None), ("done", Some(Duration::minutes(5)))]);
    store.with(|book| book.complete("u1", "task-0002").map(|_| ())).unwrap();

    let notifier = Arc::new(Scripted::default());
    let scanner = DeadlineScanner::new(store.clone(), notifier.clone(), ScanPolicy::default());
    let report = scanner.run_scan(now()).await.unwrap();

    assert_eq!(report.processed, 0);
    // the fallback ran but found nothing, so it selected nothing
    assert!(!report.fallback_used);
    assert_eq!(notifier.attempts(), 0);
}

#[tokio::test]
async fn reminder_message_reaches_owner_address() {
    let store = store_with(&[("Pay rent", Some(Duration::minutes(90)))]);
    let notifier = Arc::new(Scripted::default());
    let policy = ScanPolicy {
        lead_time: Duration::hours(2),
        ..ScanPolicy::default()
    };
    DeadlineScanner::new(store, notifier.clone(), policy)
        .run_scan(now())
        .await
        .unwrap();

    let attempts = notifier.attempts.lock();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].recipient, "anna@example.com");
    assert_eq!(attempts[0].subject, "⏰ Deadline reminder: Pay rent");
    assert!(attempts[0].body.contains("Hello Anna!"));
    assert!(attempts[0].body.contains("Time left: 1 hours 30 minutes"));
}

#[tokio::test]
async fn fallback_runs_only_when_window_is_empty() {
    let store = store_with(&[
        ("overdue", Some(-Duration::minutes(5))),
        ("next week", Some(Duration::days(7))),
    ]);
    let notifier = Arc::new(Scripted::default());
    let scanner = DeadlineScanner::new(store.clone(), notifier.clone(), ScanPolicy::default());

    let report = scanner.run_scan(now()).await.unwrap();
    assert!(report.fallback_used);
    assert_eq!((report.processed, report.sent), (2, 2));
    assert!(notifier.attempts.lock()[0].body.contains("Time left: 0 hours 0 minutes"));

    // with something due in the window the fallback stays off
    store.with(|book| {
        book.create_task("u1", NewTask::new("soon").with_deadline(now() + Duration::minutes(15)), now())
            .unwrap();
        book.create_task("u1", NewTask::new("far").with_deadline(now() + Duration::days(3)), now())
            .unwrap();
    });
    let report = scanner.run_scan(now()).await.unwrap();
    assert!(!report.fallback_used);
    assert_eq!(report.processed, 1);
    assert!(!reminded(&store, "task-0004"));
}

#[tokio::test]
async fn fallback_is_bounded_to_limit() {
    let offsets: Vec<(String, Option<Duration>)> = (0..8)
        .map(|i| (format!("t{i}"), Some(Duration::days(i + 1))))
        .collect();
    let borrowed: Vec<(&str, Option<Duration>)> =
        offsets.iter().map(|(t, o)| (t.as_str(), *o)).collect();
    let store = store_with(&borrowed);
    let notifier = Arc::new(Scripted::default());

    let report = DeadlineScanner::new(store.clone(), notifier.clone(), ScanPolicy::default())
        .run_scan(now())
        .await
        .unwrap();

    assert_eq!(report.processed, 5);
    // natural order: the first five created
    for i in 1..=5 {
        assert!(reminded(&store, &format!("task-{i:04}")));
    }
    assert!(!reminded(&store, "task-0006"));
}

#[tokio::test]
async fn oversized_fallback_limit_is_capped() {
    let offsets: Vec<(String, Option<Duration>)> = (0..8)
        .map(|i| (format!("t{i}"), Some(Duration::days(i + 1))))
        .collect();
    let borrowed: Vec<(&str, Option<Duration>)> =
        offsets.iter().map(|(t, o)| (t.as_str(), *o)).collect();
    let store = store_with(&borrowed);
    let policy = ScanPolicy {
        fallback_limit: Some(50),
        ..ScanPolicy::default()
    };

    let report = DeadlineScanner::new(store.clone(), Arc::new(Scripted::default()), policy)
        .run_scan(now())
        .await
        .unwrap();

    assert!(report.fallback_used);
    assert_eq!(report.processed, MAX_FALLBACK);
    assert!(!reminded(&store, "task-0006"));
}

#[tokio::test]
async fn fallback_can_be_disabled() {
    let store = store_with(&[("next week", Some(Duration::days(7)))]);
    let notifier = Arc::new(Scripted::default());
    let policy = ScanPolicy {
        fallback_limit: None,
        ..ScanPolicy::default()
    };
    let report = DeadlineScanner::new(store, notifier.clone(), policy)
        .run_scan(now())
        .await
        .unwrap();

    assert_eq!(report.processed, 0);
    assert!(!report.fallback_used);
    assert_eq!(notifier.attempts(), 0);
}

#[tokio::test]
async fn second_scan_sends_nothing_new() {
    let store = store_with(&[("one", Some(Duration::minutes(10)))]);
    let notifier = Arc::new(Scripted::default());
    let scanner = DeadlineScanner::new(store.clone(), notifier.clone(), ScanPolicy::default());

    scanner.run_scan(now()).await.unwrap();
    let second = scanner.run_scan(now() + Duration::minutes(1)).await.unwrap();

    assert_eq!(second.processed, 0);
    assert_eq!(notifier.attempts(), 1);
    assert!(reminded(&store, "task-0001"));
}

#[tokio::test]
async fn overlapping_scans_send_once() {
    let store = store_with(&[
        ("one", Some(Duration::minutes(10))),
        ("two", Some(Duration::minutes(40))),
    ]);
    let notifier = Arc::new(Scripted::slow(StdDuration::from_millis(50)));
    let timer = DeadlineScanner::new(store.clone(), notifier.clone(), ScanPolicy::default());
    let manual = timer.clone();

    let (a, b) = tokio::join!(timer.run_scan(now()), manual.run_scan(now()));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(notifier.attempts(), 2);
    assert_eq!(a.recorded + b.recorded, 2);
    assert_eq!(a.sent + b.sent, 2);
    assert!(reminded(&store, "task-0001"));
    assert!(reminded(&store, "task-0002"));
}

#[tokio::test]
async fn independent_scanners_never_double_record() {
    let store = store_with(&[("one", Some(Duration::minutes(10)))]);
    let notifier = Arc::new(Scripted::slow(StdDuration::from_millis(20)));
    let a = DeadlineScanner::new(store.clone(), notifier.clone(), ScanPolicy::default());
    let b = DeadlineScanner::new(store.clone(), notifier.clone(), ScanPolicy::default());

    let (ra, rb) = tokio::join!(a.run_scan(now()), b.run_scan(now()));
    let (ra, rb) = (ra.unwrap(), rb.unwrap());

    // no shared ledger: both may deliver, only one wins the transition
    assert_eq!(ra.recorded + rb.recorded, 1);
    assert!(reminded(&store, "task-0001"));
}

#[tokio::test]
async fn hanging_send_times_out_and_scan_continues() {
    let store = store_with(&[
        ("stuck", Some(Duration::minutes(10))),
        ("fine", Some(Duration::minutes(20))),
    ]);

    struct HangsOnStuck(AtomicUsize);

    #[async_trait]
    impl Notifier for HangsOnStuck {
        fn channel(&self) -> &'static str {
            "hangs"
        }

        async fn send(&self, message: &Notification) -> Result<(), NotifyError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            if message.subject.ends_with("stuck") {
                tokio::time::sleep(StdDuration::from_secs(3600)).await;
            }
            Ok(())
        }
    }

    let notifier = Arc::new(HangsOnStuck(AtomicUsize::new(0)));
    let policy = ScanPolicy {
        send_timeout: StdDuration::from_millis(50),
        ..ScanPolicy::default()
    };
    let report = DeadlineScanner::new(store.clone(), notifier.clone(), policy)
        .run_scan(now())
        .await
        .unwrap();

    assert_eq!(notifier.0.load(Ordering::SeqCst), 2);
    assert_eq!((report.processed, report.sent, report.failed), (2, 1, 1));
    assert!(!reminded(&store, "task-0001"));
    assert!(reminded(&store, "task-0002"));
}

#[tokio::test]
async fn unknown_owner_is_a_per_task_failure() {
    let store = store_with(&[("orphan", None), ("mine", Some(Duration::minutes(5)))]);
    store.with(|book| {
        book.upsert(
            Task::new("task-0100", "ghost", "orphan", now()).with_deadline(now() + Duration::minutes(5)),
        )
    });
    let notifier = Arc::new(Scripted::default());
    let report = DeadlineScanner::new(store.clone(), notifier.clone(), ScanPolicy::default())
        .run_scan(now())
        .await
        .unwrap();

    assert_eq!((report.processed, report.sent, report.failed), (2, 1, 1));
    assert!(!reminded(&store, "task-0100"));
}

/// Store double whose queries or updates can be made to fail.
struct FlakyStore {
    inner: MemoryStore,
    queries_fail: bool,
    updates_fail: bool,
}

#[async_trait]
impl TaskStore for FlakyStore {
    async fn find_eligible_for_reminder(
        &self,
        now: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<Task>, StoreError> {
        if self.queries_fail {
            return Err(StoreError::Unavailable("database is down".into()));
        }
        self.inner.find_eligible_for_reminder(now, window_end).await
    }

    async fn find_any_unreminded(&self, limit: usize) -> Result<Vec<Task>, StoreError> {
        if self.queries_fail {
            return Err(StoreError::Unavailable("database is down".into()));
        }
        self.inner.find_any_unreminded(limit).await
    }

    async fn compare_and_set_reminder_sent(&self, task_id: &str) -> Result<bool, StoreError> {
        if self.updates_fail {
            return Err(StoreError::Unavailable("write rejected".into()));
        }
        self.inner.compare_and_set_reminder_sent(task_id).await
    }

    async fn owner_contact(&self, owner_id: &str) -> Result<Option<OwnerContact>, StoreError> {
        self.inner.owner_contact(owner_id).await
    }
}

fn flaky(queries_fail: bool, updates_fail: bool) -> Arc<FlakyStore> {
    let seeded = store_with(&[("one", Some(Duration::minutes(10)))]);
    Arc::new(FlakyStore {
        inner: MemoryStore::with_book(seeded.snapshot()),
        queries_fail,
        updates_fail,
    })
}

#[tokio::test]
async fn unavailable_store_fails_the_whole_scan() {
    let store = flaky(true, false);
    let notifier = Arc::new(Scripted::default());
    let err = DeadlineScanner::new(store.clone(), notifier.clone(), ScanPolicy::default())
        .run_scan(now())
        .await
        .unwrap_err();

    assert!(matches!(err, ScanError::Query(StoreError::Unavailable(_))));
    assert_eq!(notifier.attempts(), 0);
    assert!(!store.inner.get("task-0001").unwrap().reminder_sent());
}

#[tokio::test]
async fn persist_failure_after_send_is_reported_separately() {
    let store = flaky(false, true);
    let notifier = Arc::new(Scripted::default());
    let scanner = DeadlineScanner::new(store.clone(), notifier.clone(), ScanPolicy::default());

    let report = scanner.run_scan(now()).await.unwrap();
    assert_eq!((report.processed, report.sent, report.recorded, report.unrecorded), (1, 1, 0, 1));
    assert_eq!(report.failed, 0);

    // still unmarked, so the next tick delivers again (at-least-once)
    let again = scanner.run_scan(now()).await.unwrap();
    assert_eq!(again.sent, 1);
    assert_eq!(notifier.attempts(), 2);
}
