//! JSON file-backed task store (`~/.tickler/tasks.json`).
//!
//! Every operation re-reads the file so edits made by other `tickler`
//! invocations are picked up. Reads and read-modify-write cycles run under an
//! advisory `flock` on `tasks.json.lock`, so `tickler scan` and `tickler serve`
//! can share one file; an in-process mutex orders threads of one handle.
//! Writes go to a uniquely named temp file that is renamed into place.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use tickler_core::{BookError, OwnerContact, StoreError, Task, TaskBook, TaskStore};

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_path = path.clone().into_os_string();
        lock_path.push(".lock");
        Self {
            path,
            lock_path: lock_path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current contents; a missing file is an empty book.
    pub fn load(&self) -> Result<TaskBook, StoreError> {
        let _guard = self.lock.lock();
        let _file = FileLock::acquire(&self.lock_path, LockMode::Shared)?;
        self.read()
    }

    /// Apply a CRUD operation and persist it. Nothing is written when it fails.
    pub fn mutate<T>(&self, f: impl FnOnce(&mut TaskBook) -> Result<T, BookError>) -> Result<T> {
        let _guard = self.lock.lock();
        let _file = FileLock::acquire(&self.lock_path, LockMode::Exclusive)
            .with_context(|| format!("lock {}", self.lock_path.display()))?;
        let mut book = self
            .read()
            .with_context(|| format!("read {}", self.path.display()))?;
        let out = f(&mut book)?;
        self.write(&book)
            .with_context(|| format!("write {}", self.path.display()))?;
        Ok(out)
    }

    fn read(&self) -> Result<TaskBook, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(TaskBook::new()),
            Err(e) => return Err(StoreError::Io(e)),
        };
        if raw.trim().is_empty() {
            return Ok(TaskBook::new());
        }
        serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    fn write(&self, book: &TaskBook) -> Result<(), StoreError> {
        let dir = parent_dir(&self.path);
        fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, book)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    /// Conditional `NotReminded -> Reminded` flip, persisted before it counts.
    fn mark_reminded(&self, task_id: &str) -> Result<bool, StoreError> {
        let _guard = self.lock.lock();
        let _file = FileLock::acquire(&self.lock_path, LockMode::Exclusive)?;
        let mut book = self.read()?;
        if !book.mark_reminded(task_id) {
            return Ok(false);
        }
        self.write(&book)?;
        Ok(true)
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockMode {
    Shared,
    Exclusive,
}

/// Advisory lock on the sidecar lock file; released when the file closes.
struct FileLock {
    _file: fs::File,
}

impl FileLock {
    fn acquire(path: &Path, mode: LockMode) -> io::Result<Self> {
        fs::create_dir_all(parent_dir(path))?;
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        flock(&file, mode)?;
        Ok(Self { _file: file })
    }
}

#[cfg(unix)]
fn flock(file: &fs::File, mode: LockMode) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let op = match mode {
        LockMode::Shared => libc::LOCK_SH,
        LockMode::Exclusive => libc::LOCK_EX,
    };
    loop {
        // SAFETY: the descriptor belongs to `file`, which outlives the call.
        if unsafe { libc::flock(file.as_raw_fd(), op) } == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

// No advisory locking off Unix; the in-process mutex still applies.
#[cfg(not(unix))]
fn flock(_file: &fs::File, _mode: LockMode) -> io::Result<()> {
    Ok(())
}

#[async_trait]
impl TaskStore for FileStore {
    async fn find_eligible_for_reminder(
        &self,
        now: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<Task>, StoreError> {
        Ok(self.load()?.due_within(now, window_end))
    }

    async fn find_any_unreminded(&self, limit: usize) -> Result<Vec<Task>, StoreError> {
        Ok(self.load()?.any_unreminded(limit))
    }

    async fn compare_and_set_reminder_sent(&self, task_id: &str) -> Result<bool, StoreError> {
        self.mark_reminded(task_id)
    }

    async fn owner_contact(&self, owner_id: &str) -> Result<Option<OwnerContact>, StoreError> {
        Ok(self.load()?.owner_contact(owner_id))
    }
}
