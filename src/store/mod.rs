pub mod lock;

pub use lock::CollectionLock;

use std::collections::BTreeMap;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::types::Record;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt collection file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Could not lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out after {waited:?} waiting for lock {path}")]
    LockTimeout { path: PathBuf, waited: Duration },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid collection name: {0}")]
    InvalidName(String),

    #[error("Store task failed: {0}")]
    Task(String),
}

impl StoreError {
    pub fn is_lock_failure(&self) -> bool {
        matches!(self, StoreError::Lock { .. } | StoreError::LockTimeout { .. })
    }
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// None blocks on the lock indefinitely
    pub lock_timeout: Option<Duration>,
    pub lock_retry_interval: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            lock_timeout: None,
            lock_retry_interval: Duration::from_millis(25),
        }
    }
}

impl StoreOptions {
    pub fn from_config() -> Self {
        let store = &crate::config::config().store;
        Self {
            lock_timeout: store.lock_timeout_ms.map(Duration::from_millis),
            lock_retry_interval: Duration::from_millis(store.lock_retry_interval_ms),
        }
    }
}

/// A buffered mutation applied under the collection lock
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    Set(String, Record),
    Delete(String),
}

impl StoreOp {
    pub fn key(&self) -> &str {
        match self {
            StoreOp::Set(key, _) | StoreOp::Delete(key) => key,
        }
    }
}

/// What a commit changed on disk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub written: usize,
    pub removed: usize,
}

/// File-backed key -> Record collection.
///
/// Reads are served from the snapshot loaded at `open` (or the last `reload`/commit) and
/// may lag writers in other processes. Every mutation takes the collection lock, re-reads
/// the file, applies the buffered operations on top of what it found, and atomically
/// replaces the file, so concurrent writers of different keys never lose each other's work.
#[derive(Debug)]
pub struct RecordStore {
    path: PathBuf,
    options: StoreOptions,
    snapshot: BTreeMap<String, Record>,
}

impl RecordStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::open_with_options(path, StoreOptions::default())
    }

    pub fn open_with_options(path: impl Into<PathBuf>, options: StoreOptions) -> Result<Self, StoreError> {
        let path = path.into();
        let snapshot = read_collection(&path)?;
        tracing::debug!("Opened {} with {} record(s)", path.display(), snapshot.len());
        Ok(Self { path, options, snapshot })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the stored record, if present in the snapshot
    pub fn get(&self, key: &str) -> Option<Record> {
        self.snapshot.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.snapshot.contains_key(key)
    }

    /// Copies of every record in the snapshot
    pub fn all(&self) -> Vec<Record> {
        self.snapshot.values().cloned().collect()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.snapshot.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    /// Re-read the file to pick up other writers
    pub fn reload(&mut self) -> Result<(), StoreError> {
        self.snapshot = read_collection(&self.path)?;
        Ok(())
    }

    pub fn set(&mut self, key: impl Into<String>, record: Record) -> Result<(), StoreError> {
        self.commit(vec![StoreOp::Set(key.into(), record)]).map(|_| ())
    }

    /// Returns whether the key was present on disk
    pub fn delete(&mut self, key: &str) -> Result<bool, StoreError> {
        let summary = self.commit(vec![StoreOp::Delete(key.to_string())])?;
        Ok(summary.removed > 0)
    }

    /// Apply a batch of operations in a single lock cycle
    pub fn commit(&mut self, ops: Vec<StoreOp>) -> Result<CommitSummary, StoreError> {
        if ops.is_empty() {
            return Ok(CommitSummary::default());
        }

        let _lock = CollectionLock::acquire(&self.path, self.options.lock_timeout, self.options.lock_retry_interval)?;

        // Absorb whatever other writers committed since our snapshot
        let mut current = read_collection(&self.path)?;
        let mut summary = CommitSummary::default();
        for op in ops {
            match op {
                StoreOp::Set(key, record) => {
                    current.insert(key, record);
                    summary.written += 1;
                }
                StoreOp::Delete(key) => {
                    if current.remove(&key).is_some() {
                        summary.removed += 1;
                    }
                }
            }
        }

        if summary.written > 0 || summary.removed > 0 {
            write_collection(&self.path, &current)?;
            tracing::debug!(
                "Committed {} write(s), {} removal(s) to {}",
                summary.written, summary.removed, self.path.display()
            );
        }

        self.snapshot = current;
        Ok(summary)
    }
}

fn read_collection(path: &Path) -> Result<BTreeMap<String, Record>, StoreError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(e.into()),
    };

    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Write to a temp file beside the target, fsync, then rename over it
fn write_collection(path: &Path, records: &BTreeMap<String, Record>) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, records)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}
