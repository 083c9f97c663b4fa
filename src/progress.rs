//! Persisted solved-problem bookkeeping.
//!
//! The snapshot is a flat string key/value map with two fixed keys, the same
//! shape a browser's local storage would hold:
//!   solvedProblems    : integer as a string, e.g. "3"
//!   solvedProblemIds  : JSON array of problem ids, as a string
//!
//! Loaded once at session start and written after every counter change.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use thiserror::Error;
use tracing::warn;

pub const SOLVED_PROBLEMS_KEY: &str = "solvedProblems";
pub const SOLVED_IDS_KEY: &str = "solvedProblemIds";

#[derive(Debug, Error)]
pub enum ProgressError {
  #[error("failed to access {path}: {source}")]
  Io { path: PathBuf, source: io::Error },
  #[error("failed to encode progress: {0}")]
  Encode(#[from] serde_json::Error),
}

/// What survives between sessions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
  pub solved_count: u32,
  pub solved_ids: Vec<String>,
}

impl ProgressSnapshot {
  /// Lenient decoding: a bad value for one key never discards the other.
  pub fn from_entries(entries: &BTreeMap<String, String>) -> Self {
    let solved_count = entries
      .get(SOLVED_PROBLEMS_KEY)
      .and_then(|v| v.trim().parse::<u32>().ok())
      .unwrap_or(0);
    let solved_ids = entries
      .get(SOLVED_IDS_KEY)
      .and_then(|v| serde_json::from_str::<Vec<String>>(v).ok())
      .unwrap_or_default();
    Self { solved_count, solved_ids }
  }

  pub fn to_entries(&self) -> Result<BTreeMap<String, String>, ProgressError> {
    let mut entries = BTreeMap::new();
    entries.insert(SOLVED_PROBLEMS_KEY.to_string(), self.solved_count.to_string());
    entries.insert(SOLVED_IDS_KEY.to_string(), serde_json::to_string(&self.solved_ids)?);
    Ok(entries)
  }
}

/// Load/save seam for progress persistence.
pub trait ProgressStore: Send + Sync {
  fn load(&self) -> ProgressSnapshot;
  fn save(&self, snapshot: &ProgressSnapshot) -> Result<(), ProgressError>;
}

/// JSON file store. Writes go through a temp file and a rename.
pub struct FileProgressStore {
  path: PathBuf,
}

impl FileProgressStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  #[cfg(test)]
  pub fn path(&self) -> &std::path::Path {
    &self.path
  }

  fn io_err(&self, source: io::Error) -> ProgressError {
    ProgressError::Io { path: self.path.clone(), source }
  }
}

impl ProgressStore for FileProgressStore {
  fn load(&self) -> ProgressSnapshot {
    let data = match fs::read(&self.path) {
      Ok(data) => data,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return ProgressSnapshot::default(),
      Err(e) => {
        warn!(target: "session", path = %self.path.display(), error = %e, "Failed to read progress; starting from zero");
        return ProgressSnapshot::default();
      }
    };
    match serde_json::from_slice::<BTreeMap<String, String>>(&data) {
      Ok(entries) => ProgressSnapshot::from_entries(&entries),
      Err(e) => {
        warn!(target: "session", path = %self.path.display(), error = %e, "Failed to parse progress; starting from zero");
        ProgressSnapshot::default()
      }
    }
  }

  fn save(&self, snapshot: &ProgressSnapshot) -> Result<(), ProgressError> {
    if let Some(dir) = self.path.parent() {
      if !dir.as_os_str().is_empty() {
        fs::create_dir_all(dir).map_err(|e| self.io_err(e))?;
      }
    }
    let bytes = serde_json::to_vec_pretty(&snapshot.to_entries()?)?;
    let tmp = self.path.with_extension("json.tmp");
    fs::write(&tmp, bytes).map_err(|e| self.io_err(e))?;
    match fs::rename(&tmp, &self.path) {
      Ok(()) => Ok(()),
      Err(rename_err) => {
        if self.path.exists() {
          fs::remove_file(&self.path).map_err(|e| self.io_err(e))?;
          fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))
        } else {
          Err(self.io_err(rename_err))
        }
      }
    }
  }
}

/// In-memory store, used when no progress path is configured.
#[derive(Default)]
pub struct MemoryProgressStore {
  inner: Mutex<ProgressSnapshot>,
}

impl MemoryProgressStore {
  pub fn with_snapshot(snapshot: ProgressSnapshot) -> Self {
    Self { inner: Mutex::new(snapshot) }
  }
}

impl ProgressStore for MemoryProgressStore {
  fn load(&self) -> ProgressSnapshot {
    self.inner.lock().map(|s| s.clone()).unwrap_or_default()
  }

  fn save(&self, snapshot: &ProgressSnapshot) -> Result<(), ProgressError> {
    if let Ok(mut guard) = self.inner.lock() {
      *guard = snapshot.clone();
    }
    Ok(())
  }
}
