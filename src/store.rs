//! Persistent seen-set used for de-duplication by the feed jobs.
//!
//! The store maps an opaque item identifier to the local date-time it was
//! last delivered, formatted as `YYYY/MM/DD HH:MM:SS`. It is loaded fully into
//! memory on [`SeenSet::open`] and written back on [`SeenSet::close`].
//!
//! # File format
//!
//! A single JSON object:
//!
//! ```text
//! {
//!   "https://example.com/posts/1": "2026/10/14 07:30:00",
//!   "dr-p1-pod-4711": "2026/10/13 07:30:02"
//! }
//! ```
//!
//! Writes go to a sibling temporary file which is then renamed over the
//! previous file, so a crash mid-write leaves the previous contents intact.
//!
//! One job invocation owns the file for its whole lifetime; no locking is
//! performed.

use crate::error::StoreError;
use chrono::{Duration, Local, NaiveDateTime};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Format of stored timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Entries older than this many days are removed by the sweep.
pub const RETENTION_DAYS: i64 = 365;

/// Current local time rendered in [`TIMESTAMP_FORMAT`].
pub fn timestamp_now() -> String {
    format_timestamp(Local::now().naive_local())
}

pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// File-backed map of delivered item identifiers.
#[derive(Debug)]
pub struct SeenSet {
    path: PathBuf,
    entries: BTreeMap<String, String>,
    dirty: bool,
    closed: bool,
}

impl SeenSet {
    /// Open the store at `path`, creating an empty one if it does not exist.
    ///
    /// # Arguments
    ///
    /// * `path` - JSON file mapping keys to their last-seen timestamps
    ///
    /// # Returns
    ///
    /// The loaded store, [`StoreError::Io`] if the file cannot be read or
    /// created, or [`StoreError::Corrupt`] if it is not a JSON object of strings.
    #[instrument(level = "info", fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let io_err = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };

        let entries = match fs::read(path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
                path: path.to_path_buf(),
                source,
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent).map_err(io_err)?;
                }
                fs::write(path, b"{}").map_err(io_err)?;
                info!("Created empty seen-set");
                BTreeMap::new()
            }
            Err(e) => return Err(io_err(e)),
        };

        debug!(entries = entries.len(), "Opened seen-set");
        Ok(Self {
            path: path.to_path_buf(),
            entries,
            dirty: false,
            closed: false,
        })
    }

    /// Whether `key` has been recorded.
    ///
    /// # Arguments
    ///
    /// * `key` - Dedup key of an item, as produced by the job's key function
    ///
    /// # Returns
    ///
    /// `true` if the key is present, whatever its timestamp.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or overwrite the timestamp for `key`.
    pub fn record(&mut self, key: impl Into<String>, timestamp: impl Into<String>) {
        self.entries.insert(key.into(), timestamp.into());
        self.dirty = true;
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove entries last seen more than `retention_days` ago.
    ///
    /// # Returns
    ///
    /// The number of entries removed, or [`StoreError::MalformedTimestamp`]
    /// for the first entry whose timestamp cannot be parsed.
    pub fn sweep(&mut self, retention_days: i64) -> Result<usize, StoreError> {
        self.sweep_at(Local::now().naive_local(), retention_days)
    }

    /// [`SeenSet::sweep`] against an explicit clock.
    ///
    /// Fails on the first unparseable timestamp without removing anything.
    pub fn sweep_at(&mut self, now: NaiveDateTime, retention_days: i64) -> Result<usize, StoreError> {
        let retention = Duration::days(retention_days);
        let mut expired = Vec::new();

        for (key, value) in &self.entries {
            let seen = NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).map_err(|_| {
                StoreError::MalformedTimestamp {
                    key: key.clone(),
                    value: value.clone(),
                }
            })?;
            if now - seen > retention {
                expired.push(key.clone());
            }
        }

        for key in &expired {
            self.entries.remove(key);
        }
        if !expired.is_empty() {
            self.dirty = true;
        }

        info!(removed = expired.len(), remaining = self.entries.len(), "Swept seen-set");
        Ok(expired.len())
    }

    /// Flush pending changes and release the store.
    pub fn close(mut self) -> Result<(), StoreError> {
        self.closed = true;
        self.flush()
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        if !self.dirty {
            return Ok(());
        }
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        let json = serde_json::to_vec_pretty(&self.entries).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;

        self.dirty = false;
        debug!(path = %self.path.display(), entries = self.entries.len(), "Flushed seen-set");
        Ok(())
    }
}

impl Drop for SeenSet {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        warn!(path = %self.path.display(), "Seen-set dropped without close; flushing");
        if let Err(e) = self.flush() {
            warn!(error = %e, "Failed to flush seen-set on drop");
        }
    }
}
