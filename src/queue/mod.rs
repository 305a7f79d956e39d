//! # Durable Outbox Module
//!
//! The at-least-once delivery buffer between the modem and the telemetry
//! API. Each not-yet-confirmed record is one JSON file in the outbox
//! directory; the filename encodes the record's timestamp and identity so
//! plain filename sort order is chronological order. A record that exists
//! on disk is, by invariant, not yet confirmed delivered — the delivery
//! pipeline is the only writer and the only deleter.
//!
//! ```text
//! data/outbox/
//! ├── 20250429_090042_+628115013798.json
//! ├── 20250429_091544_+628115113495.json
//! └── ...
//! ```
//!
//! Writes go through a temp file and an atomic rename under an exclusive
//! lock, and `remove` is idempotent: a crash between remote-success and
//! local-delete must not be fatal on the next start.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use fs2::FileExt;
use log::warn;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use tokio::fs;

/// One durable unit of pending work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedRecord {
    /// Originating sender address.
    pub identity: String,
    /// Canonical timestamp (`YYYY-MM-DD HH:MM:SS`), or the raw modem
    /// string when normalization passed it through.
    pub timestamp: String,
    /// Message body as extracted.
    pub body: String,
}

/// Characters percent-encoded in the identity filename component.
/// `+` stays literal so sender addresses remain readable on disk.
const IDENTITY_ENCODE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'+').remove(b'-').remove(b'_');

/// Directory-backed durable queue.
pub struct Outbox {
    dir: PathBuf,
}

impl Outbox {
    /// Open (creating if needed) the outbox at `dir`.
    pub async fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| anyhow!("Failed to create outbox directory {}: {}", dir.display(), e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deterministic on-disk location for a record.
    ///
    /// Identical timestamp+identity maps to the same path; a rapid repeat
    /// at second resolution overwrites (last write wins).
    pub fn record_path(&self, record: &QueuedRecord) -> PathBuf {
        let stamp = compact_stamp(&record.timestamp);
        let identity = utf8_percent_encode(&record.identity, IDENTITY_ENCODE);
        self.dir.join(format!("{}_{}.json", stamp, identity))
    }

    /// Persist a record durably. Returns the path written.
    pub async fn enqueue(&self, record: &QueuedRecord) -> Result<PathBuf> {
        let path = self.record_path(record);
        let content = serde_json::to_string_pretty(record)
            .map_err(|e| anyhow!("Failed to serialize queued record: {}", e))?;
        write_file_locked(&path, &content)?;
        Ok(path)
    }

    /// All currently queued records in chronological (filename) order.
    ///
    /// Foreign or unreadable entries in the directory are skipped with a
    /// warning, never raised: the queue must stay drainable even when a
    /// stray file lands next to it.
    pub async fn list_pending(&self) -> Result<Vec<QueuedRecord>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| anyhow!("Failed to read outbox directory {}: {}", self.dir.display(), e))?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();

        let mut records = Vec::new();
        for name in names {
            if !looks_like_record(&name) {
                warn!("Skipping foreign file in outbox: {}", name);
                continue;
            }
            let path = self.dir.join(&name);
            let data = match fs::read_to_string(&path).await {
                Ok(d) => d,
                Err(e) => {
                    warn!("Skipping unreadable outbox record {}: {}", name, e);
                    continue;
                }
            };
            match serde_json::from_str::<QueuedRecord>(data.trim_start_matches('\0')) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!("Skipping malformed outbox record {}: {}", name, e);
                }
            }
        }
        Ok(records)
    }

    /// Number of records currently queued.
    pub async fn pending_count(&self) -> Result<usize> {
        Ok(self.list_pending().await?.len())
    }

    /// Delete a record's persisted unit.
    ///
    /// Idempotent: removing a record that is already gone is a no-op.
    pub async fn remove(&self, record: &QueuedRecord) -> Result<()> {
        let path = self.record_path(record);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow!("Failed to remove outbox record {}: {}", path.display(), e)),
        }
    }
}

/// Compact a canonical timestamp for filename use:
/// `2025-04-29 09:00:42` → `20250429_090042`.
///
/// A non-canonical (passthrough) timestamp is flattened to its
/// alphanumeric characters so the record still gets a stable, sortable
/// name.
fn compact_stamp(timestamp: &str) -> String {
    match chrono::NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S") {
        Ok(dt) => dt.format("%Y%m%d_%H%M%S").to_string(),
        Err(_) => timestamp
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect(),
    }
}

/// Shape check for record filenames: `<stamp>_<identity>.json` with a
/// plausible leading digit. Everything else is foreign.
fn looks_like_record(name: &str) -> bool {
    name.ends_with(".json") && name.starts_with(|c: char| c.is_ascii_digit())
}

/// Write `content` to `path` atomically: exclusive lock on the
/// destination, full write to a unique temp file in the same directory,
/// fsync, rename over the destination, then fsync the directory.
fn write_file_locked(path: &Path, content: &str) -> Result<()> {
    use std::fs::{File, OpenOptions};
    use std::io::Write;

    let lock_file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(path)?;
    lock_file.lock_exclusive()?;

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let base = path.file_name().and_then(|s| s.to_str()).unwrap_or("record.json");
    let mut counter = 0u32;
    let tmp_path = loop {
        let candidate = dir.join(format!(".{}.tmp-{}-{}", base, std::process::id(), counter));
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(mut tmp) => {
                tmp.write_all(content.as_bytes())?;
                tmp.flush()?;
                let _ = tmp.sync_all();
                break candidate;
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                counter = counter.saturating_add(1);
                continue;
            }
            Err(e) => return Err(anyhow!("Failed to create temp file for atomic write: {}", e)),
        }
    };

    std::fs::rename(&tmp_path, path)?;
    if let Ok(dir_file) = File::open(dir) {
        let _ = dir_file.sync_all();
    }
    drop(lock_file);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_is_lexicographically_chronological() {
        let a = compact_stamp("2025-04-29 09:00:42");
        let b = compact_stamp("2025-04-29 10:00:00");
        let c = compact_stamp("2025-05-01 00:00:00");
        assert_eq!(a, "20250429_090042");
        assert!(a < b && b < c);
    }

    #[test]
    fn passthrough_stamp_is_flattened() {
        assert_eq!(compact_stamp("25/04/29,08:00:42+28"), "25-04-29-08-00-42-28");
    }

    #[test]
    fn foreign_names_rejected() {
        assert!(looks_like_record("20250429_090042_+62811.json"));
        assert!(!looks_like_record("notes.txt"));
        assert!(!looks_like_record(".20250429.json.tmp-1-0"));
        assert!(!looks_like_record("backup.json"));
    }

    #[test]
    fn identity_is_readable_in_filenames() {
        let encoded = utf8_percent_encode("+628115013798", IDENTITY_ENCODE).to_string();
        assert_eq!(encoded, "+628115013798");
        let odd = utf8_percent_encode("smsc/relay", IDENTITY_ENCODE).to_string();
        assert_eq!(odd, "smsc%2Frelay");
    }
}
