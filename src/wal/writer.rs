//! WAL writer implementation

use crate::wal::entry::WalRecord;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Sync policy for WAL durability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPolicy {
    /// Leave flushing to the buffer (fastest, least durable)
    None,
    /// Flush to the OS after each record (balanced, the default)
    Flush,
    /// fsync after each record (slowest, most durable)
    Sync,
}

impl SyncPolicy {
    /// Parse a policy name as it appears in config files.
    pub fn parse(name: &str) -> Result<Self, WalError> {
        match name {
            "none" => Ok(SyncPolicy::None),
            "flush" => Ok(SyncPolicy::Flush),
            "sync" => Ok(SyncPolicy::Sync),
            _ => Err(WalError::InvalidSyncPolicy {
                policy: name.to_string(),
            }),
        }
    }
}

impl Default for SyncPolicy {
    fn default() -> Self {
        SyncPolicy::Flush
    }
}

/// WAL-specific errors
#[derive(Debug, thiserror::Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed WAL record: {line:?}")]
    MalformedRecord { line: String },
    #[error("invalid sync policy: {policy}")]
    InvalidSyncPolicy { policy: String },
}

/// Append-only writer for a node's write-ahead log.
///
/// The caller serializes access (the store holds this behind its WAL lock);
/// the writer itself is plain buffered file I/O.
pub struct WalWriter {
    file: BufWriter<File>,
    path: PathBuf,
    sync_policy: SyncPolicy,
}

impl WalWriter {
    /// Open the log at `path` for appending, creating it (and its parent
    /// directory) if missing.
    pub fn open<P: AsRef<Path>>(path: P, sync_policy: SyncPolicy) -> Result<Self, WalError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
                info!(dir = %parent.display(), "created WAL directory");
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            file: BufWriter::new(file),
            path,
            sync_policy,
        })
    }

    /// Append one record, honoring the configured sync policy.
    pub fn append(&mut self, record: &WalRecord) -> Result<(), WalError> {
        self.file.write_all(record.encode().as_bytes())?;
        match self.sync_policy {
            SyncPolicy::None => {}
            SyncPolicy::Flush => self.file.flush()?,
            SyncPolicy::Sync => {
                self.file.flush()?;
                self.file.get_ref().sync_all()?;
            }
        }
        Ok(())
    }

    /// Discard the log and reopen it empty, ready for appends.
    pub fn truncate(&mut self) -> Result<(), WalError> {
        // Pending buffered bytes are being discarded with the file.
        let _ = self.file.flush();

        let truncated = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        drop(truncated);

        let file = OpenOptions::new().append(true).open(&self.path)?;
        self.file = BufWriter::new(file);

        info!(path = %self.path.display(), "WAL truncated");
        Ok(())
    }

    /// Path of the underlying log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_append_writes_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wal_7001.log");

        let mut writer = WalWriter::open(&path, SyncPolicy::Flush).unwrap();
        writer
            .append(&WalRecord::Set {
                key: "foo".to_string(),
                value: "bar".to_string(),
            })
            .unwrap();
        writer
            .append(&WalRecord::Del {
                key: "foo".to_string(),
            })
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "SET foo bar\nDEL foo\n");
    }

    #[test]
    fn test_append_after_reopen_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wal_7002.log");

        {
            let mut writer = WalWriter::open(&path, SyncPolicy::Flush).unwrap();
            writer
                .append(&WalRecord::Set {
                    key: "a".to_string(),
                    value: "1".to_string(),
                })
                .unwrap();
        }
        {
            let mut writer = WalWriter::open(&path, SyncPolicy::Flush).unwrap();
            writer
                .append(&WalRecord::Set {
                    key: "b".to_string(),
                    value: "2".to_string(),
                })
                .unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "SET a 1\nSET b 2\n");
    }

    #[test]
    fn test_truncate_empties_log_and_keeps_appending() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wal_7003.log");

        let mut writer = WalWriter::open(&path, SyncPolicy::Flush).unwrap();
        writer
            .append(&WalRecord::Set {
                key: "a".to_string(),
                value: "1".to_string(),
            })
            .unwrap();
        writer.truncate().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");

        writer
            .append(&WalRecord::Set {
                key: "b".to_string(),
                value: "2".to_string(),
            })
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "SET b 2\n");
    }

    #[test]
    fn test_sync_policy_parse() {
        assert_eq!(SyncPolicy::parse("none").unwrap(), SyncPolicy::None);
        assert_eq!(SyncPolicy::parse("flush").unwrap(), SyncPolicy::Flush);
        assert_eq!(SyncPolicy::parse("sync").unwrap(), SyncPolicy::Sync);
        assert!(SyncPolicy::parse("always").is_err());
    }
}
