//! WAL reader implementation for recovery

use crate::wal::entry::WalRecord;
use crate::wal::writer::WalError;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Recovery statistics
#[derive(Debug, Default, Clone)]
pub struct ReplayStats {
    pub records_applied: usize,
    pub sets: usize,
    pub dels: usize,
    /// True when replay stopped early at a malformed record.
    pub truncated: bool,
}

/// Reads a write-ahead log back into records for replay.
pub struct WalReader {
    path: PathBuf,
}

impl WalReader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Read every record up to the first malformed line.
    ///
    /// A missing file is an empty log; a malformed record terminates replay
    /// at that point without failing recovery (everything before it still
    /// applies).
    pub fn read_all(&self) -> Result<(Vec<WalRecord>, ReplayStats), WalError> {
        let mut stats = ReplayStats::default();
        let mut records = Vec::new();

        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok((records, stats));
            }
            Err(err) => return Err(err.into()),
        };

        info!(path = %self.path.display(), "restoring from WAL");

        let reader = BufReader::new(file);
        for line in reader.lines() {
            let line = line?;
            match WalRecord::parse(&line) {
                Ok(record) => {
                    match record {
                        WalRecord::Set { .. } => stats.sets += 1,
                        WalRecord::Del { .. } => stats.dels += 1,
                    }
                    stats.records_applied += 1;
                    records.push(record);
                }
                Err(_) => {
                    warn!(
                        path = %self.path.display(),
                        record = stats.records_applied,
                        line = %line,
                        "malformed WAL record, stopping replay here"
                    );
                    stats.truncated = true;
                    break;
                }
            }
        }

        Ok((records, stats))
    }
}
