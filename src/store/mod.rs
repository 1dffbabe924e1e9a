//! Sharded, WAL-backed storage engine
//!
//! A `Store` owns a fixed array of shards, each behind its own lock, plus
//! one write-ahead log behind a separate lock. Mutations commit in memory
//! under the shard lock first, then append to the WAL under the WAL lock,
//! then the caller responds. Lock ordering is shard lock before WAL lock,
//! never the reverse, and no operation holds two shard locks at once.

pub mod shard;

pub use shard::Shard;

use crate::utils::hash::{fnv1a_64, in_range, shard_index};
use crate::wal::{ReplayStats, SyncPolicy, WalError, WalReader, WalRecord, WalWriter};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Default shard count for a storage node.
pub const DEFAULT_NUM_SHARDS: usize = 16;

/// Storage engine errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("write-ahead log failure: {0}")]
    Wal(#[from] WalError),
}

/// Per-store statistics, served by the node's `/stats` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub num_shards: usize,
    pub total_keys: usize,
    pub keys_per_shard: Vec<usize>,
    pub wal_path: String,
}

/// The storage node's partitioned in-memory map plus its write-ahead log.
pub struct Store {
    shards: Vec<RwLock<Shard>>,
    wal: Mutex<WalWriter>,
    wal_path: PathBuf,
}

impl Store {
    /// Open a store: replay the WAL at `wal_path` (if present) into fresh
    /// shards, then open the log for appending.
    pub fn open<P: AsRef<Path>>(
        num_shards: usize,
        wal_path: P,
        sync_policy: SyncPolicy,
    ) -> Result<(Self, ReplayStats), StoreError> {
        let wal_path = wal_path.as_ref().to_path_buf();

        let (records, stats) = WalReader::new(&wal_path).read_all()?;
        let mut shards: Vec<Shard> = (0..num_shards).map(|_| Shard::default()).collect();
        for record in &records {
            match record {
                WalRecord::Set { key, value } => {
                    shards[shard_index(key, num_shards)].insert(key.clone(), value.clone());
                }
                WalRecord::Del { key } => {
                    shards[shard_index(key, num_shards)].remove(key);
                }
            }
        }

        if stats.records_applied > 0 {
            info!(
                path = %wal_path.display(),
                records = stats.records_applied,
                sets = stats.sets,
                dels = stats.dels,
                truncated = stats.truncated,
                "WAL replay complete"
            );
        }

        let writer = WalWriter::open(&wal_path, sync_policy)?;
        let store = Self {
            shards: shards.into_iter().map(RwLock::new).collect(),
            wal: Mutex::new(writer),
            wal_path,
        };
        Ok((store, stats))
    }

    fn shard_for(&self, key: &str) -> &RwLock<Shard> {
        &self.shards[shard_index(key, self.shards.len())]
    }

    /// Insert or overwrite a key, durably.
    ///
    /// On a WAL append failure the in-memory write is rolled back (unless a
    /// concurrent writer has already superseded it) and the error surfaces
    /// to the caller as a 500.
    pub async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let previous = {
            let mut shard = self.shard_for(key).write().await;
            shard.insert(key.to_string(), value.to_string())
        };

        let logged = {
            let mut wal = self.wal.lock().await;
            wal.append(&WalRecord::Set {
                key: key.to_string(),
                value: value.to_string(),
            })
        };

        if let Err(err) = logged {
            let mut shard = self.shard_for(key).write().await;
            if shard.get(key) == Some(value) {
                match previous {
                    Some(prev) => {
                        shard.insert(key.to_string(), prev);
                    }
                    None => {
                        shard.remove(key);
                    }
                }
            }
            return Err(err.into());
        }

        debug!(key = %key, "saved");
        Ok(())
    }

    /// Remove a key, durably. Succeeds whether or not the key existed.
    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let previous = {
            let mut shard = self.shard_for(key).write().await;
            shard.remove(key)
        };

        let logged = {
            let mut wal = self.wal.lock().await;
            wal.append(&WalRecord::Del {
                key: key.to_string(),
            })
        };

        if let Err(err) = logged {
            if let Some(prev) = previous {
                let mut shard = self.shard_for(key).write().await;
                if shard.get(key).is_none() {
                    shard.insert(key.to_string(), prev);
                }
            }
            return Err(err.into());
        }

        debug!(key = %key, "deleted");
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let shard = self.shard_for(key).read().await;
        shard.get(key).map(str::to_string)
    }

    /// All entries whose placement hash falls in `(start, end]`, wrap-aware.
    ///
    /// Shards are scanned one lock at a time; the result is a per-shard
    /// snapshot, not a globally consistent one.
    pub async fn scan_range(&self, start: u64, end: u64) -> Vec<(String, String)> {
        let mut entries = Vec::new();
        for shard in &self.shards {
            let guard = shard.read().await;
            for (key, value) in guard.entries() {
                if in_range(fnv1a_64(key.as_bytes()), start, end) {
                    entries.push((key.clone(), value.clone()));
                }
            }
        }
        entries
    }

    /// Every entry in the store, used for node evacuation.
    pub async fn scan_all(&self) -> Vec<(String, String)> {
        let mut entries = Vec::new();
        for shard in &self.shards {
            let guard = shard.read().await;
            for (key, value) in guard.entries() {
                entries.push((key.clone(), value.clone()));
            }
        }
        entries
    }

    /// Clear every shard and truncate the WAL. Test and debug use only.
    pub async fn reset(&self) -> Result<(), StoreError> {
        for shard in &self.shards {
            shard.write().await.clear();
        }
        self.wal.lock().await.truncate()?;
        info!("store reset");
        Ok(())
    }

    pub async fn total_keys(&self) -> usize {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.read().await.len();
        }
        total
    }

    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }

    pub fn wal_path(&self) -> &Path {
        &self.wal_path
    }

    pub async fn stats(&self) -> StoreStats {
        let mut keys_per_shard = Vec::with_capacity(self.shards.len());
        for shard in &self.shards {
            keys_per_shard.push(shard.read().await.len());
        }
        StoreStats {
            num_shards: self.shards.len(),
            total_keys: keys_per_shard.iter().sum(),
            keys_per_shard,
            wal_path: self.wal_path.display().to_string(),
        }
    }
}
