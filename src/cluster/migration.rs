//! Data migration during membership changes
//!
//! The proxy drives both procedures through the storage client:
//!
//! - **Add**: for each planned range, scan the source, copy each entry to
//!   the new node, then delete it from the source. A failed copy skips the
//!   delete so the key survives on the source.
//! - **Remove (evacuation)**: the victim's contents are snapshotted before
//!   the ring drops it, then every entry is re-homed to its new owner with
//!   the same copy-then-delete discipline.
//!
//! Failures are logged and counted, never retried; the caller surfaces the
//! report to the administrator.

use crate::client::StorageClient;
use crate::cluster::ring::{ConsistentHashRing, MigrationTask};
use crate::cluster::NodeAddr;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Outcome counters for one admin operation's migration loop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Entries examined by the migration loop.
    pub keys_scanned: u64,
    pub keys_moved: u64,
    pub copy_failures: u64,
    pub delete_failures: u64,
}

impl MigrationReport {
    pub fn clean(&self) -> bool {
        self.copy_failures == 0 && self.delete_failures == 0
    }
}

/// Execute the add-rebalance: pull each planned range off its source and
/// install it on the joining node.
pub async fn rebalance_add(
    client: &StorageClient,
    new_node: &NodeAddr,
    tasks: &[MigrationTask],
) -> MigrationReport {
    let mut report = MigrationReport::default();
    info!(node = %new_node, tasks = tasks.len(), "rebalancing for new node");

    for task in tasks {
        let entries = match client
            .range(&task.source, task.start_hash, task.end_hash)
            .await
        {
            Ok(entries) => entries,
            Err(err) => {
                warn!(
                    source = %task.source,
                    start = task.start_hash,
                    end = task.end_hash,
                    error = %err,
                    "range scan failed, skipping task"
                );
                report.copy_failures += 1;
                continue;
            }
        };

        for (key, value) in entries {
            report.keys_scanned += 1;
            match client.put(new_node, &key, &value).await {
                Ok(()) => {
                    report.keys_moved += 1;
                    if let Err(err) = client.del(&task.source, &key).await {
                        warn!(
                            key = %key,
                            source = %task.source,
                            error = %err,
                            "source delete failed after copy, stale copy remains"
                        );
                        report.delete_failures += 1;
                    }
                }
                Err(err) => {
                    warn!(
                        key = %key,
                        dest = %new_node,
                        error = %err,
                        "copy failed, key stays on source"
                    );
                    report.copy_failures += 1;
                }
            }
        }
    }

    info!(
        node = %new_node,
        moved = report.keys_moved,
        copy_failures = report.copy_failures,
        delete_failures = report.delete_failures,
        "rebalancing complete"
    );
    report
}

/// Re-home a departed node's snapshotted entries onto the remaining members.
///
/// The ring has already dropped the victim, so each lookup lands on a
/// surviving node; the victim may still be reachable for the source deletes.
pub async fn evacuate(
    client: &StorageClient,
    ring: &RwLock<ConsistentHashRing>,
    victim: &NodeAddr,
    entries: Vec<(String, String)>,
) -> MigrationReport {
    let mut report = MigrationReport::default();
    info!(node = %victim, entries = entries.len(), "evacuating node");

    for (key, value) in entries {
        report.keys_scanned += 1;

        let target = {
            let ring = ring.read().await;
            match ring.node_for_key(&key) {
                Ok(target) => target.clone(),
                Err(err) => {
                    warn!(key = %key, error = %err, "no surviving owner for key");
                    report.copy_failures += 1;
                    continue;
                }
            }
        };

        match client.put(&target, &key, &value).await {
            Ok(()) => {
                report.keys_moved += 1;
                if let Err(err) = client.del(victim, &key).await {
                    warn!(
                        key = %key,
                        victim = %victim,
                        error = %err,
                        "victim delete failed after copy"
                    );
                    report.delete_failures += 1;
                }
            }
            Err(err) => {
                warn!(
                    key = %key,
                    target = %target,
                    error = %err,
                    "copy failed, key stranded on victim"
                );
                report.copy_failures += 1;
            }
        }
    }

    info!(
        node = %victim,
        moved = report.keys_moved,
        copy_failures = report.copy_failures,
        delete_failures = report.delete_failures,
        "evacuation complete"
    );
    report
}
