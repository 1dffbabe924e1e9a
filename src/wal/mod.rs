//! Write-Ahead Log implementation for durability
//!
//! The log is a line-oriented UTF-8 text file, one record per mutation:
//! `SET <key> <value>` or `DEL <key>`. Replaying the file from the top
//! reconstructs the node's in-memory state exactly.

pub mod entry;
pub mod reader;
pub mod writer;

pub use entry::WalRecord;
pub use reader::{ReplayStats, WalReader};
pub use writer::{SyncPolicy, WalError, WalWriter};
