//! Cluster topology and rebalancing
//!
//! Everything the proxy knows about the cluster lives here:
//! - Node addressing and canonicalization
//! - The consistent hash ring and its migration-task planner
//! - The migration executor that moves data during membership changes
//!
//! The ring itself is pure data with no knowledge of HTTP; the migration
//! executor drives storage nodes through the typed client.

pub mod migration;
pub mod node;
pub mod ring;

pub use migration::{rebalance_add, evacuate, MigrationReport};
pub use node::NodeAddr;
pub use ring::{ConsistentHashRing, MigrationTask, DEFAULT_VIRTUAL_NODES};

/// Result type for cluster operations
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Cluster operation errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClusterError {
    #[error("no storage nodes available")]
    RingEmpty,

    #[error("malformed node address: {address}")]
    MalformedAddress { address: String },

    #[error("node is not a ring member: {address}")]
    NotAMember { address: String },
}
