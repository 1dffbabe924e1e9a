//! Consistent hash ring
//!
//! Maps 64-bit FNV-1a positions to owning nodes and plans the minimal data
//! movement when membership changes. Pure in-memory data: no I/O, no locks;
//! the proxy serializes mutations against lookups around it.

use crate::cluster::{ClusterError, ClusterResult, NodeAddr};
use crate::utils::hash::fnv1a_64;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound::{Excluded, Unbounded};
use tracing::info;

/// Virtual nodes per physical node unless configured otherwise.
pub const DEFAULT_VIRTUAL_NODES: u32 = 100;

/// One unit of data movement planned when a node joins.
///
/// Keys whose placement hash lies in `(start_hash, end_hash]` (wrap-aware)
/// move from `source` to the joining node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationTask {
    pub source: NodeAddr,
    pub start_hash: u64,
    pub end_hash: u64,
}

/// Consistent hash ring for distributing keys across nodes
#[derive(Debug, Clone)]
pub struct ConsistentHashRing {
    /// The ring mapping hash positions to node addresses
    ring: BTreeMap<u64, NodeAddr>,
    /// Virtual nodes per physical node
    virtual_nodes: u32,
}

impl ConsistentHashRing {
    pub fn new(virtual_nodes: u32) -> Self {
        Self {
            ring: BTreeMap::new(),
            virtual_nodes,
        }
    }

    /// Insert a node's virtual nodes at `fnv1a(addr#0) .. fnv1a(addr#V-1)`.
    ///
    /// Adding an address already present rewrites the same positions, so the
    /// call is idempotent; the caller guards against re-running migration.
    pub fn add_node(&mut self, addr: &NodeAddr) {
        for i in 0..self.virtual_nodes {
            let position = fnv1a_64(addr.vnode_key(i).as_bytes());
            self.ring.insert(position, addr.clone());
        }
        info!(
            node = %addr,
            virtual_nodes = self.virtual_nodes,
            "added node to ring"
        );
    }

    /// Remove every ring entry owned by `addr`.
    pub fn remove_node(&mut self, addr: &NodeAddr) {
        self.ring.retain(|_, owner| owner != addr);
        info!(node = %addr, "removed node from ring");
    }

    /// Owner of a key: the node at the smallest position >= the key's hash,
    /// wrapping to the smallest position overall.
    pub fn node_for_key(&self, key: &str) -> ClusterResult<&NodeAddr> {
        let hash = fnv1a_64(key.as_bytes());
        match self.ring.range(hash..).next() {
            Some((_, owner)) => Ok(owner),
            None => match self.ring.iter().next() {
                Some((_, owner)) => Ok(owner),
                None => Err(ClusterError::RingEmpty),
            },
        }
    }

    /// Plan the ranges a freshly inserted node takes over.
    ///
    /// For each virtual node of `new_node` at position `e` the range is
    /// `(predecessor(e), e]`, wrap-aware. Its previous owner is the owner of
    /// the first successor position not belonging to `new_node`: scanning
    /// must skip the new node's own positions, otherwise arcs in front of a
    /// run of adjacent new-node positions would never be migrated and their
    /// keys would be stranded on the old owner. When every position belongs
    /// to `new_node` there is nothing to steal and no tasks are produced.
    pub fn rebalancing_tasks(&self, new_node: &NodeAddr) -> Vec<MigrationTask> {
        let mut tasks = Vec::new();
        if self.ring.is_empty() {
            return tasks;
        }

        for (&position, owner) in &self.ring {
            if owner != new_node {
                continue;
            }

            let end_hash = position;
            let start_hash = self
                .ring
                .range(..position)
                .next_back()
                .or_else(|| self.ring.iter().next_back())
                .map(|(&hash, _)| hash)
                .unwrap_or(end_hash);

            let source = self
                .ring
                .range((Excluded(position), Unbounded))
                .chain(self.ring.range(..=position))
                .find(|(_, owner)| *owner != new_node)
                .map(|(_, owner)| owner);

            let source = match source {
                Some(source) => source,
                None => continue,
            };

            tasks.push(MigrationTask {
                source: source.clone(),
                start_hash,
                end_hash,
            });
        }

        tasks
    }

    /// Whether `addr` owns at least one ring position.
    pub fn contains(&self, addr: &NodeAddr) -> bool {
        self.ring.values().any(|owner| owner == addr)
    }

    /// Number of ring positions owned by `addr`.
    pub fn vnode_count(&self, addr: &NodeAddr) -> usize {
        self.ring.values().filter(|owner| *owner == addr).count()
    }

    /// The distinct member nodes, in address order.
    pub fn member_nodes(&self) -> Vec<NodeAddr> {
        let members: BTreeSet<&NodeAddr> = self.ring.values().collect();
        members.into_iter().cloned().collect()
    }

    /// Total ring positions (members x virtual nodes).
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn virtual_nodes(&self) -> u32 {
        self.virtual_nodes
    }
}

impl Default for ConsistentHashRing {
    fn default() -> Self {
        Self::new(DEFAULT_VIRTUAL_NODES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::hash::in_range;

    fn addr(s: &str) -> NodeAddr {
        NodeAddr::parse(s).unwrap()
    }

    #[test]
    fn test_add_node_inserts_virtual_nodes() {
        let mut ring = ConsistentHashRing::new(100);
        ring.add_node(&addr("127.0.0.1:8081"));
        assert_eq!(ring.len(), 100);
        assert_eq!(ring.vnode_count(&addr("127.0.0.1:8081")), 100);
    }

    #[test]
    fn test_add_node_is_idempotent() {
        let mut ring = ConsistentHashRing::new(100);
        let node = addr("127.0.0.1:8081");
        ring.add_node(&node);
        ring.add_node(&node);
        assert_eq!(ring.len(), 100);
        assert_eq!(ring.vnode_count(&node), 100);
    }

    #[test]
    fn test_remove_node_clears_every_entry() {
        let mut ring = ConsistentHashRing::new(100);
        let a = addr("127.0.0.1:8081");
        let b = addr("127.0.0.1:8082");
        ring.add_node(&a);
        ring.add_node(&b);
        assert_eq!(ring.len(), 200);

        ring.remove_node(&b);
        assert_eq!(ring.len(), 100);
        assert!(!ring.contains(&b));
        assert!(ring.contains(&a));
    }

    #[test]
    fn test_lookup_on_empty_ring_fails() {
        let ring = ConsistentHashRing::new(100);
        assert!(matches!(
            ring.node_for_key("anything"),
            Err(ClusterError::RingEmpty)
        ));
    }

    #[test]
    fn test_lookup_single_node_owns_everything() {
        let mut ring = ConsistentHashRing::new(100);
        let node = addr("127.0.0.1:8081");
        ring.add_node(&node);
        for i in 0..50 {
            let key = format!("key_{}", i);
            assert_eq!(ring.node_for_key(&key).unwrap(), &node);
        }
    }

    #[test]
    fn test_lookup_deterministic_across_insertion_order() {
        let a = addr("127.0.0.1:8081");
        let b = addr("127.0.0.1:8082");
        let c = addr("127.0.0.1:8083");

        let mut forward = ConsistentHashRing::new(100);
        forward.add_node(&a);
        forward.add_node(&b);
        forward.add_node(&c);

        let mut backward = ConsistentHashRing::new(100);
        backward.add_node(&c);
        backward.add_node(&b);
        backward.add_node(&a);

        for i in 0..200 {
            let key = format!("user_{}", i);
            assert_eq!(
                forward.node_for_key(&key).unwrap(),
                backward.node_for_key(&key).unwrap()
            );
        }
    }

    #[test]
    fn test_keys_spread_across_nodes() {
        let mut ring = ConsistentHashRing::new(100);
        let nodes = [
            addr("127.0.0.1:8081"),
            addr("127.0.0.1:8082"),
            addr("127.0.0.1:8083"),
        ];
        for node in &nodes {
            ring.add_node(node);
        }

        let mut counts = std::collections::HashMap::new();
        for i in 0..3000 {
            let key = format!("key_{}", i);
            let owner = ring.node_for_key(&key).unwrap().clone();
            *counts.entry(owner).or_insert(0usize) += 1;
        }

        assert_eq!(counts.len(), 3);
        for count in counts.values() {
            // 100 vnodes leaves the spread lumpy but nobody starves
            assert!(*count > 100, "count {} too low", count);
        }
    }

    #[test]
    fn test_tasks_empty_ring_produces_none() {
        let ring = ConsistentHashRing::new(100);
        assert!(ring
            .rebalancing_tasks(&addr("127.0.0.1:8081"))
            .is_empty());
    }

    #[test]
    fn test_tasks_none_for_sole_member() {
        let mut ring = ConsistentHashRing::new(100);
        let node = addr("127.0.0.1:8081");
        ring.add_node(&node);
        // Every position already belongs to the node; nothing to steal.
        assert!(ring.rebalancing_tasks(&node).is_empty());
    }

    #[test]
    fn test_tasks_steal_only_from_existing_member() {
        let mut ring = ConsistentHashRing::new(100);
        let a = addr("127.0.0.1:8081");
        let b = addr("127.0.0.1:8082");
        ring.add_node(&a);
        ring.add_node(&b);

        let tasks = ring.rebalancing_tasks(&b);
        // One task per virtual node of b, all sourced from the only other
        // member.
        assert_eq!(tasks.len(), 100);
        for task in &tasks {
            assert_eq!(task.source, a);
        }
    }

    #[test]
    fn test_task_ranges_route_to_new_node() {
        let mut ring = ConsistentHashRing::new(100);
        let a = addr("127.0.0.1:8081");
        let b = addr("127.0.0.1:8082");
        ring.add_node(&a);
        ring.add_node(&b);

        let tasks = ring.rebalancing_tasks(&b);

        // Every key whose hash falls inside a task range is now owned by the
        // new node; every key that changed owner is covered by some task.
        for i in 0..500 {
            let key = format!("key_{}", i);
            let hash = fnv1a_64(key.as_bytes());
            let owner = ring.node_for_key(&key).unwrap();
            let covered = tasks
                .iter()
                .any(|t| in_range(hash, t.start_hash, t.end_hash));
            if covered {
                assert_eq!(owner, &b, "key {} in a migrating range", key);
            } else {
                assert_eq!(owner, &a, "key {} outside every range", key);
            }
        }
    }

    #[test]
    fn test_member_nodes_sorted_distinct() {
        let mut ring = ConsistentHashRing::new(10);
        ring.add_node(&addr("127.0.0.1:8082"));
        ring.add_node(&addr("127.0.0.1:8081"));
        let members = ring.member_nodes();
        assert_eq!(
            members,
            vec![addr("127.0.0.1:8081"), addr("127.0.0.1:8082")]
        );
    }
}
