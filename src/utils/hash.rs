//! Hash functions for key placement
//!
//! Two hash functions live here and they are not interchangeable. `fnv1a_64`
//! is the cluster-wide placement hash: the proxy's ring positions and a
//! storage node's `/range` filter must agree byte-for-byte, so both call this
//! exact function. `shard_key` only spreads keys across a node's internal
//! shard locks and is never visible outside the process.

use ahash::AHasher;
use std::hash::{Hash, Hasher};

/// FNV-1a offset basis (64-bit).
pub const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;

/// FNV-1a prime (64-bit).
pub const FNV_PRIME: u64 = 0x100000001b3;

/// 64-bit FNV-1a over a byte slice.
///
/// This is the single placement hash shared by the ring and the storage
/// nodes' range scans.
pub fn fnv1a_64(data: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in data {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Hash a key for shard distribution within a storage node.
pub fn shard_key(key: &[u8]) -> u64 {
    let mut hasher = AHasher::default();
    key.hash(&mut hasher);
    hasher.finish()
}

/// Shard slot for a key, given the node's shard count.
pub fn shard_index(key: &str, num_shards: usize) -> usize {
    (shard_key(key.as_bytes()) as usize) % num_shards
}

/// Membership test for the hash interval `(start, end]` on the 64-bit
/// circle, wrap-around aware. `start == end` denotes the full circle.
pub fn in_range(hash: u64, start: u64, end: u64) -> bool {
    if start < end {
        hash > start && hash <= end
    } else {
        hash > start || hash <= end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv1a_known_vectors() {
        assert_eq!(fnv1a_64(b""), 0xcbf29ce484222325);
        assert_eq!(fnv1a_64(b"a"), 0xaf63dc4c8601ec8c);
        assert_eq!(fnv1a_64(b"foo"), 0xdcb27518fed9d577);
        assert_eq!(fnv1a_64(b"foobar"), 0x85944171f73967e8);
        assert_eq!(fnv1a_64(b"127.0.0.1:8081#0"), 0xa6378fa9dcd6feec);
    }

    #[test]
    fn test_shard_index_stable_within_process() {
        let a = shard_index("some_key", 16);
        let b = shard_index("some_key", 16);
        assert_eq!(a, b);
        assert!(a < 16);
    }

    #[test]
    fn test_in_range_plain_interval() {
        assert!(in_range(5, 1, 10));
        assert!(in_range(10, 1, 10)); // end is inclusive
        assert!(!in_range(1, 1, 10)); // start is exclusive
        assert!(!in_range(11, 1, 10));
    }

    #[test]
    fn test_in_range_wrap_around() {
        // (u64::MAX - 10, 10] wraps past zero
        let start = u64::MAX - 10;
        assert!(in_range(u64::MAX, start, 10));
        assert!(in_range(0, start, 10));
        assert!(in_range(10, start, 10));
        assert!(!in_range(11, start, 10));
        assert!(!in_range(start, start, 10));
    }

    #[test]
    fn test_in_range_full_circle() {
        assert!(in_range(0, 42, 42));
        assert!(in_range(42, 42, 42));
        assert!(in_range(u64::MAX, 42, 42));
    }
}
