//! Utility functions and helpers

pub mod hash;

pub use hash::{fnv1a_64, in_range, shard_index};
