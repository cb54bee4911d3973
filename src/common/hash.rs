//! Key hashing and range partitioning
//!
//! - `key_hash` maps a key to a signed 32-bit position, identically in every process
//! - `PartitionRange` is an inclusive interval of that space
//! - `partition` splits the whole space into N contiguous ranges

use serde::{Deserialize, Serialize};
use std::fmt;

const HASH_SEED: i32 = (5381 << 16) + 5381;
const LANE_MIX: i32 = 1_566_083_941;

/// Stable hash of a key, used for partition lookup.
///
/// Two interleaved DJB lanes over the UTF-16 code units of the key, with
/// wrapping 32-bit arithmetic. Unlike `std::hash`, the result never depends
/// on a per-process random seed.
pub fn key_hash(key: &str) -> i32 {
    let units: Vec<u16> = key.encode_utf16().collect();
    let mut h1 = HASH_SEED;
    let mut h2 = HASH_SEED;

    for pair in units.chunks(2) {
        h1 = (h1 << 5).wrapping_add(h1) ^ i32::from(pair[0]);
        if let Some(&next) = pair.get(1) {
            h2 = (h2 << 5).wrapping_add(h2) ^ i32::from(next);
        }
    }

    h1.wrapping_add(h2.wrapping_mul(LANE_MIX))
}

/// Inclusive `[start, end]` interval over the key-hash space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionRange {
    pub start: i32,
    pub end: i32,
}

impl PartitionRange {
    pub fn new(start: i32, end: i32) -> Self {
        debug_assert!(start <= end, "range start {} after end {}", start, end);
        Self { start, end }
    }

    /// The whole key-hash space
    pub fn full() -> Self {
        Self::new(i32::MIN, i32::MAX)
    }

    pub fn contains(&self, hash: i32) -> bool {
        hash >= self.start && hash <= self.end
    }

    /// Does this range own `key`?
    pub fn owns(&self, key: &str) -> bool {
        self.contains(key_hash(key))
    }

    /// Number of hash values covered
    pub fn width(&self) -> u64 {
        (i64::from(self.end) - i64::from(self.start) + 1) as u64
    }
}

impl fmt::Display for PartitionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Split the key-hash space into `count` ordered, contiguous ranges.
///
/// Bounds are computed over the unsigned span `2^32 - 1` and shifted back by
/// `i32::MIN`. The last range absorbs the division remainder and always ends
/// at `i32::MAX`. Returns an empty vector for `count == 0`.
pub fn partition(count: usize) -> Vec<PartitionRange> {
    if count == 0 {
        return Vec::new();
    }

    let span = u64::from(u32::MAX);
    let count_u = count as u64;
    let shift = |offset: u64| (offset as i64 + i64::from(i32::MIN)) as i32;

    let mut ranges = Vec::with_capacity(count);
    for i in 0..count_u - 1 {
        let lower = i * span / count_u;
        let upper = (i + 1) * span / count_u;
        ranges.push(PartitionRange::new(shift(lower), shift(upper) - 1));
    }

    let last_lower = (count_u - 1) * span / count_u;
    ranges.push(PartitionRange::new(shift(last_lower), i32::MAX));
    ranges
}
