use serde::{Deserialize, Serialize};

/// Maps hash buckets onto shards.
///
/// Routing is not key-based: clients send every call to every shard, and each
/// shard uses its partitioner to keep only the buckets it owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardPartitioner {
    index: usize,
    count: usize,
}

impl ShardPartitioner {
    /// `count` is clamped to at least one shard.
    pub fn new(index: usize, count: usize) -> Self {
        let count = count.max(1);
        Self {
            index: index % count,
            count,
        }
    }

    /// Shard index that owns `hash`.
    pub fn owner_of(&self, hash: u64) -> usize {
        (hash % self.count as u64) as usize
    }

    pub fn owns(&self, hash: u64) -> bool {
        self.owner_of(hash) == self.index
    }

    /// Keeps the hashes owned by this shard, preserving order.
    pub fn owned(&self, hashes: &[u64]) -> Vec<u64> {
        hashes.iter().copied().filter(|h| self.owns(*h)).collect()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn count(&self) -> usize {
        self.count
    }
}
