//! Storage Module
//!
//! Local building blocks shared by the shards, the queue and the document store.
//!
//! ## Core Concepts
//! - **Ownership**: `ShardPartitioner` decides which shard owns a hash bucket.
//!   Every shard receives every call and keeps only what it owns.
//! - **Durability**: `Journal` is an append-only file of length-prefixed bincode
//!   records. Components replay it on startup to rebuild their in-memory state.

pub mod journal;
pub mod partitioner;

#[cfg(test)]
mod tests;
