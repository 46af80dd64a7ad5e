//! Sharded Posting Index Library
//!
//! This library crate defines the core modules of the posting cluster.
//! It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! - **`posting`**: The sharded posting index. Shard servers own hash buckets;
//!   the posting client fans every call out to all of them.
//! - **`queue`**: The durable mutation queue and its worker pool. Every document
//!   change goes through here.
//! - **`search`**: Merges per-shard candidates into a ranked result list.
//! - **`document`**: Document identity, doctype ranges, shingling, the
//!   synthetic test corpus and the document store.
//! - **`storage`**: Journals and hash partitioning shared by the components above.
//! - **`api`**: The HTTP API.
//! - **`cluster`**: Single-process bootstrap of all of the above.

pub mod api;
pub mod cluster;
pub mod config;
pub mod context;
pub mod document;
pub mod error;
pub mod posting;
pub mod queue;
pub mod search;
pub mod storage;

/// Current system time in milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
