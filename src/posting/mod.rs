//! Posting Index Module
//!
//! The sharded posting index. Every shard owns the hash buckets its
//! partitioner assigns to it; the client presents all shards as one index.
//!
//! ## Architecture Overview
//! 1. **Fan-out**: The `PostingClient` sends every call to every shard concurrently
//!    and waits for all of them. The first error fails the whole call.
//! 2. **Ownership**: Each `PostingShard` shingles incoming text itself and keeps only
//!    the hashes it owns, so no row ever spans two shards.
//! 3. **Durability**: Shards journal each mutation before acknowledging it and replay
//!    the journal on `Init`.
//!
//! ## Submodules
//! - **`types`**: Posting rows, delta-encoded doctype entries, list and search results.
//! - **`protocol`**: RPC endpoints, request DTOs and the reply envelope.
//! - **`shard`**: The state of one shard and the operations it answers.
//! - **`server`**: Serves one shard over HTTP.
//! - **`client`**: Connections to every shard and the fan-out calls.

pub mod client;
pub mod protocol;
pub mod server;
pub mod shard;
pub mod types;
