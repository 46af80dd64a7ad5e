//! Search Module
//!
//! Turns the per-shard candidates of a posting `Search` fan-out into one ranked
//! result list.
//!
//! ## Overview
//! Every shard reports how many of the query's hashes it owns and how many of
//! them each candidate document contains. The merge sums both across shards,
//! scores each candidate with a [`engine::Ranker`] and keeps the best `limit`
//! above the query's threshold.
//!
//! ## Submodules
//! - **`engine`**: The merge, the ranking trait and the end-to-end search call.
//! - **`types`**: Ranked results as returned by the API.

pub mod engine;
pub mod types;
