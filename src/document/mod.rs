//! Document Module
//!
//! The document side of the index: identities, payloads, the metadata/text
//! store the queue workers write to, and the shingling that turns text into
//! posting hashes.
//!
//! ## Submodules
//! - **`types`**: `DocumentId`, `Document`, search arguments and doctype ranges.
//! - **`shingle`**: Text normalization and window hashing.
//! - **`store`**: Journaled in-process document store.
//! - **`corpus`**: Synthetic documents for TestCorpus jobs.

pub mod corpus;
pub mod shingle;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;
