//! HTTP API
//!
//! Public routes over the queue, the document store and the posting index.
//! Mutations are only ever queued here; reads go straight to the store or
//! the posting client.
//!
//! ## Submodules
//! - **`router`**: Route table and the server entry point.
//! - **`handlers`**: One handler per route.
//! - **`types`**: Response bodies and the error-to-response mapping.

pub mod handlers;
pub mod router;
pub mod types;
