//! Queue Module
//!
//! Asynchronous, durable execution of document mutations.
//!
//! ## Architecture Overview
//! The API only ever creates items; workers do the work:
//! 1. **Submission**: `Queue::new_item` validates the request, reads its payload
//!    and stores the item as Queued.
//! 2. **Claiming**: A worker moves the oldest claimable item to InProgress and
//!    takes a lease on it.
//! 3. **Leasing**: While the action runs its lease is renewed. If the worker dies
//!    the lease runs out and another worker may claim the item again.
//! 4. **Completion**: The worker records Completed or Failed. Failed items are
//!    not retried.
//!
//! ## Submodules
//! - **`types`**: Items, actions, statuses, filters and stats.
//! - **`queue`**: Item storage, the claim/lease/complete transitions and the journal.
//! - **`actions`**: One handler per action.
//! - **`executor`**: The worker pool.

pub mod actions;
pub mod executor;
pub mod queue;
pub mod types;

#[cfg(test)]
mod tests;
