//! Durable Mutation Queue
//!
//! Stores queue items and moves them through their lifecycle. Workers claim
//! items with an atomic check-and-set on the item's `DashMap` entry, hold a
//! lease while they run, and record exactly one terminal status.
//!
//! ## Responsibilities
//! - **Validation**: Rejecting malformed items before anything is stored.
//! - **Ordering**: Handing out claimable items oldest first.
//! - **Leasing**: Letting an item whose worker stopped renewing be claimed again.
//! - **Durability**: Journaling every state change and replaying it on open.

use super::types::*;
use crate::document::types::{DocumentId, parse_ranges};
use crate::error::{ClusterError, Result};
use crate::now_ms;
use crate::storage::journal::Journal;

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Largest payload accepted by `new_item`.
pub const MAX_PAYLOAD_BYTES: u64 = 8 * 1024 * 1024;

pub struct Queue {
    items: DashMap<QueueItemId, QueueItem>,
    /// Non-terminal items by sequence. Terminal items leave it for good.
    pending: Mutex<BTreeMap<u64, QueueItemId>>,
    next_sequence: AtomicU64,
    lease: Duration,
    /// Every state change, as a full item snapshot; the last one per id wins.
    journal: Option<Journal<QueueItem>>,
}

impl Queue {
    pub fn in_memory(lease: Duration) -> Self {
        Self {
            items: DashMap::new(),
            pending: Mutex::new(BTreeMap::new()),
            next_sequence: AtomicU64::new(1),
            lease,
            journal: None,
        }
    }

    /// Opens the queue, replaying and compacting the journal at `path` when
    /// one is given. Items that were in progress at shutdown become claimable
    /// again once their lease runs out.
    pub fn open(path: Option<&Path>, lease: Duration) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::in_memory(lease));
        };

        let (journal, records) = Journal::<QueueItem>::open(path)?;
        let mut queue = Self::in_memory(lease);

        let replayed = records.len();
        let mut last_sequence = 0;
        for item in records {
            last_sequence = last_sequence.max(item.sequence);
            if item.status.is_terminal() {
                queue.pending.get_mut().remove(&item.sequence);
            } else {
                queue.pending.get_mut().insert(item.sequence, item.id.clone());
            }
            queue.items.insert(item.id.clone(), item);
        }
        queue.next_sequence = AtomicU64::new(last_sequence + 1);

        let live = queue.sorted_items();
        journal.rewrite(&live)?;
        queue.journal = Some(journal);

        tracing::info!(
            "Queue recovered {} items from {} journal records",
            live.len(),
            replayed
        );
        Ok(queue)
    }

    #[cfg(test)]
    pub(crate) fn attach_journal(&mut self, journal: Journal<QueueItem>) {
        self.journal = Some(journal);
    }

    fn record(&self, item: &QueueItem) -> Result<()> {
        if let Some(journal) = &self.journal {
            journal.append(item)?;
        }
        Ok(())
    }

    fn sorted_items(&self) -> Vec<QueueItem> {
        let mut items: Vec<QueueItem> = self.items.iter().map(|e| e.value().clone()).collect();
        items.sort_by_key(|item| item.sequence);
        items
    }

    fn lease_ms(&self) -> u64 {
        self.lease.as_millis() as u64
    }

    /// Validates and stores a new item with status Queued.
    ///
    /// The payload is read to the end before the item is stored. Nothing is
    /// executed here; workers pick the item up later.
    pub async fn new_item<R>(
        &self,
        action: Action,
        source: Option<DocumentId>,
        target: Option<DocumentId>,
        association_source: &str,
        association_target: &str,
        payload: R,
    ) -> Result<QueueItem>
    where
        R: AsyncRead + Unpin,
    {
        if action.needs_target() && target.is_none() {
            return Err(ClusterError::Validation(format!(
                "{} needs a target document",
                action
            )));
        }
        if action == Action::AssociateDocument {
            parse_ranges(association_source)?;
            parse_ranges(association_target)?;
        }

        let mut bytes = Vec::new();
        payload
            .take(MAX_PAYLOAD_BYTES + 1)
            .read_to_end(&mut bytes)
            .await?;
        if bytes.len() as u64 > MAX_PAYLOAD_BYTES {
            return Err(ClusterError::Validation(format!(
                "payload larger than {} bytes",
                MAX_PAYLOAD_BYTES
            )));
        }

        let item = QueueItem {
            id: QueueItemId::new(),
            sequence: self.next_sequence.fetch_add(1, Ordering::SeqCst),
            action,
            source,
            target,
            association_source: association_source.to_string(),
            association_target: association_target.to_string(),
            payload: bytes,
            status: QueueStatus::Queued,
            error: None,
            location: None,
            created_at: now_ms(),
            claimed_at: None,
            lease_expires: None,
            completed_at: None,
        };

        self.record(&item)?;
        self.items.insert(item.id.clone(), item.clone());
        self.pending.lock().insert(item.sequence, item.id.clone());

        tracing::debug!("Queued {} item {}", item.action, item.id);
        Ok(item)
    }

    /// Ids of claimable items, oldest first.
    pub fn claimable(&self) -> Vec<QueueItemId> {
        let pending: Vec<QueueItemId> = self.pending.lock().values().cloned().collect();
        let now = now_ms();
        pending
            .into_iter()
            .filter(|id| {
                self.items
                    .get(id)
                    .is_some_and(|entry| entry.value().is_claimable(now))
            })
            .collect()
    }

    /// Atomically moves a claimable item to InProgress and starts its lease.
    ///
    /// Returns `None` if another worker got there first.
    pub fn try_claim(&self, id: &QueueItemId) -> Result<Option<QueueItem>> {
        let Some(mut entry) = self.items.get_mut(id) else {
            return Ok(None);
        };

        let now = now_ms();
        if !entry.is_claimable(now) {
            return Ok(None);
        }

        if entry.status == QueueStatus::InProgress {
            tracing::warn!("Reclaiming item {} after its lease expired", id);
        }

        let mut claimed = entry.clone();
        claimed.status = QueueStatus::InProgress;
        claimed.claimed_at = Some(now);
        claimed.lease_expires = Some(now + self.lease_ms());
        self.record(&claimed)?;
        *entry = claimed.clone();

        tracing::debug!("Claimed item {}", id);
        Ok(Some(claimed))
    }

    /// Claims the oldest claimable item, if any.
    pub fn claim_next(&self) -> Result<Option<QueueItem>> {
        for id in self.claimable() {
            if let Some(item) = self.try_claim(&id)? {
                return Ok(Some(item));
            }
        }
        Ok(None)
    }

    /// Pushes the lease of an in-progress item forward.
    pub fn renew_lease(&self, id: &QueueItemId) -> Result<()> {
        let mut entry = self
            .items
            .get_mut(id)
            .ok_or_else(|| ClusterError::NotFound(format!("queue item {}", id)))?;

        if entry.status != QueueStatus::InProgress {
            return Err(ClusterError::InvalidTransition {
                id: id.to_string(),
                from: entry.status.to_string(),
                to: QueueStatus::InProgress.to_string(),
            });
        }

        let mut renewed = entry.clone();
        renewed.lease_expires = Some(now_ms() + self.lease_ms());
        self.record(&renewed)?;
        *entry = renewed;
        tracing::trace!("Renewed lease for item {}", id);
        Ok(())
    }

    /// Records the terminal status of an in-progress item.
    ///
    /// `Ok(location)` completes it, `Err` fails it with the error text.
    /// Terminal items never change again.
    pub fn complete(&self, id: &QueueItemId, outcome: Result<Option<String>>) -> Result<QueueItem> {
        let mut entry = self
            .items
            .get_mut(id)
            .ok_or_else(|| ClusterError::NotFound(format!("queue item {}", id)))?;

        let to = if outcome.is_ok() {
            QueueStatus::Completed
        } else {
            QueueStatus::Failed
        };
        if entry.status != QueueStatus::InProgress {
            return Err(ClusterError::InvalidTransition {
                id: id.to_string(),
                from: entry.status.to_string(),
                to: to.to_string(),
            });
        }

        let mut done = entry.clone();
        let failure = match outcome {
            Ok(location) => {
                done.location = location;
                None
            }
            Err(e) => {
                done.error = Some(e.to_string());
                Some(ClusterError::QueueItemFailure {
                    id: id.to_string(),
                    error: e.to_string(),
                })
            }
        };
        done.status = to;
        done.lease_expires = None;
        done.completed_at = Some(now_ms());

        // Memory only turns terminal once the journal has it.
        self.record(&done)?;
        *entry = done.clone();
        drop(entry);
        self.pending.lock().remove(&done.sequence);

        match failure {
            Some(failure) => tracing::error!("{}", failure),
            None => tracing::info!("Item {} ({}) completed", id, done.action),
        }
        Ok(done)
    }

    pub fn get(&self, id: &QueueItemId) -> Result<QueueItem> {
        self.items
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ClusterError::NotFound(format!("queue item {}", id)))
    }

    /// A page of items in submission order.
    pub fn list(&self, filter: &QueueFilter) -> QueuePage {
        let matching: Vec<QueueItem> = self
            .sorted_items()
            .into_iter()
            .filter(|item| filter.status.is_none_or(|status| item.status == status))
            .collect();

        QueuePage {
            success: true,
            total_rows: matching.len(),
            items: matching
                .into_iter()
                .skip(filter.start)
                .take(filter.limit)
                .collect(),
        }
    }

    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats::empty();
        for entry in self.items.iter() {
            stats.record(entry.value().status);
        }
        stats
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items that are queued or in progress.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Polls until the item reaches a terminal status.
    pub async fn wait_for(&self, id: &QueueItemId, timeout: Duration) -> Result<QueueItem> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let item = self.get(id)?;
            if item.status.is_terminal() {
                return Ok(item);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ClusterError::QueueItemFailure {
                    id: id.to_string(),
                    error: format!("still {} after {:?}", item.status, timeout),
                });
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Polls until no item is queued or in progress.
    pub async fn wait_idle(&self, timeout: Duration) -> Result<QueueStats> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let stats = self.stats();
            if stats.get(QueueStatus::Queued) == 0 && stats.get(QueueStatus::InProgress) == 0 {
                return Ok(stats);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ClusterError::QueueItemFailure {
                    id: "*".to_string(),
                    error: format!("queue not idle after {:?}: {:?}", timeout, stats),
                });
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}
