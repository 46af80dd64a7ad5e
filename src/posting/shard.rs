//! Posting Shard
//!
//! One partition of the posting index. A shard is created empty and becomes
//! usable once `init` hands it its `ShardConfig`. Mutations are serialised by
//! a writer lock and journaled before they are applied, so a mutation is
//! visible to every read that starts after it returns. The journal sync runs
//! without the state lock held; reads keep going while a write hits disk.

use super::protocol::{AddDocumentRequest, AssociateRequest, DeleteDocumentRequest};
use super::types::*;
use crate::config::ShardConfig;
use crate::document::shingle::shingle_hashes;
use crate::document::types::{DoctypeRange, DocumentArg, DocumentId, ranges_contain};
use crate::error::{ClusterError, Result};
use crate::storage::journal::Journal;
use crate::storage::partitioner::ShardPartitioner;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// One journaled shard mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum ShardRecord {
    Add { id: DocumentId, hashes: Vec<u64> },
    Delete { id: DocumentId },
    Associate { source: Vec<DoctypeRange>, target: Vec<DoctypeRange> },
    /// Written by compaction in place of the Associate records it replaces.
    Associations(Vec<Association>),
}

struct ShardState {
    config: ShardConfig,
    partitioner: ShardPartitioner,
    /// Rows in ascending hash order; this is the shard's native list order.
    rows: BTreeMap<u64, Row>,
    /// Owned hashes of every indexed document, for deletes and re-adds.
    documents: HashMap<DocumentId, Vec<u64>>,
    associations: BTreeMap<(DocumentId, DocumentId), u32>,
    journal: Option<Arc<Journal<ShardRecord>>>,
}

impl ShardState {
    fn new(config: ShardConfig) -> Self {
        Self {
            partitioner: ShardPartitioner::new(config.index, config.count),
            config,
            rows: BTreeMap::new(),
            documents: HashMap::new(),
            associations: BTreeMap::new(),
            journal: None,
        }
    }

    fn apply(&mut self, record: ShardRecord) {
        match record {
            ShardRecord::Add { id, hashes } => self.apply_add(id, hashes),
            ShardRecord::Delete { id } => self.apply_delete(&id),
            ShardRecord::Associate { source, target } => self.apply_associate(&source, &target),
            ShardRecord::Associations(associations) => {
                for a in associations {
                    self.associations.insert((a.source, a.target), a.shared);
                }
            }
        }
    }

    fn apply_add(&mut self, id: DocumentId, hashes: Vec<u64>) {
        // Re-adding replaces the previous content.
        self.apply_delete(&id);

        for &hash in &hashes {
            self.rows
                .entry(hash)
                .or_insert_with(|| Row::new(hash))
                .insert(id);
        }
        self.documents.insert(id, hashes);
    }

    fn apply_delete(&mut self, id: &DocumentId) {
        // Counts involving the document are stale once its rows change.
        self.associations.retain(|(s, t), _| s != id && t != id);

        let Some(hashes) = self.documents.remove(id) else {
            return;
        };

        for hash in hashes {
            if let Some(row) = self.rows.get_mut(&hash) {
                row.remove(*id);
                if row.is_empty() {
                    self.rows.remove(&hash);
                }
            }
        }
    }

    fn apply_associate(&mut self, source: &[DoctypeRange], target: &[DoctypeRange]) {
        self.associations.retain(|(s, t), _| {
            !(ranges_contain(source, s.doctype) && ranges_contain(target, t.doctype))
        });

        for row in self.rows.values() {
            let sources: Vec<DocumentId> = row
                .documents()
                .filter(|id| ranges_contain(source, id.doctype))
                .collect();
            if sources.is_empty() {
                continue;
            }
            let targets: Vec<DocumentId> = row
                .documents()
                .filter(|id| ranges_contain(target, id.doctype))
                .collect();

            for s in &sources {
                for t in targets.iter().filter(|t| *t != s) {
                    *self.associations.entry((*s, *t)).or_insert(0) += 1;
                }
            }
        }
    }

    /// Records that reproduce the current state.
    fn snapshot(&self) -> Vec<ShardRecord> {
        let mut ids: Vec<&DocumentId> = self.documents.keys().collect();
        ids.sort();

        let mut records: Vec<ShardRecord> = ids
            .into_iter()
            .map(|id| ShardRecord::Add {
                id: *id,
                hashes: self.documents[id].clone(),
            })
            .collect();
        if !self.associations.is_empty() {
            records.push(ShardRecord::Associations(association_list(
                &self.associations,
            )));
        }
        records
    }
}

fn association_list(map: &BTreeMap<(DocumentId, DocumentId), u32>) -> Vec<Association> {
    map.iter()
        .map(|(&(source, target), &shared)| Association {
            source,
            target,
            shared,
        })
        .collect()
}

/// A single posting shard.
pub struct PostingShard {
    state: RwLock<Option<ShardState>>,
    /// Held for the whole of a mutation so journal order is apply order.
    writer: Mutex<()>,
}

impl PostingShard {
    /// Creates an uninitialised shard. Every call except `init` fails until
    /// the shard has been initialised.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(None),
            writer: Mutex::new(()),
        }
    }

    fn not_initialised() -> ClusterError {
        ClusterError::Validation("shard not initialised".to_string())
    }

    /// Journals `record`, then applies it. Callers hold `writer`.
    async fn commit(&self, record: ShardRecord) -> Result<()> {
        let journal = {
            let guard = self.state.read().await;
            let state = guard.as_ref().ok_or_else(Self::not_initialised)?;
            state.journal.clone()
        };
        if let Some(journal) = journal {
            journal.append_owned(record.clone()).await?;
        }

        let mut guard = self.state.write().await;
        let state = guard.as_mut().ok_or_else(Self::not_initialised)?;
        state.apply(record);
        Ok(())
    }

    /// (Re)initialises the shard: drops in-memory state, then replays the
    /// shard journal if the configuration names a data directory.
    pub async fn init(&self, config: ShardConfig) -> Result<()> {
        if config.count == 0 || config.index >= config.count {
            return Err(ClusterError::Validation(format!(
                "shard index {} out of range for {} shards",
                config.index, config.count
            )));
        }

        let _writer = self.writer.lock().await;
        let mut state = ShardState::new(config);

        if let Some(path) = state.config.journal_path() {
            let (journal, records) = Journal::<ShardRecord>::open(&path)?;
            let replayed = records.len();
            for record in records {
                state.apply(record);
            }
            journal.rewrite(&state.snapshot())?;
            state.journal = Some(Arc::new(journal));

            tracing::info!(
                "Shard {} replayed {} records ({} documents, {} rows)",
                state.config.index,
                replayed,
                state.documents.len(),
                state.rows.len()
            );
        }

        tracing::info!(
            "Shard {}/{} initialised on {}",
            state.config.index,
            state.config.count,
            state.config.address
        );

        *self.state.write().await = Some(state);
        Ok(())
    }

    pub async fn is_initialised(&self) -> bool {
        self.state.read().await.is_some()
    }

    /// Shard-local candidates for the query. Never fails because nothing matched.
    pub async fn search(&self, arg: &DocumentArg) -> Result<ShardSearchResult> {
        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or_else(Self::not_initialised)?;

        let owned = state
            .partitioner
            .owned(&shingle_hashes(&arg.text, state.config.window));

        let mut hits: BTreeMap<DocumentId, u32> = BTreeMap::new();
        for hash in &owned {
            if let Some(row) = state.rows.get(hash) {
                for id in row.documents().filter(|id| arg.wants(id)) {
                    *hits.entry(id).or_insert(0) += 1;
                }
            }
        }

        tracing::debug!(
            "Shard {} search: {} owned query hashes, {} candidates",
            state.config.index,
            owned.len(),
            hits.len()
        );

        Ok(ShardSearchResult {
            shard: state.config.index,
            query_hashes: owned.len(),
            matches: hits
                .into_iter()
                .map(|(id, hits)| ShardMatch {
                    doctype: id.doctype,
                    docid: id.docid,
                    hits,
                })
                .collect(),
        })
    }

    /// A page of rows in ascending hash order.
    pub async fn list(&self, query: &ListQuery) -> Result<ListResult> {
        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or_else(Self::not_initialised)?;

        let rows = state
            .rows
            .values()
            .skip(query.start as usize)
            .take(query.limit)
            .cloned()
            .collect();

        Ok(ListResult {
            success: true,
            total_rows: state.rows.len() as u64,
            rows,
        })
    }

    pub async fn add_document(&self, req: AddDocumentRequest) -> Result<()> {
        let _writer = self.writer.lock().await;
        let (index, hashes) = {
            let guard = self.state.read().await;
            let state = guard.as_ref().ok_or_else(Self::not_initialised)?;
            (
                state.config.index,
                state
                    .partitioner
                    .owned(&shingle_hashes(&req.text, state.config.window)),
            )
        };

        tracing::debug!("Shard {} adding document {}", index, req.id);
        self.commit(ShardRecord::Add { id: req.id, hashes }).await
    }

    /// Removing a document the shard never saw is not an error.
    pub async fn delete_document(&self, req: DeleteDocumentRequest) -> Result<()> {
        let _writer = self.writer.lock().await;
        {
            let guard = self.state.read().await;
            let state = guard.as_ref().ok_or_else(Self::not_initialised)?;
            if !state.documents.contains_key(&req.id) {
                tracing::debug!(
                    "Shard {} has no document {}, nothing to delete",
                    state.config.index,
                    req.id
                );
                return Ok(());
            }
        }

        self.commit(ShardRecord::Delete { id: req.id }).await
    }

    /// Recomputes the association counts between the two doctype ranges.
    pub async fn associate(&self, req: AssociateRequest) -> Result<()> {
        let _writer = self.writer.lock().await;
        self.commit(ShardRecord::Associate {
            source: req.source,
            target: req.target,
        })
        .await
    }

    pub async fn associations(&self, req: &AssociateRequest) -> Result<Vec<Association>> {
        let guard = self.state.read().await;
        let state = guard.as_ref().ok_or_else(Self::not_initialised)?;

        Ok(association_list(&state.associations)
            .into_iter()
            .filter(|a| {
                ranges_contain(&req.source, a.source.doctype)
                    && ranges_contain(&req.target, a.target.doctype)
            })
            .collect())
    }

    /// Number of rows held by this shard.
    pub async fn row_count(&self) -> usize {
        self.state
            .read()
            .await
            .as_ref()
            .map(|state| state.rows.len())
            .unwrap_or(0)
    }

    /// Documents with at least one owned hash on this shard.
    pub async fn documents(&self) -> BTreeSet<DocumentId> {
        self.state
            .read()
            .await
            .as_ref()
            .map(|state| {
                state
                    .documents
                    .iter()
                    .filter(|(_, hashes)| !hashes.is_empty())
                    .map(|(id, _)| *id)
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Default for PostingShard {
    fn default() -> Self {
        Self::new()
    }
}
