//! Document Store
//!
//! Holds document metadata and text, grouped by doctype. Queue workers write
//! here before touching the posting index; the API reads from here.

use super::types::*;
use crate::error::Result;
use crate::storage::journal::Journal;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One journaled change to the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum DocumentRecord {
    Put(Document),
    Delete(DocumentId),
}

pub struct DocumentStore {
    /// Structure: `Doctype -> Docid -> Document`.
    local_data: DashMap<u32, DashMap<u32, Document>>,
    journal: Option<Journal<DocumentRecord>>,
    /// Keeps journal order and map order in step for concurrent writers.
    write_lock: Mutex<()>,
}

impl DocumentStore {
    /// Store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            local_data: DashMap::new(),
            journal: None,
            write_lock: Mutex::new(()),
        }
    }

    /// Opens the store, replaying the journal at `path` when one is given.
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::in_memory());
        };

        let (journal, records) = Journal::<DocumentRecord>::open(path)?;
        let store = Self {
            local_data: DashMap::new(),
            journal: None,
            write_lock: Mutex::new(()),
        };

        let replayed = records.len();
        for record in records {
            match record {
                DocumentRecord::Put(doc) => store.store_local(doc),
                DocumentRecord::Delete(id) => {
                    store.remove_local(&id);
                }
            }
        }

        // Compact: one Put per live document.
        let live: Vec<DocumentRecord> = store
            .all_documents()
            .into_iter()
            .map(DocumentRecord::Put)
            .collect();
        journal.rewrite(&live)?;

        tracing::info!(
            "Document store recovered {} documents from {} journal records",
            live.len(),
            replayed
        );

        Ok(Self {
            journal: Some(journal),
            ..store
        })
    }

    fn store_local(&self, doc: Document) {
        let doctype_map = self
            .local_data
            .entry(doc.doctype)
            .or_insert_with(DashMap::new);
        doctype_map.insert(doc.docid, doc);
    }

    fn remove_local(&self, id: &DocumentId) -> bool {
        let removed = self
            .local_data
            .get(&id.doctype)
            .map(|doctype_map| doctype_map.remove(&id.docid).is_some())
            .unwrap_or(false);

        // Drop empty doctype maps so counts and listings stay cheap.
        if removed {
            self.local_data
                .remove_if(&id.doctype, |_, doctype_map| doctype_map.is_empty());
        }
        removed
    }

    /// Inserts or replaces a document.
    pub fn put(&self, doc: Document) -> Result<()> {
        let _guard = self.write_lock.lock();
        if let Some(journal) = &self.journal {
            journal.append(&DocumentRecord::Put(doc.clone()))?;
        }
        tracing::debug!("Stored document {}", doc.id());
        self.store_local(doc);
        Ok(())
    }

    /// Removes a document. Returns whether it existed; removing an absent
    /// document is not an error.
    pub fn delete(&self, id: &DocumentId) -> Result<bool> {
        let _guard = self.write_lock.lock();
        if self.get(id).is_none() {
            return Ok(false);
        }
        if let Some(journal) = &self.journal {
            journal.append(&DocumentRecord::Delete(*id))?;
        }
        tracing::debug!("Deleted document {}", id);
        Ok(self.remove_local(id))
    }

    pub fn get(&self, id: &DocumentId) -> Option<Document> {
        self.local_data
            .get(&id.doctype)
            .and_then(|doctype_map| doctype_map.get(&id.docid).map(|doc| doc.clone()))
    }

    pub fn count(&self) -> usize {
        self.local_data
            .iter()
            .map(|entry| entry.value().len())
            .sum()
    }

    fn all_documents(&self) -> Vec<Document> {
        let mut docs: Vec<Document> = self
            .local_data
            .iter()
            .flat_map(|entry| {
                entry
                    .value()
                    .iter()
                    .map(|doc| doc.value().clone())
                    .collect::<Vec<_>>()
            })
            .collect();
        docs.sort_by_key(|doc| doc.id());
        docs
    }

    /// Pages through document metadata in `(doctype, docid)` order.
    pub fn list(&self, ranges: &[DoctypeRange], start: usize, limit: usize) -> DocumentPage {
        let mut summaries: Vec<DocumentSummary> = self
            .local_data
            .iter()
            .filter(|entry| ranges_contain(ranges, *entry.key()))
            .flat_map(|entry| {
                entry
                    .value()
                    .iter()
                    .map(|doc| DocumentSummary::from(doc.value()))
                    .collect::<Vec<_>>()
            })
            .collect();
        summaries.sort_by_key(|s| (s.doctype, s.docid));

        let total_rows = summaries.len();
        let documents = summaries.into_iter().skip(start).take(limit).collect();

        DocumentPage {
            success: true,
            total_rows,
            documents,
        }
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::in_memory()
    }
}
