use crate::document::types::DocumentId;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_LIST_LIMIT: usize = 100;

/// Gap-encodes a strictly increasing docid sequence.
pub fn encode_deltas(docids: &[u32]) -> Vec<u32> {
    let mut previous = 0u32;
    docids
        .iter()
        .map(|&docid| {
            let delta = docid.wrapping_sub(previous);
            previous = docid;
            delta
        })
        .collect()
}

/// Inverse of [`encode_deltas`].
pub fn decode_deltas(deltas: &[u32]) -> Vec<u32> {
    let mut current = 0u32;
    deltas
        .iter()
        .map(|&delta| {
            current = current.wrapping_add(delta);
            current
        })
        .collect()
}

/// LEB128 width of `value`.
fn varint_len(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Documents of one doctype that contain a row's hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Doctype {
    pub doctype: u32,
    pub docids: Vec<u32>,
    pub deltas: Vec<u32>,
}

impl Doctype {
    pub fn new(doctype: u32) -> Self {
        Self {
            doctype,
            docids: Vec::new(),
            deltas: Vec::new(),
        }
    }

    /// Builds an entry from docids in any order; duplicates are dropped.
    pub fn from_docids(doctype: u32, mut docids: Vec<u32>) -> Self {
        docids.sort_unstable();
        docids.dedup();
        let deltas = encode_deltas(&docids);
        Self {
            doctype,
            docids,
            deltas,
        }
    }

    /// Returns false if the docid was already present.
    pub fn insert(&mut self, docid: u32) -> bool {
        match self.docids.binary_search(&docid) {
            Ok(_) => false,
            Err(at) => {
                self.docids.insert(at, docid);
                self.refresh_deltas();
                true
            }
        }
    }

    /// Returns false if the docid was absent.
    pub fn remove(&mut self, docid: u32) -> bool {
        match self.docids.binary_search(&docid) {
            Ok(at) => {
                self.docids.remove(at);
                self.refresh_deltas();
                true
            }
            Err(_) => false,
        }
    }

    pub fn contains(&self, docid: u32) -> bool {
        self.docids.binary_search(&docid).is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.docids.is_empty()
    }

    fn refresh_deltas(&mut self) {
        self.deltas = encode_deltas(&self.docids);
    }

    /// Doctype, entry count and deltas as they would be written out.
    pub fn encoded_len(&self) -> usize {
        4 + varint_len(self.deltas.len() as u64)
            + self
                .deltas
                .iter()
                .map(|&d| varint_len(d as u64))
                .sum::<usize>()
    }

    /// Docids strictly increasing and deltas reconstruct them.
    pub fn is_consistent(&self) -> bool {
        self.docids.len() == self.deltas.len()
            && self.docids.windows(2).all(|w| w[0] < w[1])
            && decode_deltas(&self.deltas) == self.docids
    }
}

/// One hash bucket of the index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Row {
    pub hash: u64,
    pub bytes: usize,
    pub doctypes: Vec<Doctype>,
}

impl Row {
    pub fn new(hash: u64) -> Self {
        Self {
            hash,
            bytes: 8,
            doctypes: Vec::new(),
        }
    }

    pub fn insert(&mut self, id: DocumentId) -> bool {
        let at = match self
            .doctypes
            .binary_search_by_key(&id.doctype, |d| d.doctype)
        {
            Ok(at) => at,
            Err(at) => {
                self.doctypes.insert(at, Doctype::new(id.doctype));
                at
            }
        };
        let inserted = self.doctypes[at].insert(id.docid);
        self.refresh_bytes();
        inserted
    }

    pub fn remove(&mut self, id: DocumentId) -> bool {
        let Ok(at) = self
            .doctypes
            .binary_search_by_key(&id.doctype, |d| d.doctype)
        else {
            return false;
        };

        let removed = self.doctypes[at].remove(id.docid);
        if self.doctypes[at].is_empty() {
            self.doctypes.remove(at);
        }
        self.refresh_bytes();
        removed
    }

    pub fn is_empty(&self) -> bool {
        self.doctypes.is_empty()
    }

    /// Every document in the row, in `(doctype, docid)` order.
    pub fn documents(&self) -> impl Iterator<Item = DocumentId> + '_ {
        self.doctypes.iter().flat_map(|entry| {
            entry
                .docids
                .iter()
                .map(move |&docid| DocumentId::new(entry.doctype, docid))
        })
    }

    fn refresh_bytes(&mut self) {
        self.bytes = 8 + self.doctypes.iter().map(Doctype::encoded_len).sum::<usize>();
    }
}

/// Page request for `List`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListQuery {
    pub start: u64,
    pub limit: usize,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            start: 0,
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl ListQuery {
    /// Reads `start` and `limit`; missing or undecodable values keep the defaults.
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let mut query = ListQuery::default();
        if let Some(start) = params.get("start").and_then(|v| v.parse().ok()) {
            query.start = start;
        }
        if let Some(limit) = params.get("limit").and_then(|v| v.parse().ok()) {
            query.limit = limit;
        }
        query
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ListResult {
    pub success: bool,
    pub total_rows: u64,
    pub rows: Vec<Row>,
}

impl ListResult {
    pub fn empty() -> Self {
        Self {
            success: true,
            total_rows: 0,
            rows: Vec::new(),
        }
    }
}

/// Hits for one candidate document on one shard.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShardMatch {
    pub doctype: u32,
    pub docid: u32,
    pub hits: u32,
}

impl ShardMatch {
    pub fn id(&self) -> DocumentId {
        DocumentId::new(self.doctype, self.docid)
    }
}

/// A shard's raw answer to `Search`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ShardSearchResult {
    pub shard: usize,
    /// Query hashes this shard owns.
    pub query_hashes: usize,
    /// Sorted by document id.
    pub matches: Vec<ShardMatch>,
}

/// Per-shard search results, index-aligned with the shard list.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchGroup(pub Vec<ShardSearchResult>);

impl SearchGroup {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ShardSearchResult> {
        self.0.iter()
    }
}

/// Number of hash buckets two documents share.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Association {
    pub source: DocumentId,
    pub target: DocumentId,
    pub shared: u32,
}
