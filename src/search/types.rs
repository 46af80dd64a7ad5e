use crate::document::types::DocumentId;

use serde::{Deserialize, Serialize};

/// One ranked match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredDocument {
    pub doctype: u32,
    pub docid: u32,
    /// Shared hashes summed over every shard.
    pub hits: u32,
    pub score: f64,
    /// Filled in from the document store when the document is still there.
    pub title: Option<String>,
}

impl ScoredDocument {
    pub fn id(&self) -> DocumentId {
        DocumentId::new(self.doctype, self.docid)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub success: bool,
    /// Distinct hashes of the query text.
    pub query_hashes: usize,
    pub count: usize,
    pub results: Vec<ScoredDocument>,
}

impl SearchResponse {
    pub fn new(query_hashes: usize, results: Vec<ScoredDocument>) -> Self {
        Self {
            success: true,
            query_hashes,
            count: results.len(),
            results,
        }
    }
}
