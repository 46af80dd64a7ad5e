use super::types::{ScoredDocument, SearchResponse};
use crate::document::store::DocumentStore;
use crate::document::types::{DocumentArg, DocumentId};
use crate::error::{ClusterError, Result};
use crate::posting::client::PostingClient;
use crate::posting::types::SearchGroup;

use std::collections::BTreeMap;

/// Scores a candidate from its summed hits and the query's hash count.
pub trait Ranker: Send + Sync {
    fn score(&self, hits: u32, query_hashes: usize) -> f64;
}

/// Fraction of the query's hashes the candidate shares.
#[derive(Debug, Clone, Copy, Default)]
pub struct HitRatio;

impl Ranker for HitRatio {
    fn score(&self, hits: u32, query_hashes: usize) -> f64 {
        if query_hashes == 0 {
            return 0.0;
        }
        hits as f64 / query_hashes as f64
    }
}

/// Merges one result per shard into a ranked list.
///
/// Shard order does not matter. Candidates scoring below `arg.threshold` are
/// dropped, the query document is never returned, and ties are broken by
/// document id so the output is deterministic.
pub fn merge(
    group: &SearchGroup,
    shard_count: usize,
    arg: &DocumentArg,
    ranker: &dyn Ranker,
) -> Result<SearchResponse> {
    if group.len() != shard_count {
        return Err(ClusterError::IncompleteSearchGroup {
            expected: shard_count,
            actual: group.len(),
        });
    }

    let query_hashes: usize = group.iter().map(|r| r.query_hashes).sum();

    let mut hits: BTreeMap<DocumentId, u32> = BTreeMap::new();
    for result in group.iter() {
        for m in result.matches.iter().filter(|m| arg.wants(&m.id())) {
            *hits.entry(m.id()).or_insert(0) += m.hits;
        }
    }

    let mut results: Vec<ScoredDocument> = hits
        .into_iter()
        .map(|(id, hits)| ScoredDocument {
            doctype: id.doctype,
            docid: id.docid,
            hits,
            score: ranker.score(hits, query_hashes),
            title: None,
        })
        .filter(|doc| doc.score >= arg.threshold)
        .collect();

    results.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id().cmp(&b.id())));
    results.truncate(arg.limit);

    Ok(SearchResponse::new(query_hashes, results))
}

/// Adds titles of documents that are still in the store.
pub fn hydrate(response: &mut SearchResponse, documents: &DocumentStore) {
    for result in response.results.iter_mut() {
        result.title = documents.get(&result.id()).map(|doc| doc.title);
    }
}

/// Runs a query end to end: fan-out, merge, hydrate.
///
/// A query naming a stored document and no text searches with that
/// document's text.
pub async fn search(
    postings: &PostingClient,
    documents: &DocumentStore,
    mut arg: DocumentArg,
    ranker: &dyn Ranker,
) -> Result<SearchResponse> {
    if arg.text.is_empty()
        && let Some(id) = arg.id
    {
        let doc = documents
            .get(&id)
            .ok_or_else(|| ClusterError::NotFound(format!("document {}", id)))?;
        arg.text = doc.text;
    }
    if arg.text.is_empty() {
        return Err(ClusterError::Validation(
            "search needs text or a stored doctype and docid".to_string(),
        ));
    }

    let group = postings.search(&arg).await?;
    let mut response = merge(&group, postings.shard_count(), &arg, ranker)?;
    hydrate(&mut response, documents);

    tracing::debug!(
        "Search over {} hashes returned {} results",
        response.query_hashes,
        response.count
    );
    Ok(response)
}
