//! Queue Actions
//!
//! One handler per `Action`. Each handler writes the document store first and
//! only then fans the mutation out to the posting shards. A handler's `Ok`
//! value is the item's location, if it has one.

use super::types::{Action, QueueItem};
use crate::context::Context;
use crate::document::corpus;
use crate::document::types::{Document, DocumentId, DocumentPayload, parse_ranges};
use crate::error::{ClusterError, Result};
use crate::posting::protocol::Mutation;

/// Seed of the synthetic corpus, so repeated TestCorpus runs index the same text.
const CORPUS_SEED: u64 = 0x5eed;

pub async fn execute(ctx: &Context, item: &QueueItem) -> Result<Option<String>> {
    match item.action {
        Action::AddDocument => {
            let id = required_target(item)?;
            let payload = DocumentPayload::from_form(&item.payload)?;
            add_document(ctx, id, payload).await.map(Some)
        }
        Action::DeleteDocument => {
            delete_document(ctx, required_target(item)?).await?;
            Ok(None)
        }
        Action::AssociateDocument => {
            associate_documents(ctx, &item.association_source, &item.association_target)
                .await?;
            Ok(None)
        }
        Action::TestCorpus => {
            test_corpus(ctx, &item.payload).await?;
            Ok(None)
        }
    }
}

fn required_target(item: &QueueItem) -> Result<DocumentId> {
    item.target
        .ok_or_else(|| ClusterError::Validation(format!("{} item has no target", item.action)))
}

/// Stores the document, then indexes its text on every shard.
pub async fn add_document(
    ctx: &Context,
    id: DocumentId,
    payload: DocumentPayload,
) -> Result<String> {
    let text = payload.text.clone();
    ctx.documents.put(Document::new(id, payload))?;
    ctx.postings.call_multiple(&Mutation::add(id, text)).await?;

    tracing::debug!("Added document {}", id);
    Ok(id.location())
}

/// Removing a document that does not exist still succeeds.
pub async fn delete_document(ctx: &Context, id: DocumentId) -> Result<()> {
    if !ctx.documents.delete(&id)? {
        tracing::debug!("Document {} was not stored, deleting postings only", id);
    }
    ctx.postings.call_multiple(&Mutation::delete(id)).await
}

pub async fn associate_documents(ctx: &Context, source: &str, target: &str) -> Result<()> {
    let source = parse_ranges(source)?;
    let target = parse_ranges(target)?;
    ctx.postings
        .call_multiple(&Mutation::associate(source, target))
        .await
}

/// Generates the synthetic corpus and adds every document in order.
pub async fn test_corpus(ctx: &Context, payload: &[u8]) -> Result<()> {
    let config = corpus::config_from_payload(&ctx.config.corpus, payload);
    let documents = corpus::generate(&config, CORPUS_SEED);

    tracing::info!(
        "Indexing test corpus: {} doctypes x {} documents",
        config.doctypes,
        config.documents_per_doctype
    );

    for (id, payload) in documents {
        add_document(ctx, id, payload).await?;
    }
    Ok(())
}
