use super::types::*;
use crate::context::Context;
use crate::document::types::{
    DocumentArg, DocumentId, DocumentPage, parse_docid, parse_ranges,
};
use crate::error::ClusterError;
use crate::posting::types::ListResult;
use crate::queue::queue::Queue;
use crate::queue::types::*;
use crate::search::engine::{self, HitRatio};
use crate::search::types::SearchResponse;

use axum::body::Bytes;
use axum::extract::{Form, Path, Query};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use std::collections::HashMap;
use std::sync::Arc;

const DEFAULT_PAGE_LIMIT: usize = 100;

fn page_params(params: &HashMap<String, String>) -> (usize, usize) {
    let start = params
        .get("start")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let limit = params
        .get("limit")
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_PAGE_LIMIT);
    (start, limit)
}

fn document_id(doctype: &str, docid: &str) -> Result<DocumentId, ClusterError> {
    let doctype = doctype
        .parse()
        .map_err(|_| ClusterError::Validation(format!("invalid doctype '{}'", doctype)))?;
    Ok(DocumentId::new(doctype, parse_docid(docid)?))
}

fn queued(item: QueueItem) -> (StatusCode, Json<QueuedResponse>) {
    tracing::info!("Queued {} item {}", item.action, item.id);
    (StatusCode::ACCEPTED, Json(QueuedResponse::from(item)))
}

// ============================================================
// DOCUMENTS
// ============================================================

pub async fn handle_list_documents(
    Extension(ctx): Extension<Arc<Context>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<DocumentPage> {
    let (start, limit) = page_params(&params);
    Json(ctx.documents.list(&[], start, limit))
}

pub async fn handle_list_doctypes(
    Extension(ctx): Extension<Arc<Context>>,
    Path(doctypes): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<DocumentPage>> {
    let ranges = parse_ranges(&doctypes)?;
    let (start, limit) = page_params(&params);
    Ok(Json(ctx.documents.list(&ranges, start, limit)))
}

pub async fn handle_get_document(
    Extension(ctx): Extension<Arc<Context>>,
    Path((doctype, docid)): Path<(String, String)>,
) -> ApiResult<Json<DocumentResponse>> {
    let id = document_id(&doctype, &docid)?;
    let document = ctx
        .documents
        .get(&id)
        .ok_or_else(|| ClusterError::NotFound(format!("document {}", id)))?;

    Ok(Json(DocumentResponse {
        success: true,
        document,
    }))
}

pub async fn handle_add_document(
    Extension(queue): Extension<Arc<Queue>>,
    Path((doctype, docid)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<QueuedResponse>)> {
    let id = document_id(&doctype, &docid)?;
    let item = queue
        .new_item(Action::AddDocument, None, Some(id), "", "", &body[..])
        .await?;
    Ok(queued(item))
}

pub async fn handle_delete_document(
    Extension(queue): Extension<Arc<Queue>>,
    Path((doctype, docid)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<QueuedResponse>)> {
    let id = document_id(&doctype, &docid)?;
    let item = queue
        .new_item(Action::DeleteDocument, None, Some(id), "", "", &body[..])
        .await?;
    Ok(queued(item))
}

pub async fn handle_test_corpus(
    Extension(queue): Extension<Arc<Queue>>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<QueuedResponse>)> {
    let item = queue
        .new_item(Action::TestCorpus, None, None, "", "", &body[..])
        .await?;
    Ok(queued(item))
}

// ============================================================
// ASSOCIATIONS
// ============================================================

pub async fn handle_get_associations(
    Extension(ctx): Extension<Arc<Context>>,
    Path((source, target)): Path<(String, String)>,
) -> ApiResult<Json<AssociationResponse>> {
    let associations = ctx
        .postings
        .associations(parse_ranges(&source)?, parse_ranges(&target)?)
        .await?;

    Ok(Json(AssociationResponse {
        success: true,
        total_rows: associations.len(),
        associations,
    }))
}

pub async fn handle_associate(
    Extension(queue): Extension<Arc<Queue>>,
    Path((source, target)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<QueuedResponse>)> {
    let item = queue
        .new_item(
            Action::AssociateDocument,
            None,
            None,
            &source,
            &target,
            &body[..],
        )
        .await?;
    Ok(queued(item))
}

// ============================================================
// QUEUE
// ============================================================

pub async fn handle_get_queue(
    Extension(queue): Extension<Arc<Queue>>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<QueuePage>> {
    let filter = QueueFilter::from_params(&params)?;
    Ok(Json(queue.list(&filter)))
}

pub async fn handle_queue_stats(Extension(queue): Extension<Arc<Queue>>) -> Json<QueueStats> {
    Json(queue.stats())
}

/// Completed items answer 201 with a `Location`, failed ones 400, anything
/// still pending 202.
pub async fn handle_get_queue_item(
    Extension(queue): Extension<Arc<Queue>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id = QueueItemId::parse(&id)?;
    let item = queue.get(&id)?;

    let response = match item.status {
        QueueStatus::Completed => match item.location.clone() {
            Some(location) => (
                StatusCode::CREATED,
                [(header::LOCATION, location)],
                Json(QueuedResponse::from(item)),
            )
                .into_response(),
            None => (StatusCode::CREATED, Json(QueuedResponse::from(item))).into_response(),
        },
        QueueStatus::Failed => {
            (StatusCode::BAD_REQUEST, Json(QueuedResponse::from(item))).into_response()
        }
        QueueStatus::Queued | QueueStatus::InProgress => {
            (StatusCode::ACCEPTED, Json(QueuedResponse::from(item))).into_response()
        }
    };
    Ok(response)
}

// ============================================================
// INDEX AND SEARCH
// ============================================================

pub async fn handle_index(
    Extension(ctx): Extension<Arc<Context>>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<ListResult>> {
    Ok(Json(ctx.postings.get_rows(&params).await?))
}

pub async fn handle_search(
    Extension(ctx): Extension<Arc<Context>>,
    Form(params): Form<HashMap<String, String>>,
) -> ApiResult<Json<SearchResponse>> {
    let arg = DocumentArg::from_params(&params)?;
    let response = engine::search(&ctx.postings, &ctx.documents, arg, &HitRatio).await?;
    Ok(Json(response))
}
