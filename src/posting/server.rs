use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    routing::post,
};
use std::future::Future;
use std::sync::Arc;

use super::protocol::*;
use super::shard::PostingShard;
use super::types::{Association, ListQuery, ListResult, ShardSearchResult};
use crate::config::ShardConfig;
use crate::document::types::DocumentArg;

/// Routes of one posting shard.
pub fn router(shard: Arc<PostingShard>) -> Router {
    Router::new()
        .route(ENDPOINT_INIT, post(handle_init))
        .route(ENDPOINT_SEARCH, post(handle_search))
        .route(ENDPOINT_LIST, post(handle_list))
        .route(ENDPOINT_ADD, post(handle_add))
        .route(ENDPOINT_DELETE, post(handle_delete))
        .route(ENDPOINT_ASSOCIATE, post(handle_associate))
        .route(ENDPOINT_ASSOCIATIONS, post(handle_associations))
        .layer(Extension(shard))
}

/// Serves `shard` on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(
    listener: tokio::net::TcpListener,
    shard: Arc<PostingShard>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Starting Posting Server on {}", addr);
    }
    axum::serve(listener, router(shard))
        .with_graceful_shutdown(shutdown)
        .await
}

// Shard errors travel inside the envelope; the HTTP status stays 200 so the
// client can tell them apart from transport failures.
fn reply<T>(result: crate::error::Result<T>) -> (StatusCode, Json<RpcReply<T>>) {
    if let Err(e) = &result {
        tracing::warn!("Posting RPC failed: {}", e);
    }
    (StatusCode::OK, Json(RpcReply::from_result(result)))
}

pub async fn handle_init(
    Extension(shard): Extension<Arc<PostingShard>>,
    Json(config): Json<ShardConfig>,
) -> (StatusCode, Json<RpcReply<()>>) {
    reply(shard.init(config).await)
}

pub async fn handle_search(
    Extension(shard): Extension<Arc<PostingShard>>,
    Json(arg): Json<DocumentArg>,
) -> (StatusCode, Json<RpcReply<ShardSearchResult>>) {
    reply(shard.search(&arg).await)
}

pub async fn handle_list(
    Extension(shard): Extension<Arc<PostingShard>>,
    Json(query): Json<ListQuery>,
) -> (StatusCode, Json<RpcReply<ListResult>>) {
    reply(shard.list(&query).await)
}

pub async fn handle_add(
    Extension(shard): Extension<Arc<PostingShard>>,
    Json(req): Json<AddDocumentRequest>,
) -> (StatusCode, Json<RpcReply<()>>) {
    reply(shard.add_document(req).await)
}

pub async fn handle_delete(
    Extension(shard): Extension<Arc<PostingShard>>,
    Json(req): Json<DeleteDocumentRequest>,
) -> (StatusCode, Json<RpcReply<()>>) {
    reply(shard.delete_document(req).await)
}

pub async fn handle_associate(
    Extension(shard): Extension<Arc<PostingShard>>,
    Json(req): Json<AssociateRequest>,
) -> (StatusCode, Json<RpcReply<()>>) {
    reply(shard.associate(req).await)
}

pub async fn handle_associations(
    Extension(shard): Extension<Arc<PostingShard>>,
    Json(req): Json<AssociateRequest>,
) -> (StatusCode, Json<RpcReply<Vec<Association>>>) {
    reply(shard.associations(&req).await)
}
