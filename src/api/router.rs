use super::handlers::*;
use crate::context::Context;
use crate::queue::queue::Queue;

use axum::{
    Router,
    extract::Extension,
    routing::{get, post},
};
use std::future::Future;
use std::sync::Arc;

/// Every public route. `:doctype` accepts a single doctype or a range
/// expression depending on the route.
pub fn router(context: Arc<Context>, queue: Arc<Queue>) -> Router {
    Router::new()
        .route("/document/", get(handle_list_documents))
        .route("/document/test/", post(handle_test_corpus))
        .route("/document/:doctype/", get(handle_list_doctypes))
        .route(
            "/document/:doctype/:docid/",
            get(handle_get_document)
                .post(handle_add_document)
                .delete(handle_delete_document),
        )
        .route(
            "/association/:source/:target/",
            get(handle_get_associations).post(handle_associate),
        )
        .route("/queue/", get(handle_get_queue))
        .route("/queue/stats/", get(handle_queue_stats))
        .route("/queue/:id/", get(handle_get_queue_item))
        .route("/index/", get(handle_index))
        .route("/search/", post(handle_search))
        .layer(Extension(context))
        .layer(Extension(queue))
}

/// Serves the API on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(
    listener: tokio::net::TcpListener,
    context: Arc<Context>,
    queue: Arc<Queue>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("HTTP API listening on {}", addr);
    }
    axum::serve(listener, router(context, queue))
        .with_graceful_shutdown(shutdown)
        .await
}
