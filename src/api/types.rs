use crate::document::types::Document;
use crate::error::ClusterError;
use crate::posting::types::Association;
use crate::queue::types::QueueItem;

use axum::Json;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

/// Body of every failed API call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub message: String,
}

/// A `ClusterError` on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub ClusterError);

impl From<ClusterError> for ApiError {
    fn from(e: ClusterError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        if status.is_server_error() {
            tracing::error!("API request failed: {}", self.0);
        } else {
            tracing::debug!("API request rejected: {}", self.0);
        }

        let body = ErrorBody {
            success: false,
            error: self.0.kind().to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// A queue item as returned by the API: its fields plus `success`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueuedResponse {
    pub success: bool,
    #[serde(flatten)]
    pub item: QueueItem,
}

impl From<QueueItem> for QueuedResponse {
    fn from(item: QueueItem) -> Self {
        Self {
            success: true,
            item,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentResponse {
    pub success: bool,
    #[serde(flatten)]
    pub document: Document,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssociationResponse {
    pub success: bool,
    pub total_rows: usize,
    pub associations: Vec<Association>,
}
