use axum::http::StatusCode;
use thiserror::Error;

/// Errors surfaced by the posting index, the queue and their collaborators.
#[derive(Error, Debug)]
pub enum ClusterError {
    /// Malformed action, target or range; rejected before anything is stored.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The shard could not be reached or answered with a non-success status.
    #[error("Shard {shard} transport error: {message}")]
    ShardTransport { shard: usize, message: String },

    /// The shard received the call but could not apply it.
    #[error("Shard {shard} execution error: {message}")]
    ShardExecution { shard: usize, message: String },

    #[error("Queue item {id} failed: {error}")]
    QueueItemFailure { id: String, error: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Search group has {actual} results, expected one per shard ({expected})")]
    IncompleteSearchGroup { expected: usize, actual: usize },

    #[error("Invalid queue transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: String,
        to: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, ClusterError>;

impl ClusterError {
    /// HTTP status the API layer reports for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ClusterError::Validation(_) | ClusterError::Config(_) => StatusCode::BAD_REQUEST,
            ClusterError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable name, used as `error` in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ClusterError::Validation(_) => "validation",
            ClusterError::ShardTransport { .. } => "shard_transport",
            ClusterError::ShardExecution { .. } => "shard_execution",
            ClusterError::QueueItemFailure { .. } => "queue_item_failure",
            ClusterError::NotFound(_) => "not_found",
            ClusterError::IncompleteSearchGroup { .. } => "incomplete_search_group",
            ClusterError::InvalidTransition { .. } => "invalid_transition",
            ClusterError::Config(_) => "config",
            ClusterError::Io(_) => "io",
            ClusterError::Serialization(_) => "serialization",
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// True for errors raised by a shard (transport or execution).
    pub fn is_shard_error(&self) -> bool {
        matches!(
            self,
            ClusterError::ShardTransport { .. } | ClusterError::ShardExecution { .. }
        )
    }
}
