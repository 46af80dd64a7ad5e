//! Shared handles passed to the queue workers and the HTTP API.

use crate::config::ClusterConfig;
use crate::document::store::DocumentStore;
use crate::posting::client::PostingClient;

use std::sync::Arc;

pub struct Context {
    pub config: ClusterConfig,
    pub documents: Arc<DocumentStore>,
    pub postings: Arc<PostingClient>,
}

impl Context {
    pub fn new(
        config: ClusterConfig,
        documents: Arc<DocumentStore>,
        postings: Arc<PostingClient>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            documents,
            postings,
        })
    }
}
