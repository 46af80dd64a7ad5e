//! Local Cluster Bootstrap
//!
//! Brings up every component of a single-process deployment in dependency
//! order and tears it down again:
//!
//! 1. Posting shard servers (listeners bound first, so port 0 works).
//! 2. The posting client, followed by `Init` on every shard.
//! 3. The document store and the queue, replayed from their journals.
//! 4. The queue workers.
//!
//! The HTTP API is served separately by whoever owns the listener.

use crate::config::ClusterConfig;
use crate::context::Context;
use crate::document::store::DocumentStore;
use crate::error::Result;
use crate::posting::client::PostingClient;
use crate::posting::server;
use crate::posting::shard::PostingShard;
use crate::queue::executor::QueueExecutor;
use crate::queue::queue::Queue;

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct LocalCluster {
    /// Configuration with the shard addresses actually bound.
    pub config: ClusterConfig,
    pub context: Arc<Context>,
    pub queue: Arc<Queue>,
    pub shards: Vec<Arc<PostingShard>>,
    executor: Arc<QueueExecutor>,
    stop_servers: watch::Sender<bool>,
    servers: Vec<JoinHandle<()>>,
}

impl LocalCluster {
    pub async fn start(mut config: ClusterConfig) -> Result<Self> {
        config.validate()?;

        // 1. Shard servers:
        let (stop_servers, _) = watch::channel(false);
        let mut shards = Vec::with_capacity(config.shards.len());
        let mut servers = Vec::with_capacity(config.shards.len());

        for index in 0..config.shards.len() {
            let listener = tokio::net::TcpListener::bind(config.shards[index]).await?;
            config.shards[index] = listener.local_addr()?;

            let shard = Arc::new(PostingShard::new());
            shards.push(shard.clone());

            let mut stop = stop_servers.subscribe();
            servers.push(tokio::spawn(async move {
                let shutdown = async move {
                    let _ = stop.wait_for(|stopped| *stopped).await;
                };
                if let Err(e) = server::serve(listener, shard, shutdown).await {
                    tracing::error!("Posting server {} failed: {}", index, e);
                }
            }));
        }

        // 2. Posting client:
        let postings = Arc::new(PostingClient::connect(&config)?);
        postings.initialise().await?;

        // 3. Document store and queue:
        let documents = Arc::new(DocumentStore::open(
            config.document_journal_path().as_deref(),
        )?);
        let queue = Arc::new(Queue::open(
            config.queue_journal_path().as_deref(),
            config.lease,
        )?);

        // 4. Workers:
        let context = Context::new(config.clone(), documents, postings);
        let executor = QueueExecutor::new(queue.clone(), context.clone());
        executor.start();

        tracing::info!(
            "Local cluster running with {} shards and {} workers",
            config.shards.len(),
            config.worker_count
        );

        Ok(Self {
            config,
            context,
            queue,
            shards,
            executor,
            stop_servers,
            servers,
        })
    }

    /// Stops the workers first, then the shard servers.
    pub async fn shutdown(self) {
        self.executor.shutdown().await;

        let _ = self.stop_servers.send(true);
        for server in self.servers {
            let _ = server.await;
        }
        tracing::info!("Local cluster stopped");
    }
}
