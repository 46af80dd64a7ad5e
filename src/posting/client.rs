//! Posting Client
//!
//! Holds one connection per shard and presents the shards as a single index.
//! Every call except `get_rows` is a fan-out: one spawned task per shard, all
//! completions drained from an `mpsc` channel before the caller sees a result.

use super::protocol::*;
use super::types::*;
use crate::config::ClusterConfig;
use crate::document::types::{DoctypeRange, DocumentArg, DocumentId};
use crate::error::{ClusterError, Result};

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// A keep-alive HTTP connection to one shard.
pub struct ShardConnection {
    pub index: usize,
    base_url: String,
    http_client: reqwest::Client,
    timeout: Duration,
    attempts: usize,
}

impl ShardConnection {
    pub fn new(
        index: usize,
        address: std::net::SocketAddr,
        timeout: Duration,
        attempts: usize,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(timeout.min(Duration::from_secs(2)))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| ClusterError::ShardTransport {
                shard: index,
                message: e.to_string(),
            })?;

        Ok(Self {
            index,
            base_url: format!("http://{}", address),
            http_client,
            timeout,
            attempts: attempts.max(1),
        })
    }

    fn transport_error(&self, message: impl ToString) -> ClusterError {
        ClusterError::ShardTransport {
            shard: self.index,
            message: message.to_string(),
        }
    }

    /// Sends one RPC and unwraps the reply envelope.
    pub async fn call<Req, Resp>(&self, endpoint: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let response = self
            .post_with_retry(format!("{}{}", self.base_url, endpoint), request)
            .await?;

        if !response.status().is_success() {
            return Err(self.transport_error(format!(
                "{} returned {}",
                endpoint,
                response.status()
            )));
        }

        let reply: RpcReply<Resp> = response
            .json()
            .await
            .map_err(|e| self.transport_error(format!("undecodable reply from {}: {}", endpoint, e)))?;

        reply.into_result(self.index)
    }

    async fn post_with_retry<T: Serialize + ?Sized>(
        &self,
        url: String,
        payload: &T,
    ) -> Result<reqwest::Response> {
        let mut delay_ms = 150u64;

        for attempt in 0..self.attempts {
            let response = self
                .http_client
                .post(url.clone())
                .json(payload)
                .timeout(self.timeout)
                .send()
                .await;

            match response {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    if attempt + 1 == self.attempts {
                        return Err(self.transport_error(e));
                    }
                    tracing::debug!(
                        "Shard {} send failed (attempt {}): {}",
                        self.index,
                        attempt + 1,
                        e
                    );
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(1200);
                }
            }
        }

        Err(self.transport_error("retry attempts exhausted"))
    }
}

/// Client side of the posting index.
pub struct PostingClient {
    config: ClusterConfig,
    shards: Vec<Arc<ShardConnection>>,
}

impl PostingClient {
    /// Opens one connection per configured shard. Nothing is sent until the
    /// first call.
    pub fn connect(config: &ClusterConfig) -> Result<Self> {
        config.validate()?;

        let shards = config
            .shards
            .iter()
            .enumerate()
            .map(|(index, address)| {
                ShardConnection::new(index, *address, config.rpc_timeout, config.rpc_attempts)
                    .map(Arc::new)
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::info!("Posting client connected to {} shards", shards.len());

        Ok(Self {
            config: config.clone(),
            shards,
        })
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Runs `call` against every shard concurrently.
    ///
    /// Results come back index-aligned with the shard list. Every task is
    /// drained before returning; the first error wins and later ones are
    /// only logged.
    async fn fan_out<T, F, Fut>(&self, operation: &'static str, call: F) -> Result<Vec<T>>
    where
        T: Send + 'static,
        F: Fn(Arc<ShardConnection>) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let count = self.shards.len();
        let (tx, mut rx) = mpsc::channel::<(usize, Result<T>)>(count.max(1));

        for shard in &self.shards {
            let tx = tx.clone();
            let index = shard.index;
            let pending = call(shard.clone());
            tokio::spawn(async move {
                let result = pending.await;
                let _ = tx.send((index, result)).await;
            });
        }
        drop(tx);

        let mut replies: Vec<Option<T>> = (0..count).map(|_| None).collect();
        let mut first_error: Option<ClusterError> = None;

        while let Some((index, result)) = rx.recv().await {
            match result {
                Ok(value) => replies[index] = Some(value),
                Err(e) if first_error.is_none() => first_error = Some(e),
                Err(e) => tracing::warn!("Additional {} failure: {}", operation, e),
            }
        }

        if let Some(e) = first_error {
            tracing::error!("Posting {} failed: {}", operation, e);
            return Err(e);
        }

        // A task that panicked never reports back.
        replies
            .into_iter()
            .enumerate()
            .map(|(shard, reply)| {
                reply.ok_or_else(|| ClusterError::ShardTransport {
                    shard,
                    message: format!("{} task ended without a reply", operation),
                })
            })
            .collect()
    }

    /// Sends each shard its `Init` configuration.
    pub async fn initialise(&self) -> Result<()> {
        let configs = Arc::new(self.config.shard_configs());

        self.fan_out("init", |shard| {
            let configs = configs.clone();
            async move {
                shard
                    .call::<_, ()>(ENDPOINT_INIT, &configs[shard.index])
                    .await
            }
        })
        .await?;

        tracing::info!("Initialised {} posting shards", self.shards.len());
        Ok(())
    }

    pub async fn search(&self, arg: &DocumentArg) -> Result<SearchGroup> {
        let arg = Arc::new(arg.clone());

        let results: Vec<ShardSearchResult> = self
            .fan_out("search", |shard| {
                let arg = arg.clone();
                async move { shard.call(ENDPOINT_SEARCH, arg.as_ref()).await }
            })
            .await?;

        Ok(SearchGroup(results))
    }

    /// Applies `mutation` on every shard. Replies carry nothing; only errors matter.
    pub async fn call_multiple(&self, mutation: &Mutation) -> Result<()> {
        let endpoint = mutation.endpoint();
        let mutation = Arc::new(mutation.clone());

        self.fan_out(endpoint, |shard| {
            let mutation = mutation.clone();
            async move {
                match mutation.as_ref() {
                    Mutation::AddDocument(req) => shard.call::<_, ()>(endpoint, req).await,
                    Mutation::DeleteDocument(req) => shard.call::<_, ()>(endpoint, req).await,
                    Mutation::Associate(req) => shard.call::<_, ()>(endpoint, req).await,
                }
            }
        })
        .await?;

        Ok(())
    }

    /// Pages through the rows of all shards, one shard after another.
    pub async fn get_rows(&self, params: &HashMap<String, String>) -> Result<ListResult> {
        let query = ListQuery::from_params(params);
        let mut result = ListResult::empty();
        let mut remaining_start = query.start;

        for shard in &self.shards {
            if result.rows.len() >= query.limit {
                break;
            }

            let page: ListResult = shard
                .call(
                    ENDPOINT_LIST,
                    &ListQuery {
                        start: remaining_start,
                        limit: query.limit - result.rows.len(),
                    },
                )
                .await?;

            result.total_rows += page.total_rows;
            remaining_start = remaining_start.saturating_sub(page.total_rows);
            result.rows.extend(page.rows);
        }

        result.rows.truncate(query.limit);
        Ok(result)
    }

    /// Association counts summed over all shards, ordered by `(source, target)`.
    pub async fn associations(
        &self,
        source: Vec<DoctypeRange>,
        target: Vec<DoctypeRange>,
    ) -> Result<Vec<Association>> {
        let req = Arc::new(AssociateRequest { source, target });

        let per_shard: Vec<Vec<Association>> = self
            .fan_out("associations", |shard| {
                let req = req.clone();
                async move { shard.call(ENDPOINT_ASSOCIATIONS, req.as_ref()).await }
            })
            .await?;

        let mut totals: BTreeMap<(DocumentId, DocumentId), u32> = BTreeMap::new();
        for association in per_shard.into_iter().flatten() {
            *totals
                .entry((association.source, association.target))
                .or_insert(0) += association.shared;
        }

        Ok(totals
            .into_iter()
            .map(|((source, target), shared)| Association {
                source,
                target,
                shared,
            })
            .collect())
    }

    /// Connections are pooled by reqwest; dropping the client closes them.
    pub fn close(self) {
        tracing::info!("Closing posting client ({} shards)", self.shards.len());
    }
}
