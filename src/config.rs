//! Cluster Configuration
//!
//! Everything a process needs to bring up its shards, the posting client, the
//! queue workers and the API listener. Built from command line arguments by the
//! binary and constructed directly by tests.

use crate::error::{ClusterError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_SHARD_ADDRS: [&str; 2] = ["127.0.0.1:9001", "127.0.0.1:9002"];
pub const DEFAULT_WINDOW: usize = 16;

/// Process-wide configuration.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Address the HTTP API listens on.
    pub api_addr: SocketAddr,
    /// One listen address per posting shard; index in this list is the shard index.
    pub shards: Vec<SocketAddr>,
    /// Number of queue worker tasks.
    pub worker_count: usize,
    /// How long an idle worker sleeps before polling the queue again.
    pub poll_interval: Duration,
    /// Hard deadline for a single shard RPC.
    pub rpc_timeout: Duration,
    /// Send attempts per shard RPC on transport failure.
    pub rpc_attempts: usize,
    /// Lease granted to a worker when it claims a queue item.
    pub lease: Duration,
    /// Shingle width in characters.
    pub window: usize,
    /// Root of the journals. `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    pub corpus: CorpusConfig,
}

/// Shape of the synthetic corpus generated by a TestCorpus item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusConfig {
    pub doctypes: u32,
    pub documents_per_doctype: u32,
    pub words_per_document: usize,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            doctypes: 10,
            documents_per_doctype: 10,
            words_per_document: 40,
        }
    }
}

/// Configuration handed to a shard by the `Init` RPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardConfig {
    pub index: usize,
    pub count: usize,
    pub address: SocketAddr,
    pub window: usize,
    pub data_dir: Option<PathBuf>,
}

impl ShardConfig {
    /// Journal file for this shard, if persistence is enabled.
    pub fn journal_path(&self) -> Option<PathBuf> {
        self.data_dir
            .as_ref()
            .map(|dir| dir.join(format!("shard-{:03}.journal", self.index)))
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            api_addr: parse_addr(DEFAULT_API_ADDR),
            shards: DEFAULT_SHARD_ADDRS.iter().map(|a| parse_addr(a)).collect(),
            worker_count: 4,
            poll_interval: Duration::from_millis(100),
            rpc_timeout: Duration::from_secs(10),
            rpc_attempts: 3,
            lease: Duration::from_secs(30),
            window: DEFAULT_WINDOW,
            data_dir: None,
            corpus: CorpusConfig::default(),
        }
    }
}

fn parse_addr(addr: &str) -> SocketAddr {
    addr.parse()
        .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 0)))
}

impl ClusterConfig {
    /// Builds a configuration from `std::env::args()`-style arguments.
    ///
    /// The first element is the program name and is skipped. Passing any
    /// `--shard` replaces the default shard list.
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut config = ClusterConfig::default();
        let mut shards: Vec<SocketAddr> = vec![];

        let mut i = 1;
        while i < args.len() {
            let flag = args[i].as_str();
            let value = || {
                args.get(i + 1)
                    .map(|v| v.as_str())
                    .ok_or_else(|| ClusterError::Config(format!("{} requires a value", flag)))
            };
            match flag {
                "--api" => config.api_addr = parse_value(flag, value()?)?,
                "--shard" => shards.push(parse_value(flag, value()?)?),
                "--workers" => config.worker_count = parse_value(flag, value()?)?,
                "--poll-ms" => config.poll_interval = millis(flag, value()?)?,
                "--rpc-timeout-ms" => config.rpc_timeout = millis(flag, value()?)?,
                "--rpc-attempts" => config.rpc_attempts = parse_value(flag, value()?)?,
                "--lease-ms" => config.lease = millis(flag, value()?)?,
                "--window" => config.window = parse_value(flag, value()?)?,
                "--data-dir" => config.data_dir = Some(PathBuf::from(value()?)),
                "--corpus-doctypes" => config.corpus.doctypes = parse_value(flag, value()?)?,
                "--corpus-documents" => {
                    config.corpus.documents_per_doctype = parse_value(flag, value()?)?
                }
                _ => {
                    tracing::warn!("Ignoring unknown argument {}", flag);
                    i += 1;
                    continue;
                }
            }
            i += 2;
        }

        if !shards.is_empty() {
            config.shards = shards;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.shards.is_empty() {
            return Err(ClusterError::Config("at least one shard is required".into()));
        }
        if self.worker_count == 0 {
            return Err(ClusterError::Config("--workers must be at least 1".into()));
        }
        if self.window == 0 {
            return Err(ClusterError::Config("--window must be at least 1".into()));
        }
        if self.rpc_attempts == 0 {
            return Err(ClusterError::Config("--rpc-attempts must be at least 1".into()));
        }
        Ok(())
    }

    /// The `Init` payload for shard `index`.
    pub fn shard_config(&self, index: usize) -> ShardConfig {
        ShardConfig {
            index,
            count: self.shards.len(),
            address: self.shards[index],
            window: self.window,
            data_dir: self.data_dir.clone(),
        }
    }

    pub fn shard_configs(&self) -> Vec<ShardConfig> {
        (0..self.shards.len()).map(|i| self.shard_config(i)).collect()
    }

    pub fn queue_journal_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join("queue.journal"))
    }

    pub fn document_journal_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join("documents.journal"))
    }
}

fn parse_value<T: FromStr>(flag: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| ClusterError::Config(format!("invalid value for {}: {}", flag, e)))
}

fn millis(flag: &str, value: &str) -> Result<Duration> {
    parse_value::<u64>(flag, value).map(Duration::from_millis)
}
