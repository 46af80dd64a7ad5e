use crate::document::types::DocumentId;
use crate::error::{ClusterError, Result};

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

pub const DEFAULT_QUEUE_LIMIT: usize = 100;

static ITEM_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-f]{24}$").expect("queue id pattern is valid"));

/// Identifier of a queue item: 24 lowercase hex characters.
///
/// The first eight encode the creation second, the rest are random.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct QueueItemId(pub String);

impl QueueItemId {
    pub fn new() -> Self {
        let secs = crate::now_ms() / 1000;
        Self(format!("{:08x}{:016x}", secs as u32, rand::random::<u64>()))
    }

    pub fn parse(value: &str) -> Result<Self> {
        if !ITEM_ID_PATTERN.is_match(value) {
            return Err(ClusterError::Validation(format!(
                "invalid queue item id '{}'",
                value
            )));
        }
        Ok(Self(value.to_string()))
    }
}

impl Default for QueueItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QueueItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a queue item asks the workers to do.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Action {
    AddDocument,
    DeleteDocument,
    AssociateDocument,
    TestCorpus,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::AddDocument,
        Action::DeleteDocument,
        Action::AssociateDocument,
        Action::TestCorpus,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Action::AddDocument => "Add Document",
            Action::DeleteDocument => "Delete Document",
            Action::AssociateDocument => "Associate Document",
            Action::TestCorpus => "Test Corpus",
        }
    }

    /// Whether the item must name the document it acts on.
    pub fn needs_target(&self) -> bool {
        matches!(self, Action::AddDocument | Action::DeleteDocument)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Action {
    type Err = ClusterError;

    /// Accepts "Add Document" as well as "AddDocument", in any case.
    fn from_str(s: &str) -> Result<Self> {
        let wanted: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();

        Action::ALL
            .into_iter()
            .find(|action| action.name().replace(' ', "").to_lowercase() == wanted)
            .ok_or_else(|| ClusterError::Validation(format!("unknown action '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueueStatus {
    Queued,
    /// Claimed by a worker that holds an unexpired lease.
    InProgress,
    Completed,
    Failed,
}

impl QueueStatus {
    pub const ALL: [QueueStatus; 4] = [
        QueueStatus::Queued,
        QueueStatus::InProgress,
        QueueStatus::Completed,
        QueueStatus::Failed,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            QueueStatus::Queued => "Queued",
            QueueStatus::InProgress => "InProgress",
            QueueStatus::Completed => "Completed",
            QueueStatus::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QueueStatus::Completed | QueueStatus::Failed)
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for QueueStatus {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self> {
        QueueStatus::ALL
            .into_iter()
            .find(|status| status.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ClusterError::Validation(format!("unknown status '{}'", s)))
    }
}

/// One requested mutation and its progress.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: QueueItemId,
    /// Submission order; workers claim the lowest claimable sequence first.
    pub sequence: u64,
    pub action: Action,
    pub source: Option<DocumentId>,
    pub target: Option<DocumentId>,
    /// Doctype range expression, empty unless the action is AssociateDocument.
    pub association_source: String,
    pub association_target: String,
    #[serde(with = "payload_base64")]
    pub payload: Vec<u8>,
    pub status: QueueStatus,
    pub error: Option<String>,
    /// Where the result can be fetched once the item completed.
    pub location: Option<String>,
    pub created_at: u64,
    pub claimed_at: Option<u64>,
    pub lease_expires: Option<u64>,
    pub completed_at: Option<u64>,
}

impl QueueItem {
    /// Payload as text, with invalid UTF-8 replaced.
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    /// Queued, or in progress under a lease that ran out.
    pub fn is_claimable(&self, now: u64) -> bool {
        match self.status {
            QueueStatus::Queued => true,
            QueueStatus::InProgress => self.lease_expires.is_some_and(|lease| now > lease),
            QueueStatus::Completed | QueueStatus::Failed => false,
        }
    }
}

mod payload_base64 {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// Page request for `GetQueue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFilter {
    pub start: usize,
    pub limit: usize,
    pub status: Option<QueueStatus>,
}

impl Default for QueueFilter {
    fn default() -> Self {
        Self {
            start: 0,
            limit: DEFAULT_QUEUE_LIMIT,
            status: None,
        }
    }
}

impl QueueFilter {
    /// `start` and `limit` fall back to defaults when undecodable; an unknown
    /// `status` is rejected.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self> {
        let mut filter = QueueFilter::default();
        if let Some(start) = params.get("start").and_then(|v| v.parse().ok()) {
            filter.start = start;
        }
        if let Some(limit) = params.get("limit").and_then(|v| v.parse().ok()) {
            filter.limit = limit;
        }
        if let Some(status) = params.get("status").filter(|s| !s.is_empty()) {
            filter.status = Some(status.parse()?);
        }
        Ok(filter)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueuePage {
    pub success: bool,
    pub total_rows: usize,
    pub items: Vec<QueueItem>,
}

/// Item count per status name. Every status is present, zero or not.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct QueueStats(pub BTreeMap<String, usize>);

impl QueueStats {
    pub fn empty() -> Self {
        Self(
            QueueStatus::ALL
                .iter()
                .map(|status| (status.name().to_string(), 0))
                .collect(),
        )
    }

    pub fn record(&mut self, status: QueueStatus) {
        *self.0.entry(status.name().to_string()).or_insert(0) += 1;
    }

    pub fn get(&self, status: QueueStatus) -> usize {
        self.0.get(status.name()).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }
}
