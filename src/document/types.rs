use crate::error::{ClusterError, Result};

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// `N` or `N-M`, optionally joined with `:`.
static RANGE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+(-\d+)?(:\d+(-\d+)?)*$").expect("range pattern is valid")
});

pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Identity of a document within a doctype namespace.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId {
    pub doctype: u32,
    pub docid: u32,
}

impl DocumentId {
    pub fn new(doctype: u32, docid: u32) -> Self {
        Self { doctype, docid }
    }

    /// Addressable API path of the document.
    pub fn location(&self) -> String {
        format!("/document/{}/{}/", self.doctype, self.docid)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.doctype, self.docid)
    }
}

/// A stored document: metadata plus the text that was indexed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub doctype: u32,
    pub docid: u32,
    pub title: String,
    pub text: String,
    pub created_at: u64,
}

impl Document {
    pub fn new(id: DocumentId, payload: DocumentPayload) -> Self {
        Self {
            doctype: id.doctype,
            docid: id.docid,
            title: payload.title,
            text: payload.text,
            created_at: crate::now_ms(),
        }
    }

    pub fn id(&self) -> DocumentId {
        DocumentId::new(self.doctype, self.docid)
    }
}

/// Metadata-only view used when paging through the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub doctype: u32,
    pub docid: u32,
    pub title: String,
    pub bytes: usize,
    pub created_at: u64,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            doctype: doc.doctype,
            docid: doc.docid,
            title: doc.title.clone(),
            bytes: doc.text.len(),
            created_at: doc.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPage {
    pub success: bool,
    pub total_rows: usize,
    pub documents: Vec<DocumentSummary>,
}

/// Body of an AddDocument request (`title=...&text=...`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DocumentPayload {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
}

impl DocumentPayload {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
        }
    }

    /// Decodes a form-urlencoded request body.
    pub fn from_form(body: &[u8]) -> Result<Self> {
        serde_urlencoded::from_bytes(body)
            .map_err(|e| ClusterError::Validation(format!("invalid document payload: {}", e)))
    }

    pub fn to_form(&self) -> String {
        serde_urlencoded::to_string(self).unwrap_or_default()
    }
}

/// Inclusive doctype interval.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DoctypeRange {
    pub start: u32,
    pub end: u32,
}

impl DoctypeRange {
    pub fn single(doctype: u32) -> Self {
        Self {
            start: doctype,
            end: doctype,
        }
    }

    pub fn contains(&self, doctype: u32) -> bool {
        self.start <= doctype && doctype <= self.end
    }
}

impl fmt::Display for DoctypeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Parses a range expression such as `1`, `2-10` or `1:3-5:9`.
pub fn parse_ranges(expr: &str) -> Result<Vec<DoctypeRange>> {
    let expr = expr.trim();
    if !RANGE_PATTERN.is_match(expr) {
        return Err(ClusterError::Validation(format!(
            "invalid doctype range '{}'",
            expr
        )));
    }

    expr.split(':')
        .map(|part| {
            let (start, end) = match part.split_once('-') {
                Some((start, end)) => (parse_doctype(start)?, parse_doctype(end)?),
                None => {
                    let doctype = parse_doctype(part)?;
                    (doctype, doctype)
                }
            };
            if start > end {
                return Err(ClusterError::Validation(format!(
                    "doctype range '{}' is reversed",
                    part
                )));
            }
            Ok(DoctypeRange { start, end })
        })
        .collect()
}

fn parse_doctype(value: &str) -> Result<u32> {
    value
        .parse()
        .map_err(|_| ClusterError::Validation(format!("doctype '{}' out of range", value)))
}

/// True when `ranges` is empty (no filter) or any range contains `doctype`.
pub fn ranges_contain(ranges: &[DoctypeRange], doctype: u32) -> bool {
    ranges.is_empty() || ranges.iter().any(|r| r.contains(doctype))
}

pub fn format_ranges(ranges: &[DoctypeRange]) -> String {
    ranges
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(":")
}

/// A search query as sent to every shard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentArg {
    /// Stored document the query was taken from; excluded from its own results.
    pub id: Option<DocumentId>,
    pub text: String,
    /// Doctypes to search. Empty searches everything.
    pub doctypes: Vec<DoctypeRange>,
    /// Minimum score a result needs to be returned.
    pub threshold: f64,
    pub limit: usize,
}

impl DocumentArg {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: None,
            text: text.into(),
            doctypes: Vec::new(),
            threshold: 0.0,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    /// Builds a query from form/query parameters:
    /// `text`, `doctype` + `docid`, `doctypes`, `threshold`, `limit`.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self> {
        let mut arg = DocumentArg::new(params.get("text").cloned().unwrap_or_default());

        if let (Some(doctype), Some(docid)) = (params.get("doctype"), params.get("docid")) {
            arg.id = Some(DocumentId::new(parse_doctype(doctype)?, parse_docid(docid)?));
        }
        if let Some(doctypes) = params.get("doctypes").filter(|d| !d.is_empty()) {
            arg.doctypes = parse_ranges(doctypes)?;
        }
        if let Some(threshold) = params.get("threshold") {
            arg.threshold = threshold.parse().map_err(|_| {
                ClusterError::Validation(format!("invalid threshold '{}'", threshold))
            })?;
        }
        if let Some(limit) = params.get("limit") {
            arg.limit = limit
                .parse()
                .map_err(|_| ClusterError::Validation(format!("invalid limit '{}'", limit)))?;
        }

        Ok(arg)
    }

    pub fn wants(&self, id: &DocumentId) -> bool {
        self.id.as_ref() != Some(id) && ranges_contain(&self.doctypes, id.doctype)
    }
}

pub fn parse_docid(value: &str) -> Result<u32> {
    value
        .parse()
        .map_err(|_| ClusterError::Validation(format!("invalid docid '{}'", value)))
}
