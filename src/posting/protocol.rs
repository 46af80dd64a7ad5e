//! Posting RPC Protocol
//!
//! Endpoints and Data Transfer Objects exchanged between the posting client and
//! the shards. Every endpoint takes a JSON body and answers with an
//! [`RpcReply`], so an execution error on the shard is distinguishable from a
//! successful but empty answer and from a transport failure.

use crate::document::types::{DoctypeRange, DocumentId};
use crate::error::{ClusterError, Result};

use serde::{Deserialize, Serialize};

pub const ENDPOINT_INIT: &str = "/posting/init";
pub const ENDPOINT_SEARCH: &str = "/posting/search";
pub const ENDPOINT_LIST: &str = "/posting/list";
pub const ENDPOINT_ADD: &str = "/posting/add";
pub const ENDPOINT_DELETE: &str = "/posting/delete";
pub const ENDPOINT_ASSOCIATE: &str = "/posting/associate";
pub const ENDPOINT_ASSOCIATIONS: &str = "/posting/associations";

/// Reply envelope for every shard RPC.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RpcReply<T> {
    Ok { result: T },
    Error { error: String },
}

impl<T> RpcReply<T> {
    pub fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(result) => RpcReply::Ok { result },
            Err(e) => RpcReply::Error {
                error: e.to_string(),
            },
        }
    }

    /// Converts an error reply from shard `shard` into a `ShardExecution` error.
    pub fn into_result(self, shard: usize) -> Result<T> {
        match self {
            RpcReply::Ok { result } => Ok(result),
            RpcReply::Error { error } => Err(ClusterError::ShardExecution {
                shard,
                message: error,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AddDocumentRequest {
    pub id: DocumentId,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeleteDocumentRequest {
    pub id: DocumentId,
}

/// Doctype ranges whose documents should be associated with each other.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssociateRequest {
    pub source: Vec<DoctypeRange>,
    pub target: Vec<DoctypeRange>,
}

/// A change applied to every shard by `PostingClient::call_multiple`.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    AddDocument(AddDocumentRequest),
    DeleteDocument(DeleteDocumentRequest),
    Associate(AssociateRequest),
}

impl Mutation {
    pub fn add(id: DocumentId, text: impl Into<String>) -> Self {
        Mutation::AddDocument(AddDocumentRequest {
            id,
            text: text.into(),
        })
    }

    pub fn delete(id: DocumentId) -> Self {
        Mutation::DeleteDocument(DeleteDocumentRequest { id })
    }

    pub fn associate(source: Vec<DoctypeRange>, target: Vec<DoctypeRange>) -> Self {
        Mutation::Associate(AssociateRequest { source, target })
    }

    pub fn endpoint(&self) -> &'static str {
        match self {
            Mutation::AddDocument(_) => ENDPOINT_ADD,
            Mutation::DeleteDocument(_) => ENDPOINT_DELETE,
            Mutation::Associate(_) => ENDPOINT_ASSOCIATE,
        }
    }
}
