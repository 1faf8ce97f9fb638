//! The search-engine collaborator seam.
//!
//! [`SearchTransport`] is the only way the single-record operations, the bulk
//! engine and the repositories reach the engine. The Elasticsearch client in
//! [`backends`](crate::backends) implements it; tests substitute an in-memory
//! engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::core::codec::DocumentBody;
use crate::error::{StorageError, StorageResult};

/// A raw engine answer: HTTP-like status plus the parsed JSON body.
///
/// Transports return every status; classifying 404/409/5xx is up to the
/// caller. An empty body is `Value::Null`.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineResponse {
    /// Status code of the answer.
    pub status: u16,
    /// Parsed body.
    pub body: Value,
}

impl EngineResponse {
    /// Creates a response.
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Converts a non-2xx answer into [`StorageError::Response`].
    pub fn error_for_status(self) -> StorageResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(self.into_error())
        }
    }

    /// Converts this answer into a response error carrying the body verbatim.
    pub fn into_error(self) -> StorageError {
        let body = match self.body {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        };
        StorageError::Response {
            status: self.status,
            body,
        }
    }
}

/// A single-document write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRequest {
    /// Create a document. With `id: None` the engine assigns the key.
    Create {
        /// Target index.
        index: String,
        /// Document key, or `None` for an engine-assigned key.
        id: Option<String>,
        /// Document body.
        body: DocumentBody,
    },
    /// Partially update a document, optionally creating it.
    Update {
        /// Target index.
        index: String,
        /// Document key.
        id: String,
        /// Fields to merge into the stored document.
        doc: DocumentBody,
        /// Create the document from `doc` when it does not exist.
        upsert: bool,
    },
    /// Delete a document.
    Delete {
        /// Target index.
        index: String,
        /// Document key.
        id: String,
    },
}

/// How a bulk item is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
    /// Fails per item when the key already exists.
    Create,
    /// Creates or replaces.
    Index,
}

impl BulkAction {
    /// Returns the bulk API action name.
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkAction::Create => "create",
            BulkAction::Index => "index",
        }
    }
}

/// One item handed to a [`BulkChannel`].
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItem {
    /// Input position of the record this item was built from.
    pub position: usize,
    /// Write action.
    pub action: BulkAction,
    /// Document key.
    pub document_id: String,
    /// Document body without the identifier field.
    pub body: DocumentBody,
}

/// Per-item verdict reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    /// The engine accepted the item.
    Succeeded,
    /// The engine rejected the item, or its batch never reached the engine.
    Failed {
        /// Engine error or transport failure message.
        reason: String,
    },
}

/// The outcome of one bulk item, tagged with its input position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    /// Input position of the item.
    pub position: usize,
    /// Document key of the item.
    pub document_id: String,
    /// What happened to it.
    pub status: ItemStatus,
}

impl ItemOutcome {
    /// Creates a success outcome.
    pub fn succeeded(position: usize, document_id: impl Into<String>) -> Self {
        Self {
            position,
            document_id: document_id.into(),
            status: ItemStatus::Succeeded,
        }
    }

    /// Creates a failure outcome.
    pub fn failed(
        position: usize,
        document_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            position,
            document_id: document_id.into(),
            status: ItemStatus::Failed {
                reason: reason.into(),
            },
        }
    }

    /// Returns true if the item succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self.status, ItemStatus::Succeeded)
    }
}

/// Tuning for a batch-write channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkConfig {
    /// Number of batches allowed in flight at once (default: 4).
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Items per dispatched batch (default: 500).
    #[serde(default = "default_flush_items")]
    pub flush_items: usize,

    /// Capacity of the outcome channel (default: 1024).
    #[serde(default = "default_outcome_buffer")]
    pub outcome_buffer: usize,
}

fn default_workers() -> usize {
    4
}

fn default_flush_items() -> usize {
    500
}

fn default_outcome_buffer() -> usize {
    1024
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            flush_items: default_flush_items(),
            outcome_buffer: default_outcome_buffer(),
        }
    }
}

impl BulkConfig {
    /// Rejects settings a channel cannot run with.
    pub fn validate(&self) -> StorageResult<()> {
        if self.workers == 0 {
            return Err(StorageError::configuration("bulk workers must be at least 1"));
        }
        if self.flush_items == 0 {
            return Err(StorageError::configuration(
                "bulk flush_items must be at least 1",
            ));
        }
        if self.outcome_buffer == 0 {
            return Err(StorageError::configuration(
                "bulk outcome_buffer must be at least 1",
            ));
        }
        Ok(())
    }
}

/// The search-engine collaborator.
#[async_trait]
pub trait SearchTransport: Send + Sync {
    /// Checks that the engine is reachable.
    async fn ping(&self) -> StorageResult<()>;

    /// Asks whether a document exists. The body carries `{"found": bool}`.
    async fn exists(&self, index: &str, id: &str) -> StorageResult<EngineResponse>;

    /// Fetches a document by key.
    async fn get(&self, index: &str, id: &str) -> StorageResult<EngineResponse>;

    /// Runs a search. `track_total_hits` asks for an exact total.
    async fn search(
        &self,
        indices: &[&str],
        query: &Value,
        track_total_hits: bool,
    ) -> StorageResult<EngineResponse>;

    /// Performs a single-document write.
    async fn write(&self, request: WriteRequest) -> StorageResult<EngineResponse>;

    /// Opens a batch-write channel for one index.
    ///
    /// Every item accepted by the channel gets exactly one outcome on
    /// `outcomes`, sent before [`BulkChannel::close`] returns.
    async fn open_bulk(
        &self,
        index: &str,
        config: &BulkConfig,
        outcomes: mpsc::Sender<ItemOutcome>,
    ) -> StorageResult<Box<dyn BulkChannel>>;
}

/// An open batch-write channel.
#[async_trait]
pub trait BulkChannel: Send {
    /// Enqueues an item, possibly dispatching a batch.
    ///
    /// An `Err` means the item was not accepted and no outcome will be sent
    /// for it.
    async fn add(&mut self, item: BulkItem) -> StorageResult<()>;

    /// Flushes pending items and waits for every dispatched batch.
    async fn close(self: Box<Self>) -> StorageResult<()>;
}
