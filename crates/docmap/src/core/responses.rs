//! Typed engine response envelopes.
//!
//! Only the fields the operations read are modelled; everything else in an
//! engine answer is ignored.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{StorageError, StorageResult};

/// Answer to an existence check.
#[derive(Debug, Clone, Deserialize)]
pub struct ExistsResponse {
    /// Whether the document exists.
    #[serde(default)]
    pub found: bool,
}

/// Answer to a get-by-key.
#[derive(Debug, Clone, Deserialize)]
pub struct GetResponse {
    /// Whether the document exists.
    #[serde(default)]
    pub found: bool,
    /// Document key.
    #[serde(rename = "_id", default)]
    pub id: String,
    /// Stored document, present when found.
    #[serde(rename = "_source", default)]
    pub source: Option<Value>,
}

/// Answer to a search.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    /// Matching documents.
    pub hits: SearchHits,
}

/// The `hits` section of a search answer.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchHits {
    /// Total match count, present when tracked.
    #[serde(default)]
    pub total: Option<TotalHits>,
    /// The returned page of hits.
    #[serde(default)]
    pub hits: Vec<SearchHit>,
}

impl SearchHits {
    /// Returns the tracked total, or 0 when the engine did not report one.
    pub fn total_value(&self) -> u64 {
        self.total.as_ref().map(|t| t.value).unwrap_or(0)
    }
}

/// Total hit count.
#[derive(Debug, Clone, Deserialize)]
pub struct TotalHits {
    /// Number of matching documents.
    pub value: u64,
}

/// One search hit.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    /// Document key.
    #[serde(rename = "_id", default)]
    pub id: String,
    /// Stored document.
    #[serde(rename = "_source", default)]
    pub source: Value,
    /// Sort values, present for sorted searches.
    #[serde(default)]
    pub sort: Option<Vec<Value>>,
}

impl SearchHit {
    /// Rebuilds the hit object in the `{"_id", "_source"}` shape the codec
    /// decodes.
    pub fn to_hit_value(&self) -> Value {
        serde_json::json!({ "_id": self.id, "_source": self.source })
    }
}

/// Answer to a create.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateResponse {
    /// Document version after the write.
    #[serde(rename = "_version")]
    pub version: i64,
    /// Assigned or given key.
    #[serde(rename = "_id", default)]
    pub id: String,
    /// `created`, `updated`, ...
    #[serde(default)]
    pub result: Option<String>,
}

/// Shard acknowledgement of an update or delete.
#[derive(Debug, Clone, Deserialize)]
pub struct WriteAck {
    /// Shard counts.
    #[serde(rename = "_shards")]
    pub shards: ShardsAck,
}

/// Shard counts of a write.
#[derive(Debug, Clone, Deserialize)]
pub struct ShardsAck {
    /// Shards the write was applied on.
    pub successful: i64,
    /// Shards the write targeted.
    #[serde(default)]
    pub total: i64,
    /// Shards the write failed on.
    #[serde(default)]
    pub failed: i64,
}

/// Parses an engine body into an envelope, naming the envelope on failure.
pub fn parse_envelope<R: DeserializeOwned>(kind: &str, body: &Value) -> StorageResult<R> {
    R::deserialize(body).map_err(|e| StorageError::decode(format!("malformed {kind} response: {e}")))
}
