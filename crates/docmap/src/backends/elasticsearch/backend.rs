//! Elasticsearch client setup and the single-request operations.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use elasticsearch::auth::Credentials;
use elasticsearch::cert::CertificateValidation;
use elasticsearch::http::response::Response;
use elasticsearch::http::transport::{SingleNodeConnectionPool, TransportBuilder};
use elasticsearch::params::Refresh;
use elasticsearch::{
    CreateParts, DeleteParts, Elasticsearch, ExistsParts, GetParts, IndexParts, SearchParts,
    UpdateParts,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::debug;

use crate::core::transport::{
    BulkChannel, BulkConfig, EngineResponse, ItemOutcome, SearchTransport, WriteRequest,
};
use crate::error::{StorageError, StorageResult};

use super::bulk::ElasticsearchBulkChannel;

/// Authentication configuration for Elasticsearch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElasticsearchAuth {
    /// Basic username/password authentication.
    Basic {
        /// The username for basic auth.
        username: String,
        /// The password for basic auth.
        password: String,
    },
    /// Bearer token authentication.
    Bearer {
        /// The bearer token.
        token: String,
    },
}

/// Configuration for the Elasticsearch transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElasticsearchConfig {
    /// Elasticsearch node URLs (e.g., `["http://localhost:9200"]`).
    /// Currently uses the first node (single-node connection pool).
    pub nodes: Vec<String>,

    /// Request timeout in milliseconds (default: 60000).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Optional authentication.
    #[serde(default)]
    pub auth: Option<ElasticsearchAuth>,

    /// Whether to disable certificate validation (default: false).
    /// Only use for development/testing.
    #[serde(default)]
    pub disable_certificate_validation: bool,

    /// Ask the engine to refresh after every write (default: true), so
    /// writes are visible to the next search.
    #[serde(default = "default_refresh_on_write")]
    pub refresh_on_write: bool,
}

fn default_request_timeout_ms() -> u64 {
    60000
}

fn default_refresh_on_write() -> bool {
    true
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            nodes: vec!["http://localhost:9200".to_string()],
            request_timeout_ms: default_request_timeout_ms(),
            auth: None,
            disable_certificate_validation: false,
            refresh_on_write: default_refresh_on_write(),
        }
    }
}

/// [`SearchTransport`] over the official Elasticsearch client.
#[derive(Clone)]
pub struct ElasticsearchTransport {
    client: Elasticsearch,
    config: ElasticsearchConfig,
}

impl Debug for ElasticsearchTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElasticsearchTransport")
            .field("nodes", &self.config.nodes)
            .field("refresh_on_write", &self.config.refresh_on_write)
            .finish_non_exhaustive()
    }
}

impl ElasticsearchTransport {
    /// Creates a transport. Does not connect.
    pub fn new(config: ElasticsearchConfig) -> StorageResult<Self> {
        let client = Self::build_client(&config)?;
        Ok(Self { client, config })
    }

    /// Builds the Elasticsearch client from configuration.
    fn build_client(config: &ElasticsearchConfig) -> StorageResult<Elasticsearch> {
        let url = config
            .nodes
            .first()
            .cloned()
            .unwrap_or_else(|| "http://localhost:9200".to_string());

        let parsed_url: elasticsearch::http::Url = url
            .parse()
            .map_err(|e| StorageError::configuration(format!("Invalid URL {}: {}", url, e)))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);

        let mut builder = TransportBuilder::new(conn_pool)
            .timeout(Duration::from_millis(config.request_timeout_ms));

        if config.disable_certificate_validation {
            builder = builder.cert_validation(CertificateValidation::None);
        }

        if let Some(ref auth) = config.auth {
            builder = match auth {
                ElasticsearchAuth::Basic { username, password } => {
                    builder.auth(Credentials::Basic(username.clone(), password.clone()))
                }
                ElasticsearchAuth::Bearer { token } => {
                    builder.auth(Credentials::Bearer(token.clone()))
                }
            };
        }

        let transport = builder.build().map_err(|e| {
            StorageError::configuration(format!("Failed to build transport: {}", e))
        })?;

        Ok(Elasticsearch::new(transport))
    }

    /// Returns the transport configuration.
    pub fn config(&self) -> &ElasticsearchConfig {
        &self.config
    }

    fn refresh(&self) -> Option<Refresh> {
        self.config.refresh_on_write.then_some(Refresh::True)
    }
}

/// Reads status and body. An empty body is `null`, a non-JSON body is kept
/// as a string.
pub(super) async fn engine_response(response: Response) -> StorageResult<EngineResponse> {
    let status = response.status_code().as_u16();
    let text = response.text().await?;
    Ok(EngineResponse::new(status, parse_body(text)))
}

fn parse_body(text: String) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

/// The exists API answers with an empty body; turn it into `{"found": ...}`.
fn exists_response(status: u16) -> EngineResponse {
    match status {
        200 => EngineResponse::new(status, json!({ "found": true })),
        404 => EngineResponse::new(status, json!({ "found": false })),
        other => EngineResponse::new(other, Value::Null),
    }
}

/// Adds total-hit tracking to a literal query document.
fn search_body(query: &Value, track_total_hits: bool) -> Value {
    let mut body = query.clone();
    if track_total_hits {
        if let Some(map) = body.as_object_mut() {
            map.insert("track_total_hits".to_string(), Value::Bool(true));
        }
    }
    body
}

#[async_trait]
impl SearchTransport for ElasticsearchTransport {
    async fn ping(&self) -> StorageResult<()> {
        let response = self.client.ping().send().await?;
        engine_response(response).await?.error_for_status()?;
        Ok(())
    }

    async fn exists(&self, index: &str, id: &str) -> StorageResult<EngineResponse> {
        let response = self
            .client
            .exists(ExistsParts::IndexId(index, id))
            .send()
            .await?;
        Ok(exists_response(response.status_code().as_u16()))
    }

    async fn get(&self, index: &str, id: &str) -> StorageResult<EngineResponse> {
        let response = self.client.get(GetParts::IndexId(index, id)).send().await?;
        engine_response(response).await
    }

    async fn search(
        &self,
        indices: &[&str],
        query: &Value,
        track_total_hits: bool,
    ) -> StorageResult<EngineResponse> {
        let response = self
            .client
            .search(SearchParts::Index(indices))
            .body(search_body(query, track_total_hits))
            .send()
            .await?;
        engine_response(response).await
    }

    async fn write(&self, request: WriteRequest) -> StorageResult<EngineResponse> {
        let response = match request {
            WriteRequest::Create {
                index,
                id: Some(id),
                body,
            } => {
                debug!(index = %index, id = %id, "Creating document");
                let mut req = self
                    .client
                    .create(CreateParts::IndexId(&index, &id))
                    .body(Value::Object(body));
                if let Some(refresh) = self.refresh() {
                    req = req.refresh(refresh);
                }
                req.send().await?
            }
            WriteRequest::Create {
                index,
                id: None,
                body,
            } => {
                debug!(index = %index, "Indexing document with generated id");
                let mut req = self
                    .client
                    .index(IndexParts::Index(&index))
                    .body(Value::Object(body));
                if let Some(refresh) = self.refresh() {
                    req = req.refresh(refresh);
                }
                req.send().await?
            }
            WriteRequest::Update {
                index,
                id,
                doc,
                upsert,
            } => {
                debug!(index = %index, id = %id, upsert, "Updating document");
                let mut req = self
                    .client
                    .update(UpdateParts::IndexId(&index, &id))
                    .body(json!({ "doc": doc, "doc_as_upsert": upsert }));
                if let Some(refresh) = self.refresh() {
                    req = req.refresh(refresh);
                }
                req.send().await?
            }
            WriteRequest::Delete { index, id } => {
                debug!(index = %index, id = %id, "Deleting document");
                let mut req = self.client.delete(DeleteParts::IndexId(&index, &id));
                if let Some(refresh) = self.refresh() {
                    req = req.refresh(refresh);
                }
                req.send().await?
            }
        };
        engine_response(response).await
    }

    async fn open_bulk(
        &self,
        index: &str,
        config: &BulkConfig,
        outcomes: mpsc::Sender<ItemOutcome>,
    ) -> StorageResult<Box<dyn BulkChannel>> {
        config.validate()?;
        Ok(Box::new(ElasticsearchBulkChannel::new(
            self.client.clone(),
            index,
            config,
            self.refresh(),
            outcomes,
        )))
    }
}
