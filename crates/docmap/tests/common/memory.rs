//! In-memory search engine.
//!
//! Answers the transport seam the way Elasticsearch does (statuses and
//! envelope shapes) without a network. Searches ignore the query and return
//! every document of the listed indices in key order, honouring `from` and
//! `size`. Bulk items are applied as they are added.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use tokio::sync::mpsc;

use helios_docmap::core::codec::DocumentBody;
use helios_docmap::core::{
    BulkAction, BulkChannel, BulkConfig, BulkItem, EngineResponse, ItemOutcome, SearchTransport,
    WriteRequest,
};
use helios_docmap::{StorageError, StorageResult};

#[derive(Default)]
struct State {
    indices: Mutex<HashMap<String, BTreeMap<String, DocumentBody>>>,
    requests: AtomicUsize,
    generated: AtomicUsize,
    fail_open: AtomicBool,
    fail_close: AtomicBool,
    ping_delay_ms: AtomicUsize,
    rejected: Mutex<HashSet<String>>,
    refused: Mutex<HashSet<String>>,
    silenced: Mutex<HashSet<String>>,
    bulk_items: Mutex<Vec<BulkItem>>,
}

/// An in-memory engine implementing [`SearchTransport`].
#[derive(Clone, Default)]
pub struct MemoryTransport {
    state: Arc<State>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of requests that reached the engine, bulk items included.
    pub fn request_count(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }

    /// Makes the next `open_bulk` calls fail.
    pub fn fail_open(&self) {
        self.state.fail_open.store(true, Ordering::SeqCst);
    }

    /// Makes bulk channels fail when closed.
    pub fn fail_close(&self) {
        self.state.fail_close.store(true, Ordering::SeqCst);
    }

    /// Delays every ping by `millis`.
    pub fn slow_ping(&self, millis: usize) {
        self.state.ping_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// The engine rejects bulk items with this key.
    pub fn reject(&self, id: &str) {
        self.state.rejected.lock().insert(id.to_string());
    }

    /// Bulk channels refuse to accept items with this key.
    pub fn refuse(&self, id: &str) {
        self.state.refused.lock().insert(id.to_string());
    }

    /// Bulk items with this key are applied but never reported.
    pub fn silence(&self, id: &str) {
        self.state.silenced.lock().insert(id.to_string());
    }

    /// Stores a document directly.
    pub fn put(&self, index: &str, id: &str, source: Value) {
        let body = match source {
            Value::Object(map) => map,
            other => panic!("document must be an object, got {other}"),
        };
        self.state
            .indices
            .lock()
            .entry(index.to_string())
            .or_default()
            .insert(id.to_string(), body);
    }

    /// Returns a stored document.
    pub fn document(&self, index: &str, id: &str) -> Option<DocumentBody> {
        self.state
            .indices
            .lock()
            .get(index)
            .and_then(|docs| docs.get(id))
            .cloned()
    }

    /// Number of documents in an index.
    pub fn count(&self, index: &str) -> usize {
        self.state
            .indices
            .lock()
            .get(index)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    /// Every item any bulk channel accepted, in order.
    pub fn bulk_items(&self) -> Vec<BulkItem> {
        self.state.bulk_items.lock().clone()
    }

    fn count_request(&self) {
        self.state.requests.fetch_add(1, Ordering::SeqCst);
    }
}

fn shards_ack(result: &str) -> Value {
    json!({
        "result": result,
        "_shards": { "total": 2, "successful": 1, "failed": 0 }
    })
}

#[async_trait]
impl SearchTransport for MemoryTransport {
    async fn ping(&self) -> StorageResult<()> {
        let delay = self.state.ping_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay as u64)).await;
        }
        Ok(())
    }

    async fn exists(&self, index: &str, id: &str) -> StorageResult<EngineResponse> {
        self.count_request();
        Ok(match self.document(index, id) {
            Some(_) => EngineResponse::new(200, json!({ "found": true })),
            None => EngineResponse::new(404, json!({ "found": false })),
        })
    }

    async fn get(&self, index: &str, id: &str) -> StorageResult<EngineResponse> {
        self.count_request();
        Ok(match self.document(index, id) {
            Some(source) => EngineResponse::new(
                200,
                json!({ "_index": index, "_id": id, "found": true, "_source": source }),
            ),
            None => EngineResponse::new(404, json!({ "_index": index, "_id": id, "found": false })),
        })
    }

    async fn search(
        &self,
        indices: &[&str],
        query: &Value,
        track_total_hits: bool,
    ) -> StorageResult<EngineResponse> {
        self.count_request();
        let all: Vec<Value> = {
            let guard = self.state.indices.lock();
            indices
                .iter()
                .filter_map(|index| guard.get(*index).map(|docs| (*index, docs)))
                .flat_map(|(index, docs)| {
                    docs.iter().map(move |(id, source)| {
                        json!({ "_index": index, "_id": id, "_source": source })
                    })
                })
                .collect()
        };
        let from = query.get("from").and_then(Value::as_u64).unwrap_or(0) as usize;
        let size = query
            .get("size")
            .and_then(Value::as_u64)
            .map(|s| s as usize)
            .unwrap_or(10_000);
        let total = all.len();
        let page: Vec<Value> = all.into_iter().skip(from).take(size).collect();

        let mut hits = Map::new();
        if track_total_hits {
            hits.insert("total".to_string(), json!({ "value": total, "relation": "eq" }));
        }
        hits.insert("hits".to_string(), Value::Array(page));
        Ok(EngineResponse::new(200, json!({ "took": 1, "hits": hits })))
    }

    async fn write(&self, request: WriteRequest) -> StorageResult<EngineResponse> {
        self.count_request();
        let mut indices = self.state.indices.lock();
        let response = match request {
            WriteRequest::Create { index, id, body } => {
                let docs = indices.entry(index).or_default();
                let id = id.unwrap_or_else(|| {
                    let n = self.state.generated.fetch_add(1, Ordering::SeqCst);
                    format!("generated-{}", n)
                });
                if docs.contains_key(&id) {
                    EngineResponse::new(
                        409,
                        json!({ "error": { "type": "version_conflict_engine_exception" }, "status": 409 }),
                    )
                } else {
                    docs.insert(id.clone(), body);
                    EngineResponse::new(
                        201,
                        json!({ "_id": id, "_version": 1, "result": "created" }),
                    )
                }
            }
            WriteRequest::Update {
                index,
                id,
                doc,
                upsert,
            } => {
                let docs = indices.entry(index).or_default();
                match docs.get_mut(&id) {
                    Some(stored) => {
                        stored.extend(doc);
                        EngineResponse::new(200, shards_ack("updated"))
                    }
                    None if upsert => {
                        docs.insert(id, doc);
                        EngineResponse::new(201, shards_ack("created"))
                    }
                    None => EngineResponse::new(
                        404,
                        json!({ "error": { "type": "document_missing_exception" }, "status": 404 }),
                    ),
                }
            }
            WriteRequest::Delete { index, id } => {
                let removed = indices.get_mut(&index).and_then(|docs| docs.remove(&id));
                match removed {
                    Some(_) => EngineResponse::new(200, shards_ack("deleted")),
                    None => EngineResponse::new(404, shards_ack("not_found")),
                }
            }
        };
        Ok(response)
    }

    async fn open_bulk(
        &self,
        index: &str,
        config: &BulkConfig,
        outcomes: mpsc::Sender<ItemOutcome>,
    ) -> StorageResult<Box<dyn BulkChannel>> {
        if self.state.fail_open.load(Ordering::SeqCst) {
            return Err(StorageError::configuration("bulk indexer could not be created"));
        }
        config.validate()?;
        Ok(Box::new(MemoryBulkChannel {
            transport: self.clone(),
            index: index.to_string(),
            outcomes,
        }))
    }
}

struct MemoryBulkChannel {
    transport: MemoryTransport,
    index: String,
    outcomes: mpsc::Sender<ItemOutcome>,
}

impl MemoryBulkChannel {
    fn apply(&self, item: &BulkItem) -> ItemOutcome {
        let state = &self.transport.state;
        if state.rejected.lock().contains(&item.document_id) {
            return ItemOutcome::failed(item.position, &item.document_id, "rejected by engine");
        }
        let mut indices = state.indices.lock();
        let docs = indices.entry(self.index.clone()).or_default();
        match item.action {
            BulkAction::Create if docs.contains_key(&item.document_id) => ItemOutcome::failed(
                item.position,
                &item.document_id,
                "version_conflict_engine_exception",
            ),
            BulkAction::Create | BulkAction::Index => {
                docs.insert(item.document_id.clone(), item.body.clone());
                ItemOutcome::succeeded(item.position, &item.document_id)
            }
        }
    }
}

#[async_trait]
impl BulkChannel for MemoryBulkChannel {
    async fn add(&mut self, item: BulkItem) -> StorageResult<()> {
        let state = &self.transport.state;
        if state.refused.lock().contains(&item.document_id) {
            return Err(StorageError::transport("bulk indexer refused item"));
        }
        self.transport.count_request();
        state.bulk_items.lock().push(item.clone());

        let outcome = self.apply(&item);
        if state.silenced.lock().contains(&item.document_id) {
            return Ok(());
        }
        self.outcomes
            .send(outcome)
            .await
            .map_err(|e| StorageError::transport(format!("outcome receiver gone: {}", e)))
    }

    async fn close(self: Box<Self>) -> StorageResult<()> {
        if self.transport.state.fail_close.load(Ordering::SeqCst) {
            return Err(StorageError::transport("bulk flush failed"));
        }
        Ok(())
    }
}
