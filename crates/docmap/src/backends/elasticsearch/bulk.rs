//! Bulk API channel.
//!
//! Items are buffered and dispatched in batches of `flush_items`. Each batch
//! runs as its own task holding a semaphore permit, so at most `workers`
//! bulk requests are in flight. Per-item verdicts are read from the `items`
//! array of the bulk answer, which lists items in request order.

use std::sync::Arc;

use async_trait::async_trait;
use elasticsearch::params::Refresh;
use elasticsearch::{BulkOperation, BulkParts, Elasticsearch};
use serde_json::Value;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::core::transport::{
    BulkAction, BulkChannel, BulkConfig, BulkItem, EngineResponse, ItemOutcome, ItemStatus,
};
use crate::error::{StorageError, StorageResult};

use super::backend::engine_response;

/// A batch-write channel over the bulk API.
pub struct ElasticsearchBulkChannel {
    client: Elasticsearch,
    index: String,
    flush_items: usize,
    refresh: Option<Refresh>,
    pending: Vec<BulkItem>,
    permits: Arc<Semaphore>,
    tasks: JoinSet<StorageResult<()>>,
    outcomes: mpsc::Sender<ItemOutcome>,
}

impl ElasticsearchBulkChannel {
    pub(super) fn new(
        client: Elasticsearch,
        index: &str,
        config: &BulkConfig,
        refresh: Option<Refresh>,
        outcomes: mpsc::Sender<ItemOutcome>,
    ) -> Self {
        Self {
            client,
            index: index.to_string(),
            flush_items: config.flush_items,
            refresh,
            pending: Vec::with_capacity(config.flush_items),
            permits: Arc::new(Semaphore::new(config.workers)),
            tasks: JoinSet::new(),
            outcomes,
        }
    }

    async fn dispatch(&mut self) -> StorageResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let batch = std::mem::replace(&mut self.pending, Vec::with_capacity(self.flush_items));
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| StorageError::transport(format!("bulk worker pool closed: {}", e)))?;

        let client = self.client.clone();
        let index = self.index.clone();
        let refresh = self.refresh;
        let outcomes = self.outcomes.clone();
        self.tasks.spawn(async move {
            let _permit = permit;
            send_batch(client, index, batch, refresh, outcomes).await
        });
        Ok(())
    }
}

#[async_trait]
impl BulkChannel for ElasticsearchBulkChannel {
    async fn add(&mut self, item: BulkItem) -> StorageResult<()> {
        self.pending.push(item);
        if self.pending.len() >= self.flush_items {
            self.dispatch().await?;
        }
        Ok(())
    }

    async fn close(mut self: Box<Self>) -> StorageResult<()> {
        let mut first_error = self.dispatch().await.err();

        while let Some(joined) = self.tasks.join_next().await {
            let result = joined.unwrap_or_else(|e| {
                Err(StorageError::transport(format!("bulk worker failed: {}", e)))
            });
            if let Err(e) = result {
                warn!(index = %self.index, error = %e, "Bulk batch failed");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

async fn send_batch(
    client: Elasticsearch,
    index: String,
    batch: Vec<BulkItem>,
    refresh: Option<Refresh>,
    outcomes: mpsc::Sender<ItemOutcome>,
) -> StorageResult<()> {
    let mut keys = Vec::with_capacity(batch.len());
    let mut operations: Vec<BulkOperation<Value>> = Vec::with_capacity(batch.len());
    for item in batch {
        let body = Value::Object(item.body);
        let operation = match item.action {
            BulkAction::Create => BulkOperation::create(body).id(item.document_id.clone()).into(),
            BulkAction::Index => BulkOperation::index(body).id(item.document_id.clone()).into(),
        };
        operations.push(operation);
        keys.push((item.position, item.document_id));
    }

    debug!(index = %index, items = keys.len(), "Sending bulk batch");
    let mut request = client.bulk(BulkParts::Index(&index)).body(operations);
    if let Some(refresh) = refresh {
        request = request.refresh(refresh);
    }

    let response = match request.send().await {
        Ok(response) => engine_response(response).await,
        Err(e) => Err(StorageError::from(e)),
    };
    let (verdicts, result) = batch_outcomes(keys, response);
    for outcome in verdicts {
        let _ = outcomes.send(outcome).await;
    }
    result
}

/// Turns the answer to one bulk request into one outcome per key.
///
/// A request-level failure fails every key with the same reason and is
/// returned so the channel's `close` reports it.
fn batch_outcomes(
    keys: Vec<(usize, String)>,
    response: StorageResult<EngineResponse>,
) -> (Vec<ItemOutcome>, StorageResult<()>) {
    match response.and_then(EngineResponse::error_for_status) {
        Ok(response) => (item_outcomes(keys, &response), Ok(())),
        Err(e) => {
            let reason = e.to_string();
            let failed = keys
                .into_iter()
                .map(|(position, document_id)| {
                    ItemOutcome::failed(position, document_id, reason.clone())
                })
                .collect();
            (failed, Err(e))
        }
    }
}

/// Pairs keys with the `items` array by offset, which follows request order.
fn item_outcomes(keys: Vec<(usize, String)>, response: &EngineResponse) -> Vec<ItemOutcome> {
    let items = response
        .body
        .get("items")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    keys.into_iter()
        .enumerate()
        .map(|(offset, (position, document_id))| {
            let status = match items.get(offset) {
                Some(item) => item_status(item),
                None => ItemStatus::Failed {
                    reason: "item missing from bulk response".to_string(),
                },
            };
            ItemOutcome {
                position,
                document_id,
                status,
            }
        })
        .collect()
}

/// Reads the verdict of one `items` entry, e.g.
/// `{"create": {"_id": "a", "status": 409, "error": {...}}}`.
fn item_status(item: &Value) -> ItemStatus {
    let Some(result) = item.as_object().and_then(|map| map.values().next()) else {
        return ItemStatus::Failed {
            reason: format!("unexpected bulk item: {}", item),
        };
    };
    let status = result.get("status").and_then(Value::as_u64).unwrap_or(0);
    match result.get("error") {
        None if (200..300).contains(&status) => ItemStatus::Succeeded,
        Some(error) => ItemStatus::Failed {
            reason: error
                .get("reason")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
        },
        None => ItemStatus::Failed {
            reason: format!("bulk item status {}", status),
        },
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_item_status_success() {
        let item = json!({ "index": { "_id": "a", "status": 201, "result": "created" } });
        assert_eq!(item_status(&item), ItemStatus::Succeeded);
    }

    #[test]
    fn test_item_status_conflict() {
        let item = json!({ "create": {
            "_id": "a",
            "status": 409,
            "error": { "type": "version_conflict_engine_exception", "reason": "document already exists" }
        } });
        assert_eq!(
            item_status(&item),
            ItemStatus::Failed {
                reason: "document already exists".to_string()
            }
        );
    }

    fn keys(entries: &[(usize, &str)]) -> Vec<(usize, String)> {
        entries
            .iter()
            .map(|(position, id)| (*position, id.to_string()))
            .collect()
    }

    #[test]
    fn test_item_outcomes_follow_offsets() {
        // positions need not be contiguous or ascending within a batch
        let response = EngineResponse::new(
            200,
            json!({ "errors": true, "items": [
                { "create": { "_id": "b", "status": 201 } },
                { "create": { "_id": "a", "status": 409, "error": { "reason": "exists" } } },
                { "create": { "_id": "c", "status": 201 } }
            ] }),
        );
        let (outcomes, result) =
            batch_outcomes(keys(&[(7, "b"), (2, "a"), (11, "c")]), Ok(response));
        assert!(result.is_ok());
        assert_eq!(
            outcomes,
            vec![
                ItemOutcome::succeeded(7, "b"),
                ItemOutcome::failed(2, "a", "exists"),
                ItemOutcome::succeeded(11, "c"),
            ]
        );
    }

    #[test]
    fn test_short_items_array_fails_the_rest() {
        let response = EngineResponse::new(
            200,
            json!({ "items": [{ "index": { "_id": "a", "status": 200 } }] }),
        );
        let (outcomes, result) = batch_outcomes(keys(&[(0, "a"), (1, "b")]), Ok(response));
        assert!(result.is_ok());
        assert!(outcomes[0].is_success());
        assert_eq!(
            outcomes[1],
            ItemOutcome::failed(1, "b", "item missing from bulk response")
        );

        let (outcomes, _) =
            batch_outcomes(keys(&[(0, "a")]), Ok(EngineResponse::new(200, json!({}))));
        assert!(!outcomes[0].is_success());
    }

    #[test]
    fn test_error_status_fails_every_key() {
        let response = EngineResponse::new(400, json!({ "error": "bad request" }));
        let (outcomes, result) = batch_outcomes(keys(&[(0, "a"), (3, "d")]), Ok(response));
        assert!(matches!(result, Err(StorageError::Response { status: 400, .. })));
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| !o.is_success()));
        assert_eq!(outcomes[1].position, 3);
    }

    #[test]
    fn test_transport_failure_fails_every_key() {
        let (outcomes, result) = batch_outcomes(
            keys(&[(4, "x")]),
            Err(StorageError::transport("connection refused")),
        );
        assert!(matches!(result, Err(StorageError::Transport { .. })));
        assert_eq!(outcomes[0].document_id, "x");
        assert!(matches!(&outcomes[0].status, ItemStatus::Failed { reason } if reason.contains("connection refused")));
    }

    #[tokio::test]
    async fn test_close_reports_unreachable_engine() {
        use crate::backends::elasticsearch::{ElasticsearchConfig, ElasticsearchTransport};
        use crate::core::transport::SearchTransport;

        let transport = ElasticsearchTransport::new(ElasticsearchConfig {
            nodes: vec!["http://127.0.0.1:1".to_string()],
            request_timeout_ms: 2_000,
            ..Default::default()
        })
        .unwrap();
        let config = BulkConfig {
            workers: 2,
            flush_items: 2,
            ..Default::default()
        };
        let (tx, mut rx) = mpsc::channel(16);
        let mut channel = transport.open_bulk("docs", &config, tx).await.unwrap();
        for position in 0..3 {
            channel
                .add(BulkItem {
                    position,
                    action: BulkAction::Create,
                    document_id: format!("d{}", position),
                    body: serde_json::Map::new(),
                })
                .await
                .unwrap();
        }

        let err = channel.close().await.unwrap_err();
        assert!(matches!(err, StorageError::Transport { .. }));

        let mut positions = Vec::new();
        while let Some(outcome) = rx.recv().await {
            assert!(!outcome.is_success());
            positions.push(outcome.position);
        }
        positions.sort_unstable();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_item_status_malformed() {
        assert!(matches!(item_status(&json!(3)), ItemStatus::Failed { .. }));
        assert!(matches!(
            item_status(&json!({ "index": { "status": 500 } })),
            ItemStatus::Failed { .. }
        ));
    }
}
