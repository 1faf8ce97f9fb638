//! Bulk write engine.
//!
//! A submission opens one [`BulkChannel`], feeds it the valid records in
//! input order and closes it. The channel reports one [`ItemOutcome`] per
//! accepted item on a bounded channel; a single collector, polled
//! concurrently with submission, owns the per-position state and is the only
//! writer of it. Records that cannot be submitted (no identifier, or not a
//! JSON object) are failed by position without reaching the engine.
//!
//! The call itself only fails for empty input, for a channel that cannot be
//! opened, or for a flush-level fault while closing. Per-item problems only
//! show up in [`BulkResult::failed`].

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::core::codec;
use crate::core::fields::Document;
use crate::core::transport::{
    BulkAction, BulkChannel, BulkConfig, BulkItem, ItemOutcome, ItemStatus, SearchTransport,
};
use crate::error::{StorageError, StorageResult};

/// Positional outcome of a bulk write.
///
/// Every input position appears exactly once across the two lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkResult {
    /// Positions the engine accepted, ascending.
    pub succeeded: Vec<usize>,
    /// Positions that were rejected, never reported, or never submitted.
    pub failed: Vec<usize>,
}

impl BulkResult {
    /// Total number of positions covered.
    pub fn len(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// Returns true if no position is covered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if every position succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Inserts records, failing per item when a key already exists.
pub async fn insert_many<T, C>(client: &C, index: &str, records: &[T]) -> StorageResult<BulkResult>
where
    T: Document + Sync,
    C: SearchTransport + ?Sized,
{
    write_many(client, index, records, BulkAction::Create, &BulkConfig::default()).await
}

/// Creates or replaces records.
pub async fn upsert_many<T, C>(client: &C, index: &str, records: &[T]) -> StorageResult<BulkResult>
where
    T: Document + Sync,
    C: SearchTransport + ?Sized,
{
    write_many(client, index, records, BulkAction::Index, &BulkConfig::default()).await
}

/// Writes records through one batch channel with the given action.
pub async fn write_many<T, C>(
    client: &C,
    index: &str,
    records: &[T],
    action: BulkAction,
    config: &BulkConfig,
) -> StorageResult<BulkResult>
where
    T: Document + Sync,
    C: SearchTransport + ?Sized,
{
    if records.is_empty() {
        return Err(StorageError::invalid_input(format!(
            "bulk {} into {} needs at least one record",
            action.as_str(),
            index
        )));
    }
    config.validate()?;

    let (outcome_tx, outcome_rx) = mpsc::channel(config.outcome_buffer);
    let channel = client.open_bulk(index, config, outcome_tx).await?;

    let (submission, reports) = tokio::join!(
        submit(channel, records, action),
        collect(outcome_rx, records.len()),
    );
    let submission = submission?;

    let result = reconcile(&reports, &submission);
    debug!(
        index = %index,
        action = action.as_str(),
        total = records.len(),
        succeeded = result.succeeded.len(),
        failed = result.failed.len(),
        "Bulk write completed"
    );
    Ok(result)
}

/// What the submission loop did with each position.
#[derive(Debug, Default)]
struct Submission {
    /// Positions accepted by the channel, in order.
    enqueued: Vec<usize>,
    /// Positions never accepted, in order.
    skipped: Vec<usize>,
}

async fn submit<T: Document>(
    mut channel: Box<dyn BulkChannel>,
    records: &[T],
    action: BulkAction,
) -> StorageResult<Submission> {
    let mut submission = Submission::default();
    let descriptor = T::descriptor();
    if descriptor.identifier().is_none() {
        warn!(
            type_name = descriptor.type_name(),
            "Type has no identifier field; every bulk item will be failed"
        );
    }

    for (position, record) in records.iter().enumerate() {
        let encoded = match codec::encode(record) {
            Ok(encoded) => encoded,
            Err(e) => {
                debug!(position, error = %e, "Skipping bulk item that does not encode");
                submission.skipped.push(position);
                continue;
            }
        };
        let Some(document_id) = encoded.id else {
            debug!(position, "Skipping bulk item without identifier");
            submission.skipped.push(position);
            continue;
        };

        let item = BulkItem {
            position,
            action,
            document_id,
            body: encoded.body,
        };
        match channel.add(item).await {
            Ok(()) => submission.enqueued.push(position),
            Err(e) => {
                warn!(position, error = %e, "Bulk channel rejected item");
                submission.skipped.push(position);
            }
        }
    }

    channel.close().await?;
    Ok(submission)
}

/// Drains outcomes until every sender is gone. `Some(true)` is success.
async fn collect(mut outcomes: mpsc::Receiver<ItemOutcome>, len: usize) -> Vec<Option<bool>> {
    let mut reports: Vec<Option<bool>> = vec![None; len];
    while let Some(outcome) = outcomes.recv().await {
        let Some(slot) = reports.get_mut(outcome.position) else {
            warn!(
                position = outcome.position,
                document_id = %outcome.document_id,
                "Ignoring bulk outcome for unknown position"
            );
            continue;
        };
        if slot.is_some() {
            warn!(
                position = outcome.position,
                document_id = %outcome.document_id,
                "Ignoring repeated bulk outcome"
            );
            continue;
        }
        if let ItemStatus::Failed { reason } = &outcome.status {
            debug!(
                position = outcome.position,
                document_id = %outcome.document_id,
                reason = %reason,
                "Bulk item failed"
            );
        }
        *slot = Some(outcome.is_success());
    }
    reports
}

fn reconcile(reports: &[Option<bool>], submission: &Submission) -> BulkResult {
    let mut result = BulkResult::default();
    for &position in &submission.enqueued {
        match reports.get(position).copied().flatten() {
            Some(true) => result.succeeded.push(position),
            Some(false) => result.failed.push(position),
            None => {}
        }
    }
    result.succeeded.sort_unstable();
    result.failed.sort_unstable();

    for &position in &submission.enqueued {
        if reports.get(position).copied().flatten().is_none() {
            warn!(position, "Bulk item was never reported; counting it as failed");
            result.failed.push(position);
        }
    }
    result.failed.extend_from_slice(&submission.skipped);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconcile_orders_failures() {
        let reports = vec![Some(true), None, Some(false), None, Some(true)];
        let submission = Submission {
            enqueued: vec![0, 2, 3, 4],
            skipped: vec![1],
        };
        let result = reconcile(&reports, &submission);
        assert_eq!(result.succeeded, vec![0, 4]);
        assert_eq!(result.failed, vec![2, 3, 1]);
        assert_eq!(result.len(), 5);
        assert!(!result.all_succeeded());
    }

    #[test]
    fn test_reconcile_ignores_reports_for_skipped_positions() {
        let reports = vec![Some(true), Some(true)];
        let submission = Submission {
            enqueued: vec![0],
            skipped: vec![1],
        };
        let result = reconcile(&reports, &submission);
        assert_eq!(result.succeeded, vec![0]);
        assert_eq!(result.failed, vec![1]);
    }

    #[tokio::test]
    async fn test_collect_keeps_first_report() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(ItemOutcome::succeeded(1, "b")).await.unwrap();
        tx.send(ItemOutcome::failed(1, "b", "late")).await.unwrap();
        tx.send(ItemOutcome::failed(0, "a", "conflict")).await.unwrap();
        tx.send(ItemOutcome::succeeded(9, "z")).await.unwrap();
        drop(tx);

        let reports = collect(rx, 3).await;
        assert_eq!(reports, vec![Some(false), Some(true), None]);
    }

    #[test]
    fn test_bulk_result_empty() {
        let result = BulkResult::default();
        assert!(result.is_empty());
        assert!(result.all_succeeded());
    }
}
