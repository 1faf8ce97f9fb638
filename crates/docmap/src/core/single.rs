//! Single-record operations.
//!
//! Each function awaits exactly one engine request (none when its input is
//! rejected up front). Absent documents are reported as `false` / `None` by
//! the read operations and as [`StorageError::NotFound`] by the writes.

use serde_json::Value;
use tracing::debug;

use crate::core::codec::{self, DocumentBody};
use crate::core::fields::{Document, ID_PROPERTY};
use crate::core::responses::{
    CreateResponse, ExistsResponse, GetResponse, SearchResponse, WriteAck, parse_envelope,
};
use crate::core::transport::{EngineResponse, SearchTransport, WriteRequest};
use crate::error::{StorageError, StorageResult};

const STATUS_NOT_FOUND: u16 = 404;
const STATUS_CONFLICT: u16 = 409;

/// Returns true if the document exists.
pub async fn exists<C>(client: &C, index: &str, id: &str) -> StorageResult<bool>
where
    C: SearchTransport + ?Sized,
{
    let response = client.exists(index, id).await?;
    if response.status == STATUS_NOT_FOUND {
        return Ok(false);
    }
    let response = response.error_for_status()?;
    let envelope: ExistsResponse = parse_envelope("exists", &response.body)?;
    Ok(envelope.found)
}

/// Fetches a document by key. An absent document is `Ok(None)`.
pub async fn find_one_by_id<T, C>(client: &C, index: &str, id: &str) -> StorageResult<Option<T>>
where
    T: Document,
    C: SearchTransport + ?Sized,
{
    let Some(hit) = get_hit(client, index, id).await? else {
        return Ok(None);
    };
    codec::decode(&hit).map(Some)
}

/// Fetches a document by key into `target`. Returns false when absent, in
/// which case `target` is untouched.
pub async fn find_one_by_id_and_decode<T, C>(
    client: &C,
    index: &str,
    id: &str,
    target: &mut T,
) -> StorageResult<bool>
where
    T: Document,
    C: SearchTransport + ?Sized,
{
    let Some(hit) = get_hit(client, index, id).await? else {
        return Ok(false);
    };
    codec::decode_into(&hit, target)?;
    Ok(true)
}

pub(crate) async fn get_hit<C>(client: &C, index: &str, id: &str) -> StorageResult<Option<Value>>
where
    C: SearchTransport + ?Sized,
{
    let response = client.get(index, id).await?;
    if response.status == STATUS_NOT_FOUND {
        return Ok(None);
    }
    let response = response.error_for_status()?;
    let envelope: GetResponse = parse_envelope("get", &response.body)?;
    match envelope.source {
        Some(source) if envelope.found => {
            let key = if envelope.id.is_empty() {
                id.to_string()
            } else {
                envelope.id
            };
            Ok(Some(serde_json::json!({ "_id": key, "_source": source })))
        }
        _ => Ok(None),
    }
}

/// Returns the first hit of a search, or `None` when nothing matches.
pub async fn find_one<T, C>(client: &C, indices: &[&str], query: &Value) -> StorageResult<Option<T>>
where
    T: Document,
    C: SearchTransport + ?Sized,
{
    let response = search(client, indices, query).await?;
    if response.hits.total_value() < 1 {
        return Ok(None);
    }
    match response.hits.hits.first() {
        Some(hit) => codec::decode(&hit.to_hit_value()).map(Some),
        None => Ok(None),
    }
}

/// Decodes the first hit of a search into `target`. Returns false when
/// nothing matches.
pub async fn find_one_and_decode<T, C>(
    client: &C,
    indices: &[&str],
    query: &Value,
    target: &mut T,
) -> StorageResult<bool>
where
    T: Document,
    C: SearchTransport + ?Sized,
{
    match find_one::<T, C>(client, indices, query).await? {
        Some(found) => {
            *target = found;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Decodes every hit of a search.
pub async fn find<T, C>(client: &C, indices: &[&str], query: &Value) -> StorageResult<Vec<T>>
where
    T: Document,
    C: SearchTransport + ?Sized,
{
    let response = search(client, indices, query).await?;
    response
        .hits
        .hits
        .iter()
        .map(|hit| codec::decode(&hit.to_hit_value()))
        .collect()
}

/// Decodes every hit of a search into `results`, replacing its contents.
///
/// Returns true once the search answered, even with no hits.
pub async fn find_and_decode<T, C>(
    client: &C,
    indices: &[&str],
    query: &Value,
    results: &mut Vec<T>,
) -> StorageResult<bool>
where
    T: Document,
    C: SearchTransport + ?Sized,
{
    *results = find(client, indices, query).await?;
    Ok(true)
}

pub(crate) async fn search<C>(
    client: &C,
    indices: &[&str],
    query: &Value,
) -> StorageResult<SearchResponse>
where
    C: SearchTransport + ?Sized,
{
    let response = client.search(indices, query, true).await?.error_for_status()?;
    parse_envelope("search", &response.body)
}

/// Creates a document and returns its version.
///
/// With a non-empty identifier the write is keyed by it and fails with
/// [`StorageError::DuplicateKey`] if the key is taken. Otherwise the engine
/// assigns the key; types without an identifier binding are sent in full.
pub async fn insert_one<T, C>(client: &C, index: &str, record: &T) -> StorageResult<i64>
where
    T: Document,
    C: SearchTransport + ?Sized,
{
    let encoded = codec::encode(record)?;
    let id = encoded.id.clone();
    let request = WriteRequest::Create {
        index: index.to_string(),
        id: encoded.id,
        body: encoded.body,
    };

    let response = client.write(request).await?;
    if response.status == STATUS_CONFLICT {
        return Err(StorageError::DuplicateKey {
            index: index.to_string(),
            id: id.unwrap_or_default(),
        });
    }
    let response = response.error_for_status()?;
    let created: CreateResponse = parse_envelope("create", &response.body)?;
    debug!(
        index = %index,
        id = %created.id,
        result = created.result.as_deref().unwrap_or("unknown"),
        version = created.version,
        "Inserted document"
    );
    Ok(created.version)
}

/// Updates the stored document keyed by the record's identifier.
///
/// Returns the number of shards that acknowledged the write.
pub async fn update_one<T, C>(client: &C, index: &str, record: &T) -> StorageResult<i64>
where
    T: Document,
    C: SearchTransport + ?Sized,
{
    let encoded = codec::encode(record)?;
    let Some(id) = encoded.id else {
        return Err(missing_identifier::<T>());
    };
    apply_update(client, index, id, encoded.body, false).await
}

/// Updates the document keyed by `id`, creating it when absent.
pub async fn upsert_one<T, C>(client: &C, index: &str, id: &str, record: &T) -> StorageResult<i64>
where
    T: Document,
    C: SearchTransport + ?Sized,
{
    if id.is_empty() {
        return Err(StorageError::missing_identifier(format!(
            "upsert into {index} needs a non-empty identifier"
        )));
    }
    let body = codec::encode_without_id(record)?;
    apply_update(client, index, id.to_string(), body, true).await
}

/// Merges a raw property map into the document named by its `_id` entry.
///
/// The `_id` entry is removed from the body that is sent.
pub async fn patch_one<C>(client: &C, index: &str, mut fields: DocumentBody) -> StorageResult<i64>
where
    C: SearchTransport + ?Sized,
{
    let id = fields
        .remove(ID_PROPERTY)
        .as_ref()
        .and_then(codec::identifier_value)
        .ok_or_else(|| {
            StorageError::missing_identifier(format!("patch into {index} needs an _id entry"))
        })?;
    apply_update(client, index, id, fields, false).await
}

/// Deletes a document and returns the number of acknowledging shards.
pub async fn delete_one<C>(client: &C, index: &str, id: &str) -> StorageResult<i64>
where
    C: SearchTransport + ?Sized,
{
    let request = WriteRequest::Delete {
        index: index.to_string(),
        id: id.to_string(),
    };
    let response = client.write(request).await?;
    acknowledged(index, id, response)
}

pub(crate) async fn apply_update<C>(
    client: &C,
    index: &str,
    id: String,
    doc: DocumentBody,
    upsert: bool,
) -> StorageResult<i64>
where
    C: SearchTransport + ?Sized,
{
    let request = WriteRequest::Update {
        index: index.to_string(),
        id: id.clone(),
        doc,
        upsert,
    };
    let response = client.write(request).await?;
    acknowledged(index, &id, response)
}

fn acknowledged(index: &str, id: &str, response: EngineResponse) -> StorageResult<i64> {
    if response.status == STATUS_NOT_FOUND {
        return Err(StorageError::NotFound {
            index: index.to_string(),
            id: id.to_string(),
        });
    }
    let response = response.error_for_status()?;
    let ack: WriteAck = parse_envelope("write", &response.body)?;
    Ok(ack.shards.successful)
}

fn missing_identifier<T: Document>() -> StorageError {
    let descriptor = T::descriptor();
    match descriptor.identifier() {
        Some(binding) => StorageError::missing_identifier(format!(
            "{}.{} is empty",
            descriptor.type_name(),
            binding.name
        )),
        None => StorageError::missing_identifier(format!(
            "{} has no field mapped to {}",
            descriptor.type_name(),
            ID_PROPERTY
        )),
    }
}
