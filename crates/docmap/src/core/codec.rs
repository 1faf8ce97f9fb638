//! Document encoding and decoding.
//!
//! Write bodies never contain the identifier field: the identifier travels
//! out-of-band as the document key. Reads accept either a search hit
//! (`{"_id": ..., "_source": {...}}`) or a bare `_source` document; for hits
//! the key is put back under the identifier property before decoding.

use std::collections::HashMap;

use serde_json::{Map, Number, Value, json};

use crate::core::fields::{Document, ID_PROPERTY, TypeDescriptor};
use crate::error::{StorageError, StorageResult};

/// A document body keyed by property name.
pub type DocumentBody = Map<String, Value>;

/// A record ready to be written: its key (if any) and its body.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedDocument {
    /// The identifier value, `None` when the type has no identifier binding
    /// or the value is empty.
    pub id: Option<String>,
    /// Every field except the identifier.
    pub body: DocumentBody,
}

/// Encodes a record into a body without its identifier field.
///
/// Types without an identifier binding are encoded in full.
pub fn encode_without_id<T: Document>(record: &T) -> StorageResult<DocumentBody> {
    encode(record).map(|encoded| encoded.body)
}

/// Encodes a record into its identifier value and identifier-free body.
pub fn encode<T: Document>(record: &T) -> StorageResult<EncodedDocument> {
    let descriptor = T::descriptor();
    let mut serialized = match serde_json::to_value(record)? {
        Value::Object(map) => map,
        other => {
            return Err(StorageError::invalid_input(format!(
                "{} does not serialize to a document (got {})",
                descriptor.type_name(),
                json_kind(&other)
            )));
        }
    };

    let identifier = descriptor.identifier_field();
    let id = identifier
        .and_then(|field| serialized.get(field.property()))
        .and_then(identifier_value);

    let mut body = Map::with_capacity(descriptor.fields().len());
    for field in descriptor.fields() {
        if identifier.is_some_and(|id_field| id_field.index == field.index) {
            continue;
        }
        // Fields omitted by `skip_serializing_if` stay absent.
        if let Some(value) = serialized.remove(field.property()) {
            body.insert(field.property().to_string(), value);
        }
    }

    Ok(EncodedDocument { id, body })
}

/// Renders an identifier value as a document key.
///
/// Strings are used as-is and numbers in decimal; empty strings and every
/// other JSON kind yield `None`.
pub fn identifier_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Decodes a hit or `_source` document into a record.
///
/// A restored key is offered as a string first. Keys are always strings on
/// the wire, so when that fails and the key reads as a JSON number (as
/// numeric identifiers are written), decoding is retried with the number.
pub fn decode<T: Document>(payload: &Value) -> StorageResult<T> {
    let (source, restored) = source_with_id(T::descriptor(), payload)?;
    let Some(number) = restored.as_deref().and_then(numeric_key) else {
        return serde_json::from_value(source).map_err(mismatch::<T>);
    };

    let mut numeric = source.clone();
    match serde_json::from_value(source) {
        Ok(record) => Ok(record),
        Err(e) => {
            if let Some(map) = numeric.as_object_mut() {
                map.insert(ID_PROPERTY.to_string(), number);
            }
            serde_json::from_value(numeric).map_err(|_| mismatch::<T>(e))
        }
    }
}

/// Decodes a hit or `_source` document into an existing record.
pub fn decode_into<T: Document>(payload: &Value, target: &mut T) -> StorageResult<()> {
    *target = decode(payload)?;
    Ok(())
}

fn mismatch<T: Document>(e: serde_json::Error) -> StorageError {
    StorageError::decode(format!(
        "payload does not match {}: {}",
        T::descriptor().type_name(),
        e
    ))
}

fn numeric_key(key: &str) -> Option<Value> {
    key.parse::<Number>().ok().map(Value::Number)
}

/// Extracts the `_source` of a hit and restores its key, or passes a bare
/// document through. Returns the restored key, if one was put back.
fn source_with_id(
    descriptor: &TypeDescriptor,
    payload: &Value,
) -> StorageResult<(Value, Option<String>)> {
    let Some(object) = payload.as_object() else {
        return Err(StorageError::decode(format!(
            "expected a document object for {}, got {}",
            descriptor.type_name(),
            json_kind(payload)
        )));
    };

    let Some(source) = object.get("_source") else {
        return Ok((payload.clone(), None));
    };

    let mut source = source.clone();
    let mut restored = None;
    if let (Some(key), Some(map)) = (object.get(ID_PROPERTY), source.as_object_mut()) {
        if descriptor.identifier().is_some() && !map.contains_key(ID_PROPERTY) {
            restored = key.as_str().map(str::to_string);
            map.insert(ID_PROPERTY.to_string(), key.clone());
        }
    }
    Ok((source, restored))
}

/// Renames the keys of a structural-name keyed map to document properties.
///
/// Keys missing from `property_map` are kept as they are.
pub fn map_to_document(
    object: Map<String, Value>,
    property_map: &HashMap<&'static str, &'static str>,
) -> DocumentBody {
    object
        .into_iter()
        .map(|(key, value)| {
            let property = property_map
                .get(key.as_str())
                .map(|p| p.to_string())
                .unwrap_or(key);
            (property, value)
        })
        .collect()
}

/// Builds the query document for a filter.
///
/// Query construction is not provided: this always returns the empty
/// document, which the engine treats as match-all. Callers that need a
/// real query pass a literal query document instead.
pub fn build_query<F>(_index: &str, _filter: Option<&F>) -> Value {
    json!({})
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
