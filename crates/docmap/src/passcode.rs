//! Passcode storage.
//!
//! Keeps one `{passcode, expiredAt}` document per key, e.g. for one-time
//! login codes. Property names are configurable.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::core::codec::DocumentBody;
use crate::core::fields::ID_PROPERTY;
use crate::core::single;
use crate::core::transport::SearchTransport;
use crate::error::{StorageError, StorageResult};

/// Stores passcodes with their expiry in one index.
#[derive(Clone)]
pub struct PasscodeStore {
    client: Arc<dyn SearchTransport>,
    index: String,
    id_name: String,
    passcode_name: String,
    expired_at_name: String,
}

impl std::fmt::Debug for PasscodeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasscodeStore")
            .field("index", &self.index)
            .field("id_name", &self.id_name)
            .field("passcode_name", &self.passcode_name)
            .field("expired_at_name", &self.expired_at_name)
            .finish_non_exhaustive()
    }
}

impl PasscodeStore {
    /// Creates a store with the default property names
    /// (`_id`, `passcode`, `expiredAt`).
    pub fn new(client: Arc<dyn SearchTransport>, index: impl Into<String>) -> Self {
        Self::with_names(client, index, ID_PROPERTY, "passcode", "expiredAt")
    }

    /// Creates a store with custom property names.
    ///
    /// When `id_name` is not `_id`, the key is also stored under it.
    pub fn with_names(
        client: Arc<dyn SearchTransport>,
        index: impl Into<String>,
        id_name: impl Into<String>,
        passcode_name: impl Into<String>,
        expired_at_name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            index: index.into(),
            id_name: id_name.into(),
            passcode_name: passcode_name.into(),
            expired_at_name: expired_at_name.into(),
        }
    }

    /// Saves a passcode, replacing any previous one for `id`.
    ///
    /// Returns the number of shards that acknowledged the write.
    pub async fn save(
        &self,
        id: &str,
        passcode: &str,
        expired_at: DateTime<Utc>,
    ) -> StorageResult<i64> {
        if id.is_empty() {
            return Err(StorageError::missing_identifier("passcode key is empty"));
        }
        let mut body = DocumentBody::new();
        if self.id_name != ID_PROPERTY {
            body.insert(self.id_name.clone(), Value::String(id.to_string()));
        }
        body.insert(
            self.passcode_name.clone(),
            Value::String(passcode.to_string()),
        );
        body.insert(self.expired_at_name.clone(), serde_json::to_value(expired_at)?);
        single::apply_update(self.client.as_ref(), &self.index, id.to_string(), body, true).await
    }

    /// Loads the passcode and expiry saved for `id`.
    pub async fn load(&self, id: &str) -> StorageResult<Option<(String, DateTime<Utc>)>> {
        let Some(hit) = single::get_hit(self.client.as_ref(), &self.index, id).await? else {
            return Ok(None);
        };
        let source = &hit["_source"];
        let passcode = source
            .get(&self.passcode_name)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                StorageError::decode(format!("{} is missing or not a string", self.passcode_name))
            })?
            .to_string();
        let expired_at = source
            .get(&self.expired_at_name)
            .cloned()
            .ok_or_else(|| StorageError::decode(format!("{} is missing", self.expired_at_name)))
            .and_then(|value| {
                serde_json::from_value::<DateTime<Utc>>(value).map_err(|e| {
                    StorageError::decode(format!("{} is not a timestamp: {}", self.expired_at_name, e))
                })
            })?;
        Ok(Some((passcode, expired_at)))
    }

    /// Deletes the passcode saved for `id`.
    pub async fn delete(&self, id: &str) -> StorageResult<i64> {
        single::delete_one(self.client.as_ref(), &self.index, id).await
    }
}
