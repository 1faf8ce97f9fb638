//! Index-bound loader.

use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::warn;

use crate::core::codec;
use crate::core::fields::{Document, IdentifierBinding};
use crate::core::single;
use crate::core::transport::SearchTransport;
use crate::error::{StorageError, StorageResult};

/// Loads records of one type from one index.
pub struct Loader<T> {
    client: Arc<dyn SearchTransport>,
    index: String,
    identifier: Option<IdentifierBinding>,
    _record: PhantomData<fn() -> T>,
}

impl<T> Debug for Loader<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("index", &self.index)
            .field("identifier", &self.identifier)
            .finish_non_exhaustive()
    }
}

impl<T: Document> Loader<T> {
    /// Creates a loader.
    ///
    /// A type without an identifier field only logs a warning here; the
    /// key-based methods then return [`StorageError::MissingIdentifier`].
    pub fn new(client: Arc<dyn SearchTransport>, index: impl Into<String>) -> Self {
        let index = index.into();
        let descriptor = T::descriptor();
        let identifier = descriptor.identifier();
        if identifier.is_none() {
            warn!(
                type_name = descriptor.type_name(),
                index = %index,
                "Type has no field mapped to _id; load and exist are unavailable"
            );
        }
        Self {
            client,
            index,
            identifier,
            _record: PhantomData,
        }
    }

    /// Returns the bound index name.
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Returns the identifier binding of `T`, if any.
    pub fn identifier(&self) -> Option<IdentifierBinding> {
        self.identifier
    }

    /// Returns the structural names of the key fields.
    pub fn keys(&self) -> Vec<&'static str> {
        self.identifier.iter().map(|binding| binding.name).collect()
    }

    /// Returns every record in the index.
    pub async fn all(&self) -> StorageResult<Vec<T>> {
        let query = codec::build_query::<()>(&self.index, None);
        single::find(self.client.as_ref(), &[self.index.as_str()], &query).await
    }

    /// Loads the record stored under `id`.
    pub async fn load(&self, id: &str) -> StorageResult<Option<T>> {
        self.require_identifier()?;
        single::find_one_by_id(self.client.as_ref(), &self.index, id).await
    }

    /// Loads the record stored under `id` into `target`.
    pub async fn load_and_decode(&self, id: &str, target: &mut T) -> StorageResult<bool> {
        self.require_identifier()?;
        single::find_one_by_id_and_decode(self.client.as_ref(), &self.index, id, target).await
    }

    /// Returns true if a record is stored under `id`.
    pub async fn exist(&self, id: &str) -> StorageResult<bool> {
        self.require_identifier()?;
        single::exists(self.client.as_ref(), &self.index, id).await
    }

    fn require_identifier(&self) -> StorageResult<()> {
        match self.identifier {
            Some(_) => Ok(()),
            None => Err(StorageError::missing_identifier(format!(
                "{} has no field mapped to _id",
                T::descriptor().type_name()
            ))),
        }
    }
}

impl<T> Clone for Loader<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            index: self.index.clone(),
            identifier: self.identifier,
            _record: PhantomData,
        }
    }
}
