//! Object store trait definition.

use crate::error::StorageResult;
use async_trait::async_trait;

/// Content type used for JSON exports.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A durable blob store.
///
/// Only used as a backup sink. Writing an existing name replaces the
/// previous object.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` under `name`, overwriting any existing object.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not acceptable or the write fails.
    async fn put(&self, name: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<()>;

    /// Reads an object back.
    ///
    /// Returns `Ok(None)` when no object has that name.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    async fn get(&self, name: &str) -> StorageResult<Option<StoredObject>>;

    /// Returns the names of all stored objects in lexicographic order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    async fn list_names(&self) -> StorageResult<Vec<String>>;
}

/// A blob as returned by [`ObjectStore::get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Object contents.
    pub bytes: Vec<u8>,
    /// MIME type supplied when the object was written.
    pub content_type: String,
}
