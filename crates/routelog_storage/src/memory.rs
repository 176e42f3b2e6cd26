//! In-memory stores for testing.

use crate::error::StorageResult;
use crate::kv::{list_ordered, KeyValueStore, ListOptions, ListPage, Metadata, MAX_LIST_LIMIT};
use crate::object::{ObjectStore, StoredObject};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    metadata: Option<Metadata>,
}

/// An in-memory key-value store.
///
/// This store keeps all data in an ordered map and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral deployments that don't need persistence
///
/// Listing follows the hosted store contract: lexicographic order, an
/// opaque continuation cursor and a `list_complete` flag.
///
/// # Example
///
/// ```rust
/// use routelog_storage::InMemoryKvStore;
///
/// let kv = InMemoryKvStore::with_entries([("a", "1"), ("b", "2")]);
/// assert_eq!(kv.len(), 2);
/// ```
#[derive(Debug)]
pub struct InMemoryKvStore {
    data: RwLock<BTreeMap<String, Entry>>,
    page_limit: usize,
}

impl InMemoryKvStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            page_limit: MAX_LIST_LIMIT,
        }
    }

    /// Creates a store with pre-existing entries.
    #[must_use]
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let data = entries
            .into_iter()
            .map(|(k, v)| {
                (
                    k.into(),
                    Entry {
                        value: v.into(),
                        metadata: None,
                    },
                )
            })
            .collect();
        Self {
            data: RwLock::new(data),
            page_limit: MAX_LIST_LIMIT,
        }
    }

    /// Caps every listed page at `limit` keys regardless of the request.
    ///
    /// Useful for exercising pagination with few keys.
    #[must_use]
    pub fn with_page_limit(mut self, limit: usize) -> Self {
        self.page_limit = limit.clamp(1, MAX_LIST_LIMIT);
        self
    }

    /// Returns the number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns true if the store holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Returns a copy of every key and value.
    #[must_use]
    pub fn entries(&self) -> BTreeMap<String, String> {
        self.data
            .read()
            .iter()
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect()
    }

    /// Returns the metadata stored with `key`, if any.
    #[must_use]
    pub fn metadata(&self, key: &str) -> Option<Metadata> {
        self.data.read().get(key).and_then(|e| e.metadata.clone())
    }
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.data.read().get(key).map(|e| e.value.clone()))
    }

    async fn put(&self, key: &str, value: &str, metadata: Option<Metadata>) -> StorageResult<()> {
        self.data.write().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                metadata,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.data.write().remove(key);
        Ok(())
    }

    async fn list(&self, options: &ListOptions) -> StorageResult<ListPage> {
        let data: &BTreeMap<String, Entry> = &self.data.read();
        list_ordered(data, options, self.page_limit)
    }
}

/// An in-memory object store.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
}

impl InMemoryObjectStore {
    /// Creates a new empty object store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Returns true if no object has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, name: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<()> {
        self.objects.write().insert(
            name.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn get(&self, name: &str) -> StorageResult<Option<StoredObject>> {
        Ok(self.objects.read().get(name).cloned())
    }

    async fn list_names(&self) -> StorageResult<Vec<String>> {
        Ok(self.objects.read().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_new_is_empty() {
        let kv = InMemoryKvStore::new();
        assert!(kv.is_empty());
        assert_eq!(kv.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_put_get_delete() {
        let kv = InMemoryKvStore::new();
        kv.put("user:amy", "{\"token\":\"t\"}", None).await.unwrap();
        assert_eq!(
            kv.get("user:amy").await.unwrap().as_deref(),
            Some("{\"token\":\"t\"}")
        );

        kv.put("user:amy", "{}", None).await.unwrap();
        assert_eq!(kv.get("user:amy").await.unwrap().as_deref(), Some("{}"));

        kv.delete("user:amy").await.unwrap();
        assert_eq!(kv.get("user:amy").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_delete_missing_succeeds() {
        let kv = InMemoryKvStore::new();
        assert!(kv.delete("nope").await.is_ok());
    }

    #[tokio::test]
    async fn memory_metadata_kept() {
        let kv = InMemoryKvStore::new();
        let mut meta = Metadata::new();
        meta.insert("origin".into(), "signup".into());
        kv.put("k", "v", Some(meta.clone())).await.unwrap();
        assert_eq!(kv.metadata("k"), Some(meta));
    }

    #[tokio::test]
    async fn memory_page_limit_forces_pages() {
        let kv = InMemoryKvStore::with_entries([("a", "1"), ("b", "2"), ("c", "3")])
            .with_page_limit(2);

        let first = kv.list(&ListOptions::all()).await.unwrap();
        assert_eq!(first.keys, vec!["a", "b"]);
        assert!(!first.is_last());

        let second = kv
            .list(&ListOptions::all().with_cursor(first.cursor))
            .await
            .unwrap();
        assert_eq!(second.keys, vec!["c"]);
        assert!(second.is_last());
    }

    #[tokio::test]
    async fn object_put_overwrites() {
        let store = InMemoryObjectStore::new();
        store
            .put("logs-2024-01-01.json", b"{}".to_vec(), "application/json")
            .await
            .unwrap();
        store
            .put("logs-2024-01-01.json", b"{\"a\":\"1\"}".to_vec(), "application/json")
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        let object = store.get("logs-2024-01-01.json").await.unwrap().unwrap();
        assert_eq!(object.bytes, b"{\"a\":\"1\"}");
        assert_eq!(object.content_type, "application/json");
    }
}
