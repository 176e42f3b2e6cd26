//! Key-value store trait definition.

use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Largest page a `list` call may return.
pub const MAX_LIST_LIMIT: usize = 1000;

/// Free-form metadata attached to a stored value.
pub type Metadata = BTreeMap<String, String>;

/// A hosted key-value namespace.
///
/// The store is **eventually consistent** and offers no multi-key
/// transactions. Callers must not assume that a key seen by `list` is still
/// readable by a following `get`.
///
/// # Invariants
///
/// - `list` returns keys in lexicographic order
/// - a page never holds more than `min(limit, MAX_LIST_LIMIT)` keys
/// - the last page is signalled by `list_complete`, by an absent cursor,
///   or by both; callers must treat either as terminal
/// - stores are `Send + Sync` and serialize their own writes per key
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// Returns `Ok(None)` when the key does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Writes `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn put(&self, key: &str, value: &str, metadata: Option<Metadata>) -> StorageResult<()>;

    /// Removes `key`. Deleting a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Lists one page of keys under a prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the cursor is not valid for the prefix or the
    /// store cannot be reached.
    async fn list(&self, options: &ListOptions) -> StorageResult<ListPage>;
}

/// Parameters of a single `list` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    /// Only keys starting with this prefix are returned.
    pub prefix: String,
    /// Continuation cursor from a previous page.
    pub cursor: Option<String>,
    /// Requested page size.
    pub limit: usize,
}

impl ListOptions {
    /// Lists every key in the namespace.
    pub fn all() -> Self {
        Self::with_prefix("")
    }

    /// Lists keys under `prefix` with the maximum page size.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            cursor: None,
            limit: MAX_LIST_LIMIT,
        }
    }

    /// Sets the continuation cursor.
    pub fn with_cursor(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor;
        self
    }

    /// Sets the requested page size.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

impl Default for ListOptions {
    fn default() -> Self {
        Self::all()
    }
}

/// One page of a `list` response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Keys in this page.
    pub keys: Vec<String>,
    /// Cursor for the next page, if the store reports one.
    pub cursor: Option<String>,
    /// Whether the store considers the listing finished.
    pub list_complete: bool,
}

impl ListPage {
    /// Returns true if this page ends the listing by either signal.
    pub fn is_last(&self) -> bool {
        self.list_complete || self.cursor.is_none()
    }
}

/// Lists a page out of an ordered map.
///
/// The cursor is the last key of the previous page, so listing is stable
/// under concurrent inserts elsewhere in the key space.
pub(crate) fn list_ordered<V>(
    data: &BTreeMap<String, V>,
    options: &ListOptions,
    page_limit: usize,
) -> StorageResult<ListPage> {
    let limit = options.limit.clamp(1, page_limit.max(1));

    let start = match &options.cursor {
        Some(cursor) => {
            if !cursor.starts_with(&options.prefix) {
                return Err(StorageError::InvalidCursor {
                    cursor: cursor.clone(),
                    prefix: options.prefix.clone(),
                });
            }
            Bound::Excluded(cursor.clone())
        }
        None => Bound::Included(options.prefix.clone()),
    };

    let mut matching = data
        .range((start, Bound::Unbounded))
        .map(|(key, _)| key)
        .take_while(|key| key.starts_with(&options.prefix));

    let keys: Vec<String> = matching.by_ref().take(limit).cloned().collect();
    let has_more = matching.next().is_some();

    let cursor = if has_more { keys.last().cloned() } else { None };

    Ok(ListPage {
        keys,
        cursor,
        list_complete: !has_more,
    })
}
