//! Exhaustive key enumeration across cursor pages.
//!
//! Hosted stores cap every `list` call and signal the last page in one of
//! two ways: a `list_complete` flag or a missing cursor. Both are treated as
//! terminal. A store that hands back any cursor it was already given is
//! treated as faulty instead of being polled forever.

use crate::config::PagerConfig;
use crate::error::{CoreError, CoreResult};
use routelog_storage::{KeyValueStore, ListOptions};
use std::collections::HashSet;
use tracing::debug;

/// Enumerates every key under a prefix.
///
/// # Example
///
/// ```rust
/// use routelog_core::{Pager, PagerConfig};
/// use routelog_storage::InMemoryKvStore;
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let kv = InMemoryKvStore::with_entries([("user:a", "1"), ("user:b", "2"), ("logs:x", "3")]);
/// let pager = Pager::new(&kv, PagerConfig::new().with_page_size(1));
/// let keys = pager.collect_keys("user:").await.unwrap();
/// assert_eq!(keys, vec!["user:a", "user:b"]);
/// # });
/// ```
pub struct Pager<'a> {
    store: &'a dyn KeyValueStore,
    config: PagerConfig,
}

impl<'a> Pager<'a> {
    /// Creates a pager over `store`.
    pub fn new(store: &'a dyn KeyValueStore, config: PagerConfig) -> Self {
        Self { store, config }
    }

    /// Starts a page-by-page enumeration of `prefix`.
    pub fn pages(&self, prefix: &str) -> KeyPages<'a> {
        KeyPages {
            store: self.store,
            options: ListOptions::with_prefix(prefix).with_limit(self.config.page_size),
            max_pages: self.config.max_pages,
            fetched: 0,
            seen: HashSet::new(),
            sent_cursors: HashSet::new(),
            done: false,
        }
    }

    /// Returns every key under `prefix`, each exactly once, in the order
    /// the store first reported them.
    ///
    /// # Errors
    ///
    /// Store errors propagate unchanged. Fails with
    /// [`CoreError::PaginationLimit`] rather than returning a partial set.
    pub async fn collect_keys(&self, prefix: &str) -> CoreResult<Vec<String>> {
        let mut pages = self.pages(prefix);
        let mut keys = Vec::new();
        while let Some(page) = pages.next_page().await? {
            keys.extend(page);
        }
        Ok(keys)
    }
}

/// An in-progress enumeration, yielding deduplicated pages.
pub struct KeyPages<'a> {
    store: &'a dyn KeyValueStore,
    options: ListOptions,
    max_pages: Option<usize>,
    fetched: usize,
    seen: HashSet<String>,
    sent_cursors: HashSet<String>,
    done: bool,
}

impl KeyPages<'_> {
    /// Fetches the next page.
    ///
    /// Returns `Ok(None)` once the store has signalled the end. Keys already
    /// yielded by an earlier page are dropped, so a page may be empty.
    ///
    /// # Errors
    ///
    /// Store errors propagate unchanged. Also fails when the page ceiling is
    /// reached before the end, or when the store repeats a cursor.
    pub async fn next_page(&mut self) -> CoreResult<Option<Vec<String>>> {
        if self.done {
            return Ok(None);
        }
        if let Some(max_pages) = self.max_pages {
            if self.fetched >= max_pages {
                return Err(CoreError::PaginationLimit {
                    prefix: self.options.prefix.clone(),
                    max_pages,
                });
            }
        }

        let page = self.store.list(&self.options).await?;
        self.fetched += 1;

        let last = page.is_last();
        let next_cursor = page.cursor;
        let keys: Vec<String> = page
            .keys
            .into_iter()
            .filter(|key| self.seen.insert(key.clone()))
            .collect();

        debug!(
            prefix = %self.options.prefix,
            page = self.fetched,
            keys = keys.len(),
            last,
            "listed page"
        );

        match next_cursor {
            Some(cursor) if !last => {
                if !self.sent_cursors.insert(cursor.clone()) {
                    return Err(CoreError::CursorStalled {
                        prefix: self.options.prefix.clone(),
                        cursor,
                    });
                }
                self.options.cursor = Some(cursor);
            }
            _ => self.done = true,
        }

        Ok(Some(keys))
    }

    /// Number of `list` calls made so far.
    pub fn pages_fetched(&self) -> usize {
        self.fetched
    }
}
