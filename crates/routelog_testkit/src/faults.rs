//! Fault-injecting store wrappers.
//!
//! Each wrapper delegates to an inner store and changes one behavior:
//!
//! - [`FaultyKv`] fails or hides chosen keys and can fail listings or writes
//! - [`QuirkyPagingKv`] reproduces the ways hosted stores signal the last page
//! - [`FailingObjectStore`] rejects every write

use async_trait::async_trait;
use parking_lot::Mutex;
use routelog_storage::{
    KeyValueStore, ListOptions, ListPage, Metadata, ObjectStore, StorageError, StorageResult,
    StoredObject,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
struct Faults {
    failing_gets: HashSet<String>,
    vanishing: HashSet<String>,
    failing_puts: HashSet<String>,
    fail_lists: bool,
}

/// Wraps a store and injects errors for chosen keys.
#[derive(Debug)]
pub struct FaultyKv<S> {
    inner: S,
    faults: Mutex<Faults>,
    puts: AtomicUsize,
}

impl<S: KeyValueStore> FaultyKv<S> {
    /// Wraps `inner` with no faults configured.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            faults: Mutex::new(Faults::default()),
            puts: AtomicUsize::new(0),
        }
    }

    /// Makes reads of `key` fail.
    #[must_use]
    pub fn fail_get(self, key: impl Into<String>) -> Self {
        self.faults.lock().failing_gets.insert(key.into());
        self
    }

    /// Makes reads of `key` report the key as absent, although listings
    /// still include it.
    #[must_use]
    pub fn vanish(self, key: impl Into<String>) -> Self {
        self.faults.lock().vanishing.insert(key.into());
        self
    }

    /// Makes writes to `key` fail.
    #[must_use]
    pub fn fail_put(self, key: impl Into<String>) -> Self {
        self.faults.lock().failing_puts.insert(key.into());
        self
    }

    /// Turns listing failures on or off.
    pub fn set_fail_lists(&self, fail: bool) {
        self.faults.lock().fail_lists = fail;
    }

    /// Clears every configured fault.
    pub fn heal(&self) {
        *self.faults.lock() = Faults::default();
    }

    /// Number of successful writes so far.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: KeyValueStore> KeyValueStore for FaultyKv<S> {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let (fail, vanish) = {
            let faults = self.faults.lock();
            (faults.failing_gets.contains(key), faults.vanishing.contains(key))
        };
        if fail {
            return Err(StorageError::unavailable(format!("injected read failure: {key}")));
        }
        if vanish {
            return Ok(None);
        }
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: &str, metadata: Option<Metadata>) -> StorageResult<()> {
        if self.faults.lock().failing_puts.contains(key) {
            return Err(StorageError::unavailable(format!("injected write failure: {key}")));
        }
        self.inner.put(key, value, metadata).await?;
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }

    async fn list(&self, options: &ListOptions) -> StorageResult<ListPage> {
        if self.faults.lock().fail_lists {
            return Err(StorageError::unavailable("injected list failure"));
        }
        self.inner.list(options).await
    }
}

/// How a [`QuirkyPagingKv`] reports pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingQuirk {
    /// Never sets `list_complete`; only a missing cursor ends the listing.
    CursorOnly,
    /// Always returns a cursor; only `list_complete` ends the listing.
    FlagOnly,
    /// Repeats the previous page's last key at the start of each page.
    Overlapping,
    /// Hands back the request cursor unchanged once a page is not last.
    StuckCursor,
    /// Never reports the end: the last page points back at the first
    /// cursor handed out, so listing cycles through the same cursors.
    CyclingCursor,
}

/// Wraps a store and rewrites its listing pages.
#[derive(Debug)]
pub struct QuirkyPagingKv<S> {
    inner: S,
    quirk: PagingQuirk,
    lists: AtomicUsize,
    first_cursor: Mutex<Option<String>>,
}

impl<S: KeyValueStore> QuirkyPagingKv<S> {
    /// Wraps `inner`.
    pub fn new(inner: S, quirk: PagingQuirk) -> Self {
        Self {
            inner,
            quirk,
            lists: AtomicUsize::new(0),
            first_cursor: Mutex::new(None),
        }
    }

    /// Number of `list` calls served.
    pub fn list_calls(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: KeyValueStore> KeyValueStore for QuirkyPagingKv<S> {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: &str, metadata: Option<Metadata>) -> StorageResult<()> {
        self.inner.put(key, value, metadata).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }

    async fn list(&self, options: &ListOptions) -> StorageResult<ListPage> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        let mut page = self.inner.list(options).await?;
        let last = page.is_last();

        match self.quirk {
            PagingQuirk::CursorOnly => {
                page.list_complete = false;
                if last {
                    page.cursor = None;
                }
            }
            PagingQuirk::FlagOnly => {
                page.list_complete = last;
                if page.cursor.is_none() {
                    page.cursor = Some(
                        page.keys
                            .last()
                            .cloned()
                            .or_else(|| options.cursor.clone())
                            .unwrap_or_default(),
                    );
                }
            }
            PagingQuirk::Overlapping => {
                if let Some(cursor) = &options.cursor {
                    page.keys.insert(0, cursor.clone());
                }
            }
            PagingQuirk::StuckCursor => {
                if !last && options.cursor.is_some() {
                    page.cursor = options.cursor.clone();
                }
            }
            PagingQuirk::CyclingCursor => {
                let mut first = self.first_cursor.lock();
                if last {
                    if let Some(cursor) = first.clone() {
                        page.cursor = Some(cursor);
                        page.list_complete = false;
                    }
                } else if first.is_none() {
                    *first = page.cursor.clone();
                }
            }
        }
        Ok(page)
    }
}

/// An object store whose writes always fail.
#[derive(Debug, Default)]
pub struct FailingObjectStore {
    attempts: AtomicUsize,
}

impl FailingObjectStore {
    /// Creates the store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rejected writes.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for FailingObjectStore {
    async fn put(&self, name: &str, _bytes: Vec<u8>, _content_type: &str) -> StorageResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::unavailable(format!("injected object write failure: {name}")))
    }

    async fn get(&self, _name: &str) -> StorageResult<Option<StoredObject>> {
        Ok(None)
    }

    async fn list_names(&self) -> StorageResult<Vec<String>> {
        Ok(Vec::new())
    }
}
