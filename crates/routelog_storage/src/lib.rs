//! # Routelog Storage
//!
//! Collaborator traits and implementations for the Routelog backend.
//!
//! The data-lifecycle core never talks to a concrete store. It is written
//! against two small traits:
//!
//! - [`KeyValueStore`] - an eventually consistent namespace with
//!   `get`/`put`/`delete` and cursor-paged `list`
//! - [`ObjectStore`] - a durable blob sink used for backups
//!
//! Stores are **opaque string stores**. They do not interpret account
//! records, log payloads or snapshot keys.
//!
//! ## Available Stores
//!
//! - [`InMemoryKvStore`] / [`InMemoryObjectStore`] - for tests and ephemeral use
//! - [`FileKvStore`] - whole-namespace JSON file, rewritten atomically
//! - [`DirObjectStore`] - one file per object in a directory
//!
//! ## Example
//!
//! ```rust
//! use routelog_storage::{InMemoryKvStore, KeyValueStore, ListOptions};
//!
//! # tokio_test_block(async {
//! let kv = InMemoryKvStore::new();
//! kv.put("user:alice", "{}", None).await.unwrap();
//! let page = kv.list(&ListOptions::with_prefix("user:")).await.unwrap();
//! assert_eq!(page.keys, vec!["user:alice".to_string()]);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod kv;
mod memory;
mod object;

pub use error::{StorageError, StorageResult};
pub use file::{DirObjectStore, FileKvStore};
pub use kv::{KeyValueStore, ListOptions, ListPage, Metadata, MAX_LIST_LIMIT};
pub use memory::{InMemoryKvStore, InMemoryObjectStore};
pub use object::{ObjectStore, StoredObject, JSON_CONTENT_TYPE};
