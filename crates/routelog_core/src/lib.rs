//! # Routelog Core
//!
//! Data lifecycle for the Routelog backend.
//!
//! This crate provides:
//! - [`Pager`] for exhaustive cursor-paged key enumeration
//! - [`SnapshotManager`] for soft-delete and point-in-time restore
//! - [`Exporter`] for full-store exports
//! - [`BackupScheduler`] for daily backups to an object store
//! - [`AccountService`] for the account records themselves
//!
//! Everything is written against the store traits in `routelog_storage`
//! and an injected [`Clock`]. No state is held between calls; all of it
//! lives in the stores.
//!
//! ## Example
//!
//! ```rust
//! use routelog_core::{ManualClock, SnapshotManager};
//! use routelog_storage::{InMemoryKvStore, KeyValueStore};
//! use std::sync::Arc;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let kv = Arc::new(InMemoryKvStore::with_entries([("user:amy", r#"{"password":"x"}"#)]));
//! let snapshots = SnapshotManager::new(kv.clone(), Arc::new(ManualClock::from_millis(1_000)));
//!
//! assert!(snapshots.soft_delete("amy").await.unwrap());
//! assert!(kv.get("deleted:user:amy:1000").await.unwrap().is_some());
//! assert!(snapshots.restore("amy", None).await.unwrap());
//! # });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod account;
mod backup;
mod clock;
mod config;
mod error;
mod export;
pub mod keys;
mod pager;
mod record;
mod snapshot;

pub use account::{hash_password, AccountService, SignupReceipt, EMPTY_LOGS};
pub use backup::{BackupReceipt, BackupScheduler};
pub use clock::{epoch_millis, iso_millis, Clock, ManualClock, SystemClock};
pub use config::{BackupSchedule, ExportConfig, PagerConfig, ReadFailurePolicy};
pub use error::{CoreError, CoreResult};
pub use export::{ExportBundle, ExportSummary, Exporter};
pub use keys::{backup_name, SnapshotKey, SnapshotKind};
pub use pager::{KeyPages, Pager};
pub use record::{
    annotate_logs_deleted, strip_logs_deleted, AccountRecord, LOGS_DELETED_AT, LOGS_DELETED_FLAG,
};
pub use snapshot::{RestoreReport, SnapshotManager, SoftDeleteReport};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
