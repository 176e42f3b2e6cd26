//! Scheduled backups to the object store.
//!
//! A backup is an export serialized as pretty JSON and written to
//! `logs-{YYYY-MM-DD}.json`, named after the UTC date of the trigger. A
//! second backup on the same date overwrites the first.

use crate::clock::Clock;
use crate::config::BackupSchedule;
use crate::error::CoreResult;
use crate::export::Exporter;
use crate::keys::backup_name;
use chrono::{DateTime, Utc};
use routelog_storage::{ObjectStore, JSON_CONTENT_TYPE};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Result of a written backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupReceipt {
    /// Object name written.
    pub name: String,
    /// Entries in the bundle.
    pub entries: usize,
    /// Size of the written object in bytes.
    pub bytes: usize,
    /// Keys left out because they could not be read.
    pub skipped: Vec<String>,
}

/// Writes export bundles to an object store.
#[derive(Clone)]
pub struct BackupScheduler {
    exporter: Exporter,
    objects: Arc<dyn ObjectStore>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for BackupScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupScheduler")
            .field("exporter", &self.exporter)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl BackupScheduler {
    /// Creates a scheduler.
    pub fn new(exporter: Exporter, objects: Arc<dyn ObjectStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            exporter,
            objects,
            clock,
        }
    }

    /// Exports the store and writes the bundle named after `trigger`.
    ///
    /// # Errors
    ///
    /// Export, serialization and object store errors propagate.
    pub async fn backup_for(&self, trigger: DateTime<Utc>) -> CoreResult<BackupReceipt> {
        let bundle = self.exporter.export().await?;
        let body = bundle.to_json_pretty()?;
        let name = backup_name(trigger.date_naive());
        let bytes = body.len();

        self.objects
            .put(&name, body.into_bytes(), JSON_CONTENT_TYPE)
            .await?;

        info!(name = %name, entries = bundle.len(), bytes, "backup written");
        Ok(BackupReceipt {
            name,
            entries: bundle.len(),
            bytes,
            skipped: bundle.skipped,
        })
    }

    /// Writes a backup for the current date.
    ///
    /// # Errors
    ///
    /// As [`backup_for`](Self::backup_for).
    pub async fn backup_now(&self) -> CoreResult<BackupReceipt> {
        self.backup_for(self.clock.now()).await
    }

    /// Scheduled entry point. Never fails; errors are logged and `None` is
    /// returned.
    pub async fn run_scheduled_backup(&self, trigger: DateTime<Utc>) -> Option<BackupReceipt> {
        match self.backup_for(trigger).await {
            Ok(receipt) => Some(receipt),
            Err(e) => {
                error!(error = %e, trigger = %trigger, "scheduled backup failed");
                None
            }
        }
    }

    /// Runs [`run_scheduled_backup`](Self::run_scheduled_backup) once per
    /// day at the scheduled time until `shutdown` turns true or its sender
    /// is dropped.
    pub fn spawn(
        self: Arc<Self>,
        schedule: BackupSchedule,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut after = self.clock.now();
            loop {
                if *shutdown.borrow() {
                    break;
                }
                let now = self.clock.now();
                let next = schedule.next_after(after.max(now));
                let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                info!(next = %next, "next backup scheduled");

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {
                        self.run_scheduled_backup(next).await;
                        after = next;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            info!("backup scheduler stopped");
        })
    }
}
