//! Soft-delete and point-in-time restore.
//!
//! Soft-delete never removes a live key. It copies the live account (and
//! its log collection) into immutable snapshot keys and then flags the live
//! values as deleted. Restore copies a snapshot back over the live key and
//! leaves the snapshot in place.
//!
//! The store has no transactions, so both operations are written as a
//! sequence of steps that are each safe to repeat:
//!
//! ```text
//! soft_delete:  read live -> pick timestamp -> write account snapshot
//!               -> flag live account -> write logs snapshot -> flag live logs
//! restore:      pick snapshot -> write live account -> pick logs snapshot
//!               -> write live logs
//! ```
//!
//! A failure part-way leaves earlier steps in place; re-running the whole
//! operation is always safe.

use crate::clock::{epoch_millis, iso_millis, Clock};
use crate::config::PagerConfig;
use crate::error::{CoreError, CoreResult};
use crate::keys::{logs_key, user_key, SnapshotKey, SnapshotKind, SNAPSHOT_PREFIX};
use crate::pager::Pager;
use crate::record::{annotate_logs_deleted, strip_logs_deleted, AccountRecord};
use routelog_storage::KeyValueStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What a soft-delete wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftDeleteReport {
    /// Snapshot of the account record.
    pub account_snapshot: SnapshotKey,
    /// Snapshot of the log collection, if the account had one.
    pub logs_snapshot: Option<SnapshotKey>,
    /// Whether the live log payload received deletion markers.
    pub logs_annotated: bool,
}

/// What a restore wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    /// The account snapshot copied to the live key.
    pub account_snapshot: SnapshotKey,
    /// The log snapshot copied to the live key, if one was found.
    pub logs_snapshot: Option<SnapshotKey>,
}

/// Owns soft-delete, restore and snapshot listing.
#[derive(Clone)]
pub struct SnapshotManager {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    pager: PagerConfig,
}

impl std::fmt::Debug for SnapshotManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotManager")
            .field("clock", &self.clock)
            .field("pager", &self.pager)
            .finish_non_exhaustive()
    }
}

impl SnapshotManager {
    /// Creates a manager over `store`.
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            pager: PagerConfig::default(),
        }
    }

    /// Sets the enumeration settings used for snapshot lookups.
    #[must_use]
    pub fn with_pager_config(mut self, pager: PagerConfig) -> Self {
        self.pager = pager;
        self
    }

    /// Soft-deletes an account.
    ///
    /// Returns `Ok(false)` when no live record exists for `username`.
    ///
    /// # Errors
    ///
    /// Store errors propagate. Steps completed before the failure are not
    /// rolled back.
    pub async fn soft_delete(&self, username: &str) -> CoreResult<bool> {
        Ok(self.soft_delete_detailed(username).await?.is_some())
    }

    /// Soft-deletes an account and reports the keys written.
    ///
    /// Returns `Ok(None)` when no live record exists for `username`.
    ///
    /// # Errors
    ///
    /// Store errors propagate, as does a live record that is not an
    /// account object.
    pub async fn soft_delete_detailed(
        &self,
        username: &str,
    ) -> CoreResult<Option<SoftDeleteReport>> {
        let live_key = user_key(username);
        let Some(raw) = self.store.get(&live_key).await? else {
            debug!(username, "soft-delete: no live record");
            return Ok(None);
        };
        let mut record = AccountRecord::parse(&live_key, &raw)?;

        let token = record.log_token().map(str::to_string);
        let logs = match &token {
            Some(token) => self.store.get(&logs_key(token)).await?,
            None => None,
        };

        let now = self.clock.now();
        let logs_token = token.as_deref().filter(|_| logs.is_some());
        let timestamp_ms = self
            .next_timestamp(username, logs_token, epoch_millis(now))
            .await?;

        let account_snapshot = SnapshotKey::new(SnapshotKind::User, username, timestamp_ms);
        self.store.put(&account_snapshot.key(), &raw, None).await?;

        let deleted_at = iso_millis(now);
        record.mark_deleted(deleted_at.clone());
        self.store.put(&live_key, &record.to_json()?, None).await?;

        let mut logs_snapshot = None;
        let mut logs_annotated = false;
        if let (Some(token), Some(payload)) = (token, logs) {
            let snapshot = SnapshotKey::new(SnapshotKind::Logs, token.as_str(), timestamp_ms);
            self.store.put(&snapshot.key(), &payload, None).await?;

            match annotate_logs_deleted(&payload, &deleted_at) {
                Some(annotated) => {
                    self.store.put(&logs_key(&token), &annotated, None).await?;
                    logs_annotated = true;
                }
                None => debug!(username, "log payload is not a JSON object; left unmarked"),
            }
            logs_snapshot = Some(snapshot);
        }

        info!(
            username,
            snapshot = %account_snapshot,
            logs = logs_snapshot.is_some(),
            "account soft-deleted"
        );

        Ok(Some(SoftDeleteReport {
            account_snapshot,
            logs_snapshot,
            logs_annotated,
        }))
    }

    /// Restores an account from a snapshot.
    ///
    /// With no `snapshot_key`, the most recent account snapshot is used.
    /// Returns `Ok(false)` when no usable snapshot exists.
    ///
    /// # Errors
    ///
    /// Store errors propagate, as does a snapshot that is not an account
    /// object.
    pub async fn restore(&self, username: &str, snapshot_key: Option<&str>) -> CoreResult<bool> {
        Ok(self.restore_detailed(username, snapshot_key).await?.is_some())
    }

    /// Restores an account and reports the snapshots used.
    ///
    /// An explicit `snapshot_key` must be an account snapshot of
    /// `username`; any other key is refused with `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Store errors propagate, as does a snapshot that is not an account
    /// object.
    pub async fn restore_detailed(
        &self,
        username: &str,
        snapshot_key: Option<&str>,
    ) -> CoreResult<Option<RestoreReport>> {
        let chosen = match snapshot_key {
            Some(key) => match SnapshotKey::parse_for(SnapshotKind::User, username, key) {
                Some(parsed) => parsed,
                None => {
                    warn!(username, key, "refusing snapshot that does not belong to account");
                    return Ok(None);
                }
            },
            None => match self.latest_snapshot(SnapshotKind::User, username).await? {
                Some(latest) => latest,
                None => {
                    debug!(username, "restore: no snapshots");
                    return Ok(None);
                }
            },
        };

        let chosen_key = chosen.key();
        let Some(raw) = self.store.get(&chosen_key).await? else {
            debug!(username, snapshot = %chosen_key, "restore: snapshot missing");
            return Ok(None);
        };
        let mut record = AccountRecord::parse(&chosen_key, &raw)?;

        let live_value = if record.is_marked_deleted() {
            record.clear_deleted();
            record.to_json()?
        } else {
            raw
        };
        self.store.put(&user_key(username), &live_value, None).await?;

        let logs_snapshot = match record.log_token() {
            Some(token) => self.restore_logs(token, chosen.timestamp_ms).await?,
            None => None,
        };

        info!(
            username,
            snapshot = %chosen,
            logs = logs_snapshot.is_some(),
            "account restored"
        );

        Ok(Some(RestoreReport {
            account_snapshot: chosen,
            logs_snapshot,
        }))
    }

    /// Returns every snapshot of `subject`, oldest first.
    ///
    /// # Errors
    ///
    /// Store errors propagate.
    pub async fn list_snapshots(
        &self,
        kind: SnapshotKind,
        subject: &str,
    ) -> CoreResult<Vec<SnapshotKey>> {
        let keys = Pager::new(self.store.as_ref(), self.pager.clone())
            .collect_keys(&kind.prefix(subject))
            .await?;
        let mut snapshots: Vec<SnapshotKey> = keys
            .iter()
            .filter_map(|key| SnapshotKey::parse_for(kind, subject, key))
            .collect();
        snapshots.sort_by_key(|s| s.timestamp_ms);
        Ok(snapshots)
    }

    /// Returns the most recent snapshot of `subject`.
    ///
    /// # Errors
    ///
    /// Store errors propagate.
    pub async fn latest_snapshot(
        &self,
        kind: SnapshotKind,
        subject: &str,
    ) -> CoreResult<Option<SnapshotKey>> {
        Ok(self.list_snapshots(kind, subject).await?.pop())
    }

    /// Returns every snapshot key in the store, in listing order.
    ///
    /// # Errors
    ///
    /// Store errors propagate.
    pub async fn list_all_snapshots(&self) -> CoreResult<Vec<String>> {
        Pager::new(self.store.as_ref(), self.pager.clone())
            .collect_keys(SNAPSHOT_PREFIX)
            .await
    }

    /// Picks a timestamp later than every existing snapshot of the account
    /// (and of its logs) and not earlier than `now_ms`, then moves past any
    /// key that is already taken.
    async fn next_timestamp(
        &self,
        username: &str,
        logs_token: Option<&str>,
        now_ms: u64,
    ) -> CoreResult<u64> {
        let mut timestamp_ms = now_ms;
        if let Some(latest) = self.latest_snapshot(SnapshotKind::User, username).await? {
            timestamp_ms = timestamp_ms.max(after(&latest)?);
        }
        if let Some(token) = logs_token {
            if let Some(latest) = self.latest_snapshot(SnapshotKind::Logs, token).await? {
                timestamp_ms = timestamp_ms.max(after(&latest)?);
            }
        }

        loop {
            let account = SnapshotKey::new(SnapshotKind::User, username, timestamp_ms);
            let mut taken = self.store.get(&account.key()).await?.is_some();
            if !taken {
                if let Some(token) = logs_token {
                    let logs = SnapshotKey::new(SnapshotKind::Logs, token, timestamp_ms);
                    taken = self.store.get(&logs.key()).await?.is_some();
                }
            }
            if !taken {
                return Ok(timestamp_ms);
            }
            debug!(username, timestamp_ms, "snapshot timestamp taken; moving on");
            timestamp_ms = after(&SnapshotKey::new(SnapshotKind::User, username, timestamp_ms))?;
        }
    }

    /// Restores the log collection for `token`, preferring the snapshot
    /// taken together with the account snapshot.
    async fn restore_logs(&self, token: &str, paired_ms: u64) -> CoreResult<Option<SnapshotKey>> {
        let mut snapshots = self.list_snapshots(SnapshotKind::Logs, token).await?;
        let chosen = match snapshots.iter().position(|s| s.timestamp_ms == paired_ms) {
            Some(index) => snapshots.swap_remove(index),
            None => match snapshots.pop() {
                Some(latest) => latest,
                None => return Ok(None),
            },
        };

        let Some(payload) = self.store.get(&chosen.key()).await? else {
            return Ok(None);
        };
        self.store
            .put(&logs_key(token), &strip_logs_deleted(&payload), None)
            .await?;
        Ok(Some(chosen))
    }
}

/// The millisecond after `snapshot`, refusing a timestamp at the end of
/// the range.
fn after(snapshot: &SnapshotKey) -> CoreResult<u64> {
    snapshot
        .timestamp_ms
        .checked_add(1)
        .ok_or_else(|| CoreError::malformed(snapshot.key(), "snapshot timestamp out of range"))
}
