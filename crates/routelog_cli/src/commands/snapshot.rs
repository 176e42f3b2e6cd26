//! Soft-delete, restore and snapshot listing commands.

use super::Context;
use crate::error::{CliError, CliResult};
use routelog_core::{RestoreReport, SnapshotKind, SnapshotManager, SoftDeleteReport};
use std::io::Write;
use tracing::info;

fn manager(ctx: &Context) -> CliResult<SnapshotManager> {
    Ok(SnapshotManager::new(ctx.kv()?, ctx.clock()).with_pager_config(ctx.pager()))
}

/// Snapshots `username` and marks the account deleted.
pub async fn soft_delete(
    ctx: &Context,
    username: &str,
    out: &mut (dyn Write + Send),
) -> CliResult<SoftDeleteReport> {
    info!(username, "Soft-deleting account");
    let report = manager(ctx)?
        .soft_delete_detailed(username)
        .await?
        .ok_or_else(|| CliError::Failed(format!("No account named {username:?}")))?;

    writeln!(out, "✓ Account soft-deleted")?;
    writeln!(out, "  Snapshot: {}", report.account_snapshot)?;
    match &report.logs_snapshot {
        Some(logs) => writeln!(out, "  Logs snapshot: {logs}")?,
        None => writeln!(out, "  Logs snapshot: none")?,
    }
    Ok(report)
}

/// Restores `username` from `snapshot`, or from its latest snapshot.
pub async fn restore(
    ctx: &Context,
    username: &str,
    snapshot: Option<&str>,
    out: &mut (dyn Write + Send),
) -> CliResult<RestoreReport> {
    info!(username, snapshot, "Restoring account");
    let report = manager(ctx)?
        .restore_detailed(username, snapshot)
        .await?
        .ok_or_else(|| CliError::Failed(format!("No snapshot to restore for {username:?}")))?;

    writeln!(out, "✓ Account restored")?;
    writeln!(out, "  From: {}", report.account_snapshot)?;
    if let Some(logs) = &report.logs_snapshot {
        writeln!(out, "  Logs from: {logs}")?;
    }
    Ok(report)
}

/// Prints snapshot keys, one per line.
///
/// With a username only that account's snapshots are listed, oldest first.
pub async fn list(
    ctx: &Context,
    username: Option<&str>,
    out: &mut (dyn Write + Send),
) -> CliResult<usize> {
    let manager = manager(ctx)?;
    let keys: Vec<String> = match username {
        Some(user) => manager
            .list_snapshots(SnapshotKind::User, user)
            .await?
            .iter()
            .map(|s| s.key())
            .collect(),
        None => manager.list_all_snapshots().await?,
    };

    for key in &keys {
        writeln!(out, "{key}")?;
    }
    info!(count = keys.len(), "Snapshots listed");
    Ok(keys.len())
}
