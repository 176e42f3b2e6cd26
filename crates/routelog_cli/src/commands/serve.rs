//! Scheduled backup loop.

use super::{backup, Context};
use crate::error::{CliError, CliResult};
use routelog_core::BackupSchedule;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Runs the daily backup loop until Ctrl-C.
pub async fn run(ctx: &Context, hour: u32, minute: u32) -> CliResult<()> {
    let schedule = BackupSchedule::daily_at(hour, minute)?;
    let scheduler = Arc::new(backup::scheduler(ctx)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = scheduler.spawn(schedule, shutdown_rx);
    info!(at = %schedule.time(), "Backup loop running, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down backup loop");
    if shutdown_tx.send(true).is_err() {
        warn!("Backup loop already stopped");
    }

    handle
        .await
        .map_err(|e| CliError::Failed(format!("backup loop failed: {e}")))
}
