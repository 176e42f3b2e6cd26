//! Backup command implementation.

use super::Context;
use crate::error::CliResult;
use routelog_core::{BackupReceipt, BackupScheduler, ExportConfig, Exporter};
use std::io::Write;
use tracing::{info, warn};

/// Builds a backup scheduler over the context's stores.
pub fn scheduler(ctx: &Context) -> CliResult<BackupScheduler> {
    let exporter = Exporter::with_config(ctx.kv()?, ExportConfig::new().with_pager(ctx.pager()));
    Ok(BackupScheduler::new(exporter, ctx.objects()?, ctx.clock()))
}

/// Writes today's backup object.
pub async fn run(ctx: &Context, out: &mut (dyn Write + Send)) -> CliResult<BackupReceipt> {
    let scheduler = scheduler(ctx)?;
    info!("Creating backup of {:?}", ctx.data_path());

    let receipt = scheduler.backup_now().await?;
    for key in &receipt.skipped {
        warn!(key = %key, "Unreadable key left out of backup");
    }

    writeln!(out, "✓ Backup created successfully")?;
    writeln!(out, "  Name: {}", receipt.name)?;
    writeln!(out, "  Entries: {}", receipt.entries)?;
    writeln!(out, "  Size: {} bytes", receipt.bytes)?;
    Ok(receipt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{seed, temp_context, text};
    use crate::commands::Context;
    use crate::error::CliError;

    #[tokio::test]
    async fn backup_writes_dated_object() {
        let (dir, ctx) = temp_context();
        seed(&ctx, &[("user:amy", "{}"), ("logs:t", "[]")]).await;

        let mut out = Vec::new();
        let receipt = run(&ctx, &mut out).await.unwrap();

        assert!(receipt.name.starts_with("logs-"));
        assert!(receipt.name.ends_with(".json"));
        assert_eq!(receipt.entries, 2);
        let written = std::fs::read_to_string(dir.path().join("backups").join(&receipt.name)).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed["logs:t"], "[]");
        assert!(text(out).contains("Backup created successfully"));
    }

    #[tokio::test]
    async fn backup_requires_directory() {
        let (dir, _) = temp_context();
        let ctx = Context::new(dir.path().join("kv.json"), None, None);
        let mut out = Vec::new();
        let err = run(&ctx, &mut out).await.unwrap_err();
        assert!(matches!(err, CliError::MissingPath(..)));
    }
}
