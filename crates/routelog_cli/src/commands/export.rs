//! Export command implementation.

use super::Context;
use crate::error::CliResult;
use routelog_core::{ExportConfig, ExportSummary, Exporter, ReadFailurePolicy};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

/// Streams the whole store as JSON to `output`, or to `out` when no file
/// is given.
pub async fn run(
    ctx: &Context,
    output: Option<&Path>,
    skip_unreadable: bool,
    out: &mut (dyn Write + Send),
) -> CliResult<ExportSummary> {
    let policy = if skip_unreadable {
        ReadFailurePolicy::SkipUnreadable
    } else {
        ReadFailurePolicy::FailFast
    };
    let config = ExportConfig::new()
        .with_pager(ctx.pager())
        .with_read_failure_policy(policy);
    let exporter = Exporter::with_config(ctx.kv()?, config);

    info!("Exporting {:?}", ctx.data_path());

    let summary = match output {
        Some(path) => {
            let mut file = BufWriter::new(File::create(path)?);
            let summary = exporter.export_to_writer(&mut file).await?;
            file.flush()?;

            writeln!(out, "✓ Export written")?;
            writeln!(out, "  Path: {:?}", path)?;
            writeln!(out, "  Entries: {}", summary.entries)?;
            summary
        }
        None => {
            let mut sink = &mut *out;
            let summary = exporter.export_to_writer(&mut sink).await?;
            writeln!(out)?;
            info!(entries = summary.entries, "Export complete");
            summary
        }
    };

    for key in &summary.skipped {
        warn!(key = %key, "Unreadable key left out of export");
    }
    if !summary.vanished.is_empty() {
        info!(count = summary.vanished.len(), "Keys removed during export");
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{seed, temp_context, text};

    #[tokio::test]
    async fn export_to_stdout_is_json() {
        let (_dir, ctx) = temp_context();
        seed(&ctx, &[("user:amy", "{}"), ("logs:t", "[1]"), ("misc", "x")]).await;

        let mut out = Vec::new();
        let summary = run(&ctx, None, false, &mut out).await.unwrap();
        assert_eq!(summary.entries, 3);

        let parsed: serde_json::Value = serde_json::from_str(&text(out)).unwrap();
        assert_eq!(parsed["logs:t"], "[1]");
        assert_eq!(parsed["misc"], "x");
    }

    #[tokio::test]
    async fn export_to_file_reports_path() {
        let (dir, ctx) = temp_context();
        seed(&ctx, &[("a", "1"), ("b", "2")]).await;
        let path = dir.path().join("export.json");

        let mut out = Vec::new();
        run(&ctx, Some(&path), false, &mut out).await.unwrap();

        let report = text(out);
        assert!(report.contains("Entries: 2"));
        let written = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed["b"], "2");
    }

    #[tokio::test]
    async fn empty_store_exports_empty_object() {
        let (_dir, ctx) = temp_context();
        let mut out = Vec::new();
        let summary = run(&ctx, None, true, &mut out).await.unwrap();
        assert_eq!(summary.entries, 0);
        assert_eq!(text(out).trim(), "{}");
    }
}
