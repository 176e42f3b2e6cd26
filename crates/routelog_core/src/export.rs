//! Full-store export.
//!
//! An export enumerates every key in the store through the [`Pager`] and
//! reads each value. The result is a key -> raw value map; values are never
//! parsed.

use crate::config::{ExportConfig, ReadFailurePolicy};
use crate::error::CoreResult;
use crate::pager::Pager;
use routelog_storage::KeyValueStore;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A materialized export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportBundle {
    /// Every readable key with its raw value.
    pub entries: BTreeMap<String, String>,
    /// Keys left out because reading them failed.
    pub skipped: Vec<String>,
    /// Keys that were listed but gone by the time they were read.
    pub vanished: Vec<String>,
}

impl ExportBundle {
    /// Number of exported entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was exported.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serializes the entries as a pretty-printed JSON object.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> CoreResult<String> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }
}

/// Totals from a streaming export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Number of entries written.
    pub entries: usize,
    /// Keys left out because reading them failed.
    pub skipped: Vec<String>,
    /// Keys that were listed but gone by the time they were read.
    pub vanished: Vec<String>,
}

enum Read {
    Value(String),
    Vanished,
    Skipped,
}

/// Reads the whole store.
#[derive(Clone)]
pub struct Exporter {
    store: Arc<dyn KeyValueStore>,
    config: ExportConfig,
}

impl std::fmt::Debug for Exporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exporter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Exporter {
    /// Creates an exporter with default settings.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_config(store, ExportConfig::default())
    }

    /// Creates an exporter with explicit settings.
    pub fn with_config(store: Arc<dyn KeyValueStore>, config: ExportConfig) -> Self {
        Self { store, config }
    }

    /// Returns the export settings.
    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Exports every key in the store.
    ///
    /// # Errors
    ///
    /// Listing errors always propagate. Read errors propagate under
    /// [`ReadFailurePolicy::FailFast`].
    pub async fn export(&self) -> CoreResult<ExportBundle> {
        let pager = Pager::new(self.store.as_ref(), self.config.pager.clone());
        let mut pages = pager.pages("");
        let mut bundle = ExportBundle::default();

        while let Some(page) = pages.next_page().await? {
            for key in page {
                match self.read(&key).await? {
                    Read::Value(value) => {
                        bundle.entries.insert(key, value);
                    }
                    Read::Vanished => bundle.vanished.push(key),
                    Read::Skipped => bundle.skipped.push(key),
                }
            }
        }

        info!(
            entries = bundle.entries.len(),
            skipped = bundle.skipped.len(),
            vanished = bundle.vanished.len(),
            "export complete"
        );
        Ok(bundle)
    }

    /// Streams every key in the store to `writer` as a pretty-printed JSON
    /// object, one page at a time.
    ///
    /// The output matches [`ExportBundle::to_json_pretty`] for stores that
    /// list keys in lexicographic order.
    ///
    /// # Errors
    ///
    /// As [`export`](Self::export), plus write errors. On error the writer
    /// holds an incomplete document.
    pub async fn export_to_writer<W: Write + Send>(
        &self,
        writer: &mut W,
    ) -> CoreResult<ExportSummary> {
        let pager = Pager::new(self.store.as_ref(), self.config.pager.clone());
        let mut pages = pager.pages("");
        let mut summary = ExportSummary::default();

        writer.write_all(b"{")?;
        while let Some(page) = pages.next_page().await? {
            for key in page {
                match self.read(&key).await? {
                    Read::Value(value) => {
                        let sep: &[u8] = if summary.entries == 0 { b"\n  " } else { b",\n  " };
                        writer.write_all(sep)?;
                        serde_json::to_writer(&mut *writer, &key)?;
                        writer.write_all(b": ")?;
                        serde_json::to_writer(&mut *writer, &value)?;
                        summary.entries += 1;
                    }
                    Read::Vanished => summary.vanished.push(key),
                    Read::Skipped => summary.skipped.push(key),
                }
            }
            debug!(entries = summary.entries, "export page written");
        }
        let close: &[u8] = if summary.entries == 0 { b"}" } else { b"\n}" };
        writer.write_all(close)?;
        writer.flush()?;

        info!(
            entries = summary.entries,
            skipped = summary.skipped.len(),
            vanished = summary.vanished.len(),
            "streaming export complete"
        );
        Ok(summary)
    }

    async fn read(&self, key: &str) -> CoreResult<Read> {
        match self.store.get(key).await {
            Ok(Some(value)) => Ok(Read::Value(value)),
            Ok(None) => {
                debug!(key, "key vanished during export");
                Ok(Read::Vanished)
            }
            Err(e) => match self.config.on_read_failure {
                ReadFailurePolicy::FailFast => Err(e.into()),
                ReadFailurePolicy::SkipUnreadable => {
                    warn!(key, error = %e, "skipping unreadable key");
                    Ok(Read::Skipped)
                }
            },
        }
    }
}
