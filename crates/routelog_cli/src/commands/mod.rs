//! CLI command implementations.

pub mod backup;
pub mod export;
pub mod serve;
pub mod snapshot;
pub mod users;

use crate::error::{CliError, CliResult};
use routelog_core::{Clock, PagerConfig, SystemClock};
use routelog_storage::{DirObjectStore, FileKvStore, KeyValueStore, ObjectStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Store locations and listing settings shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    data: PathBuf,
    backup_dir: Option<PathBuf>,
    page_size: Option<usize>,
}

impl Context {
    /// Creates a context.
    pub fn new(data: PathBuf, backup_dir: Option<PathBuf>, page_size: Option<usize>) -> Self {
        Self {
            data,
            backup_dir,
            page_size,
        }
    }

    /// Path of the key-value data file.
    pub fn data_path(&self) -> &Path {
        &self.data
    }

    /// Opens the key-value store.
    pub fn kv(&self) -> CliResult<Arc<dyn KeyValueStore>> {
        Ok(Arc::new(FileKvStore::open(&self.data)?))
    }

    /// Opens the backup directory.
    pub fn objects(&self) -> CliResult<Arc<dyn ObjectStore>> {
        let dir = self
            .backup_dir
            .as_deref()
            .ok_or(CliError::MissingPath("--backup-dir", "ROUTELOG_BACKUP_DIR"))?;
        Ok(Arc::new(DirObjectStore::open(dir)?))
    }

    /// Listing settings.
    pub fn pager(&self) -> PagerConfig {
        match self.page_size {
            Some(size) => PagerConfig::new().with_page_size(size),
            None => PagerConfig::new(),
        }
    }

    /// The wall clock.
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::new(SystemClock)
    }
}
