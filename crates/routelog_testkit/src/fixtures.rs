//! Test fixtures and store helpers.
//!
//! Provides ready-wired stores, a manual clock and the core services built
//! on top of them.

use routelog_core::{
    AccountService, BackupScheduler, ExportConfig, Exporter, ManualClock, SnapshotManager,
};
use routelog_storage::{
    DirObjectStore, FileKvStore, InMemoryKvStore, InMemoryObjectStore, KeyValueStore, ObjectStore,
};
use std::sync::Arc;
use tempfile::TempDir;

/// 2024-05-01T03:00:00Z in milliseconds since the epoch.
pub const T0_MILLIS: i64 = 1_714_532_400_000;

/// Returns an account record shaped like one written by signup, with a
/// placeholder password hash.
pub fn account_json(token: &str) -> String {
    serde_json::json!({
        "password": "0".repeat(64),
        "token": token,
        "resetKey": format!("reset-{token}"),
        "createdAt": "2024-01-01T00:00:00.000Z",
    })
    .to_string()
}

/// Stores wired to a manual clock.
pub struct TestEnv<K: KeyValueStore + 'static = InMemoryKvStore> {
    /// The key-value store.
    pub kv: Arc<K>,
    /// Backup destination.
    pub objects: Arc<InMemoryObjectStore>,
    /// Clock shared by every service, starting at [`T0_MILLIS`].
    pub clock: Arc<ManualClock>,
}

impl TestEnv {
    /// Creates an environment over an empty in-memory store.
    pub fn new() -> Self {
        Self::with_kv(InMemoryKvStore::new())
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: KeyValueStore + 'static> TestEnv<K> {
    /// Creates an environment over `kv`.
    pub fn with_kv(kv: K) -> Self {
        Self {
            kv: Arc::new(kv),
            objects: Arc::new(InMemoryObjectStore::new()),
            clock: Arc::new(ManualClock::from_millis(T0_MILLIS)),
        }
    }

    /// Returns the store as a trait object.
    pub fn kv_dyn(&self) -> Arc<dyn KeyValueStore> {
        self.kv.clone()
    }

    /// Builds a snapshot manager.
    pub fn snapshots(&self) -> SnapshotManager {
        SnapshotManager::new(self.kv_dyn(), self.clock.clone())
    }

    /// Builds an exporter.
    pub fn exporter(&self, config: ExportConfig) -> Exporter {
        Exporter::with_config(self.kv_dyn(), config)
    }

    /// Builds a backup scheduler writing to [`objects`](Self::objects).
    pub fn scheduler(&self, config: ExportConfig) -> BackupScheduler {
        let objects: Arc<dyn ObjectStore> = self.objects.clone();
        BackupScheduler::new(self.exporter(config), objects, self.clock.clone())
    }

    /// Builds an account service.
    pub fn accounts(&self) -> AccountService {
        AccountService::new(self.kv_dyn(), self.clock.clone())
    }

    /// Writes an account under `user:{username}` and, if given, its logs.
    ///
    /// # Panics
    ///
    /// Panics if the store rejects a write.
    pub async fn seed_account(&self, username: &str, token: &str, logs: Option<&str>) {
        self.kv
            .put(&format!("user:{username}"), &account_json(token), None)
            .await
            .expect("seed account");
        if let Some(logs) = logs {
            self.kv
                .put(&format!("logs:{token}"), logs, None)
                .await
                .expect("seed logs");
        }
    }

    /// Reads a key.
    ///
    /// # Panics
    ///
    /// Panics if the store fails.
    pub async fn read(&self, key: &str) -> Option<String> {
        self.kv.get(key).await.expect("read")
    }
}

/// File-backed stores in a temporary directory, removed on drop.
pub struct TempStores {
    /// The key-value store file.
    pub kv: Arc<FileKvStore>,
    /// The backup directory.
    pub objects: Arc<DirObjectStore>,
    dir: TempDir,
}

impl TempStores {
    /// Creates both stores.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be set up.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let kv = FileKvStore::open(&dir.path().join("kv.json")).expect("Failed to open kv store");
        let objects =
            DirObjectStore::open(&dir.path().join("backups")).expect("Failed to open backup dir");
        Self {
            kv: Arc::new(kv),
            objects: Arc::new(objects),
            dir,
        }
    }

    /// Reopens the key-value file, as a restarted process would.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be read.
    pub fn reopen_kv(&self) -> FileKvStore {
        FileKvStore::open(&self.dir.path().join("kv.json")).expect("Failed to reopen kv store")
    }

    /// Returns the temporary directory.
    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }
}

impl Default for TempStores {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeded_env_reads_back() {
        let env = TestEnv::new();
        env.seed_account("amy", "tok", Some("[]")).await;
        assert!(env.read("user:amy").await.is_some());
        assert_eq!(env.read("logs:tok").await.as_deref(), Some("[]"));
        assert_eq!(env.kv.len(), 2);
    }

    #[tokio::test]
    async fn temp_stores_persist() {
        let stores = TempStores::new();
        stores.kv.put("k", "v", None).await.unwrap();
        let reopened = stores.reopen_kv();
        assert_eq!(reopened.get("k").await.unwrap().as_deref(), Some("v"));
        assert!(stores.path().join("backups").is_dir());
    }
}
