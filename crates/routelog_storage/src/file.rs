//! File-based stores for single-host deployments.

use crate::error::{StorageError, StorageResult};
use crate::kv::{list_ordered, KeyValueStore, ListOptions, ListPage, Metadata, MAX_LIST_LIMIT};
use crate::object::{ObjectStore, StoredObject};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileEntry {
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<Metadata>,
}

/// A key-value store persisted as one JSON file.
///
/// The whole namespace is held in memory and the file is rewritten on every
/// mutation (write to a temporary sibling, sync, then rename), so a crash
/// leaves either the old or the new namespace on disk. Every operation first
/// checks the file's modification time and size and reloads the namespace
/// when another handle has rewritten it.
///
/// # Example
///
/// ```no_run
/// use routelog_storage::FileKvStore;
/// use std::path::Path;
///
/// let kv = FileKvStore::open(Path::new("routelog-kv.json")).unwrap();
/// assert_eq!(kv.path(), Path::new("routelog-kv.json"));
/// ```
#[derive(Debug)]
pub struct FileKvStore {
    path: PathBuf,
    state: RwLock<FileState>,
}

#[derive(Debug)]
struct FileState {
    data: BTreeMap<String, FileEntry>,
    stamp: Option<FileStamp>,
}

/// What the namespace was loaded from. `None` means no file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

impl FileKvStore {
    /// Opens the store at `path`, creating an empty namespace if the file
    /// does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let stamp = file_stamp(path)?;
        let data = read_namespace(path)?;
        debug!(path = %path.display(), keys = data.len(), "opened file kv store");

        Ok(Self {
            path: path.to_path_buf(),
            state: RwLock::new(FileState { data, stamp }),
        })
    }

    /// Returns the path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reloads the namespace if the file changed since it was last read or
    /// written through this handle.
    fn refresh(&self) -> StorageResult<()> {
        let current = file_stamp(&self.path)?;
        if self.state.read().stamp == current {
            return Ok(());
        }
        let mut state = self.state.write();
        if state.stamp != current {
            state.data = read_namespace(&self.path)?;
            state.stamp = current;
            debug!(path = %self.path.display(), keys = state.data.len(), "reloaded file kv store");
        }
        Ok(())
    }

    fn persist(&self, state: &mut FileState) -> StorageResult<()> {
        let encoded = serde_json::to_vec_pretty(&state.data)?;
        write_atomically(&self.path, &encoded)?;
        // An unreadable stamp only forces a reload on the next call.
        state.stamp = file_stamp(&self.path).ok().flatten();
        Ok(())
    }
}

fn file_stamp(path: &Path) -> StorageResult<Option<FileStamp>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(FileStamp {
            modified: meta.modified().ok(),
            len: meta.len(),
        })),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn read_namespace(path: &Path) -> StorageResult<BTreeMap<String, FileEntry>> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(err) => return Err(err.into()),
    };
    if raw.is_empty() {
        return Ok(BTreeMap::new());
    }
    Ok(serde_json::from_slice(&raw)?)
}

#[async_trait]
impl KeyValueStore for FileKvStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.refresh()?;
        Ok(self.state.read().data.get(key).map(|e| e.value.clone()))
    }

    async fn put(&self, key: &str, value: &str, metadata: Option<Metadata>) -> StorageResult<()> {
        self.refresh()?;
        let mut state = self.state.write();
        let previous = state.data.insert(
            key.to_string(),
            FileEntry {
                value: value.to_string(),
                metadata,
            },
        );
        if let Err(err) = self.persist(&mut state) {
            // Keep memory and disk in agreement.
            match previous {
                Some(entry) => state.data.insert(key.to_string(), entry),
                None => state.data.remove(key),
            };
            return Err(err);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.refresh()?;
        let mut state = self.state.write();
        let Some(previous) = state.data.remove(key) else {
            return Ok(());
        };
        if let Err(err) = self.persist(&mut state) {
            state.data.insert(key.to_string(), previous);
            return Err(err);
        }
        Ok(())
    }

    async fn list(&self, options: &ListOptions) -> StorageResult<ListPage> {
        self.refresh()?;
        let state = self.state.read();
        list_ordered(&state.data, options, MAX_LIST_LIMIT)
    }
}

/// An object store that keeps one file per object in a directory.
///
/// Content types are kept in a `.meta` subdirectory next to the objects.
#[derive(Debug)]
pub struct DirObjectStore {
    root: PathBuf,
}

impl DirObjectStore {
    /// Opens an object store rooted at `root`, creating the directory if
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: &Path) -> StorageResult<Self> {
        fs::create_dir_all(root.join(".meta"))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, name: &str) -> StorageResult<PathBuf> {
        validate_object_name(name)?;
        Ok(self.root.join(name))
    }

    fn meta_path(&self, name: &str) -> PathBuf {
        self.root.join(".meta").join(name)
    }
}

#[async_trait]
impl ObjectStore for DirObjectStore {
    async fn put(&self, name: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<()> {
        let path = self.object_path(name)?;
        write_atomically(&path, &bytes)?;
        write_atomically(&self.meta_path(name), content_type.as_bytes())?;
        Ok(())
    }

    async fn get(&self, name: &str) -> StorageResult<Option<StoredObject>> {
        let path = self.object_path(name)?;
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        let content_type = fs::read_to_string(self.meta_path(name))
            .unwrap_or_else(|_| "application/octet-stream".to_string());
        Ok(Some(StoredObject {
            bytes,
            content_type,
        }))
    }

    async fn list_names(&self) -> StorageResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

fn validate_object_name(name: &str) -> StorageResult<()> {
    if name.is_empty()
        || name.starts_with('.')
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
    {
        return Err(StorageError::InvalidKey(name.to_string()));
    }
    Ok(())
}

fn write_atomically(path: &Path, bytes: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn file_kv_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kv.json");

        {
            let kv = FileKvStore::open(&path).unwrap();
            kv.put("user:amy", "{}", None).await.unwrap();
            kv.put("logs:t1", "[]", None).await.unwrap();
            kv.delete("logs:t1").await.unwrap();
        }

        let kv = FileKvStore::open(&path).unwrap();
        assert_eq!(kv.get("user:amy").await.unwrap().as_deref(), Some("{}"));
        assert_eq!(kv.get("logs:t1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_kv_sees_writes_from_another_handle() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kv.json");
        let first = FileKvStore::open(&path).unwrap();
        let second = FileKvStore::open(&path).unwrap();

        second.put("user:amy", "{}", None).await.unwrap();
        assert_eq!(first.get("user:amy").await.unwrap().as_deref(), Some("{}"));
        let page = first.list(&ListOptions::all()).await.unwrap();
        assert_eq!(page.keys, vec!["user:amy"]);

        // A write through the first handle keeps the second handle's key.
        first.put("user:bob", "{}", None).await.unwrap();
        second.delete("user:amy").await.unwrap();
        let page = first.list(&ListOptions::all()).await.unwrap();
        assert_eq!(page.keys, vec!["user:bob"]);
    }

    #[tokio::test]
    async fn file_kv_lists_in_order() {
        let dir = tempdir().unwrap();
        let kv = FileKvStore::open(&dir.path().join("kv.json")).unwrap();
        for key in ["user:cal", "user:amy", "logs:x", "user:bob"] {
            kv.put(key, "v", None).await.unwrap();
        }

        let page = kv.list(&ListOptions::with_prefix("user:")).await.unwrap();
        assert_eq!(page.keys, vec!["user:amy", "user:bob", "user:cal"]);
        assert!(page.list_complete);
    }

    #[tokio::test]
    async fn file_kv_rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kv.json");
        fs::write(&path, b"not json").unwrap();
        assert!(matches!(
            FileKvStore::open(&path),
            Err(StorageError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn dir_store_overwrites_and_lists() {
        let dir = tempdir().unwrap();
        let store = DirObjectStore::open(dir.path()).unwrap();

        store
            .put("logs-2024-05-01.json", b"{}".to_vec(), "application/json")
            .await
            .unwrap();
        store
            .put("logs-2024-05-01.json", b"{\"k\":\"v\"}".to_vec(), "application/json")
            .await
            .unwrap();

        assert_eq!(store.list_names().await.unwrap(), vec!["logs-2024-05-01.json"]);
        let object = store.get("logs-2024-05-01.json").await.unwrap().unwrap();
        assert_eq!(object.bytes, b"{\"k\":\"v\"}");
        assert_eq!(object.content_type, "application/json");
    }

    #[tokio::test]
    async fn dir_store_rejects_traversal() {
        let dir = tempdir().unwrap();
        let store = DirObjectStore::open(dir.path()).unwrap();
        let result = store.put("../escape.json", Vec::new(), "application/json").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn dir_store_missing_object() {
        let dir = tempdir().unwrap();
        let store = DirObjectStore::open(dir.path()).unwrap();
        assert!(store.get("logs-1999-01-01.json").await.unwrap().is_none());
    }
}
