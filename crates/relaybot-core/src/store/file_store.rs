use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::StoreError;

use super::{KvStore, Namespace, StoreKey};

const NAMESPACES: [Namespace; 3] = [Namespace::Data, Namespace::Chats, Namespace::Prompt];

/// File-based store: one JSON document per key at `<root>/<namespace>/<user>.json`.
///
/// Writes go to a temp file that is renamed into place, so readers never
/// observe a half-written value.
pub struct FileStore {
    root: PathBuf,
    closed: AtomicBool,
    tmp_seq: AtomicU64,
}

impl FileStore {
    /// Open (and create if missing) the store directory tree.
    pub async fn open(root: &Path) -> Result<Self, StoreError> {
        for ns in NAMESPACES {
            let dir = root.join(ns.as_str());
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| StoreError::Write {
                    key: dir.display().to_string(),
                    message: e.to_string(),
                })?;
        }
        Ok(Self {
            root: root.to_path_buf(),
            closed: AtomicBool::new(false),
            tmp_seq: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &StoreKey) -> PathBuf {
        self.root
            .join(key.namespace.as_str())
            .join(format!("{}.json", key.user_id))
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KvStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, key: &StoreKey) -> Result<Option<serde_json::Value>, StoreError> {
        self.ensure_open()?;
        let path = self.key_path(key);

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::Read {
                    key: key.to_string(),
                    message: e.to_string(),
                })
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                key: key.to_string(),
                source,
            })
    }

    async fn set(&self, key: &StoreKey, value: serde_json::Value) -> Result<(), StoreError> {
        self.ensure_open()?;
        let path = self.key_path(key);
        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("json.{seq}.tmp"));

        let write_err = |e: std::io::Error| StoreError::Write {
            key: key.to_string(),
            message: e.to_string(),
        };

        let content = serde_json::to_vec(&value).map_err(|e| StoreError::Write {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        tokio::fs::write(&tmp, content).await.map_err(write_err)?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            tokio::fs::remove_file(&tmp).await.ok();
            return Err(write_err(e));
        }

        debug!("Wrote {}", key);
        Ok(())
    }

    async fn delete(&self, key: &StoreKey) -> Result<(), StoreError> {
        self.ensure_open()?;
        match tokio::fs::remove_file(self.key_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Write {
                key: key.to_string(),
                message: e.to_string(),
            }),
        }
    }

    async fn close(&self) -> Result<(), StoreError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!("File store at {} closed", self.root.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserId;
    use serde_json::json;

    #[tokio::test]
    async fn test_file_store_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path()).await.unwrap();

        let key = StoreKey::data(UserId(42));
        store.set(&key, json!({"subscribe": true, "id": 42})).await.unwrap();

        let path = tmp.path().join("data").join("42.json");
        assert!(path.exists());
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"subscribe\":true"));
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let key = StoreKey::chats(UserId(7));
        {
            let store = FileStore::open(tmp.path()).await.unwrap();
            store
                .set(&key, json!([{"role": "user", "content": "persistent msg"}]))
                .await
                .unwrap();
            store.close().await.unwrap();
        }

        let store = FileStore::open(tmp.path()).await.unwrap();
        let value = store.get(&key).await.unwrap().unwrap();
        assert_eq!(value[0]["content"], "persistent msg");
    }

    #[tokio::test]
    async fn test_file_store_delete_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path()).await.unwrap();
        let key = StoreKey::prompt(UserId(1));

        store.set(&key, json!("be brief")).await.unwrap();
        store.delete(&key).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap(), None);
        store.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path()).await.unwrap();
        std::fs::write(tmp.path().join("chats").join("5.json"), "{not json").unwrap();

        let err = store.get(&StoreKey::chats(UserId(5))).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_file_store_no_leftover_temp_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path()).await.unwrap();
        let key = StoreKey::chats(UserId(3));
        for i in 0..3 {
            store.set(&key, json!([i])).await.unwrap();
        }

        let names: Vec<String> = std::fs::read_dir(tmp.path().join("chats"))
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["3.json".to_string()]);
    }
}
