pub mod memory_store;

#[cfg(feature = "file-backend")]
pub mod file_store;

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::{Config, StoreBackend};
use crate::error::{RelayError, StoreError};
use crate::types::UserId;

/// Record families. Every key is `(namespace, user)`, so distinct users never share a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Subscriber record.
    Data,
    /// Conversation transcript.
    Chats,
    /// System directive.
    Prompt,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Data => "data",
            Namespace::Chats => "chats",
            Namespace::Prompt => "prompt",
        }
    }
}

/// Composite store key, namespace first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreKey {
    pub namespace: Namespace,
    pub user_id: UserId,
}

impl StoreKey {
    pub fn new(namespace: Namespace, user_id: UserId) -> Self {
        Self { namespace, user_id }
    }

    pub fn data(user_id: UserId) -> Self {
        Self::new(Namespace::Data, user_id)
    }

    pub fn chats(user_id: UserId) -> Self {
        Self::new(Namespace::Chats, user_id)
    }

    pub fn prompt(user_id: UserId) -> Self {
        Self::new(Namespace::Prompt, user_id)
    }
}

impl std::fmt::Display for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace.as_str(), self.user_id)
    }
}

/// Trait for key-value storage backends.
///
/// Values are JSON documents. `set` replaces whatever was stored, `delete` of an
/// absent key succeeds.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &str;

    async fn get(&self, key: &StoreKey) -> Result<Option<serde_json::Value>, StoreError>;

    async fn set(&self, key: &StoreKey, value: serde_json::Value) -> Result<(), StoreError>;

    async fn delete(&self, key: &StoreKey) -> Result<(), StoreError>;

    /// Release the backend. Later calls fail with `StoreError::Closed`.
    async fn close(&self) -> Result<(), StoreError>;
}

/// Read and deserialize a value.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn KvStore,
    key: &StoreKey,
) -> Result<Option<T>, StoreError> {
    match store.get(key).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                key: key.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

/// Serialize and write a value.
pub async fn set_json<T: Serialize + ?Sized>(
    store: &dyn KvStore,
    key: &StoreKey,
    value: &T,
) -> Result<(), StoreError> {
    let value = serde_json::to_value(value).map_err(|e| StoreError::Write {
        key: key.to_string(),
        message: e.to_string(),
    })?;
    store.set(key, value).await
}

/// Open the process-wide store handle selected by the config.
pub async fn open_store(config: &Config) -> Result<Arc<dyn KvStore>, RelayError> {
    match config.store.backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory store; state is lost on restart");
            Ok(Arc::new(memory_store::MemoryStore::new()))
        }
        #[cfg(feature = "file-backend")]
        StoreBackend::File => {
            let root = config.store_path();
            let store = file_store::FileStore::open(&root).await?;
            tracing::info!("Using file store at {}", root.display());
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "file-backend"))]
        StoreBackend::File => Err(crate::error::ConfigError::Invalid(
            "file store not available; rebuild with the file-backend feature".into(),
        )
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        flag: bool,
    }

    #[test]
    fn test_store_key_display() {
        assert_eq!(StoreKey::data(UserId(1)).to_string(), "data/1");
        assert_eq!(StoreKey::chats(UserId(-5)).to_string(), "chats/-5");
        assert_eq!(StoreKey::prompt(UserId(9)).to_string(), "prompt/9");
    }

    #[tokio::test]
    async fn test_json_helpers() {
        let store = memory_store::MemoryStore::new();
        let key = StoreKey::data(UserId(1));

        assert_eq!(get_json::<Record>(&store, &key).await.unwrap(), None);
        set_json(&store, &key, &Record { flag: true }).await.unwrap();
        assert_eq!(
            get_json::<Record>(&store, &key).await.unwrap(),
            Some(Record { flag: true })
        );
    }

    #[tokio::test]
    async fn test_get_json_reports_corrupt_value() {
        let store = memory_store::MemoryStore::new();
        let key = StoreKey::data(UserId(2));
        store.set(&key, serde_json::json!("not a record")).await.unwrap();

        let err = get_json::<Record>(&store, &key).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_open_memory_store() {
        let mut cfg = Config::default();
        cfg.store.backend = StoreBackend::Memory;
        let store = open_store(&cfg).await.unwrap();
        assert_eq!(store.name(), "memory");
    }
}
