//! Per-user opt-in state.
//!
//! A subscriber record is either present with `subscribe: true` or absent;
//! unsubscribing deletes it together with the user's transcript and directive.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::StoreError;
use crate::store::{self, KvStore, StoreKey};
use crate::types::UserId;

/// Persisted subscriber record (`data/<user>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub subscribe: bool,
    pub id: UserId,
}

/// Result of a `/subscribe` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Subscribed,
    AlreadySubscribed,
}

#[derive(Clone)]
pub struct SubscriptionRegistry {
    store: Arc<dyn KvStore>,
}

impl SubscriptionRegistry {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// True iff a record exists and its flag is set.
    pub async fn is_subscribed(&self, user_id: UserId) -> Result<bool, StoreError> {
        let record: Option<Subscriber> =
            store::get_json(self.store.as_ref(), &StoreKey::data(user_id)).await?;
        Ok(record.is_some_and(|r| r.subscribe))
    }

    pub async fn subscribe(&self, user_id: UserId) -> Result<SubscribeOutcome, StoreError> {
        if self.is_subscribed(user_id).await? {
            return Ok(SubscribeOutcome::AlreadySubscribed);
        }

        let record = Subscriber {
            subscribe: true,
            id: user_id,
        };
        store::set_json(self.store.as_ref(), &StoreKey::data(user_id), &record).await?;
        info!("User {} subscribed", user_id);
        Ok(SubscribeOutcome::Subscribed)
    }

    /// Remove the subscriber, transcript and directive. Absent records are fine.
    pub async fn unsubscribe(&self, user_id: UserId) -> Result<(), StoreError> {
        self.store.delete(&StoreKey::data(user_id)).await?;
        self.store.delete(&StoreKey::chats(user_id)).await?;
        self.store.delete(&StoreKey::prompt(user_id)).await?;
        info!("User {} unsubscribed", user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory_store::MemoryStore;
    use serde_json::json;

    fn registry() -> (Arc<MemoryStore>, SubscriptionRegistry) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), SubscriptionRegistry::new(store))
    }

    #[tokio::test]
    async fn test_not_subscribed_by_default() {
        let (_, reg) = registry();
        assert!(!reg.is_subscribed(UserId(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_subscribe_writes_record() {
        let (store, reg) = registry();
        let user = UserId(1);

        assert_eq!(reg.subscribe(user).await.unwrap(), SubscribeOutcome::Subscribed);
        assert!(reg.is_subscribed(user).await.unwrap());
        assert_eq!(
            store.get(&StoreKey::data(user)).await.unwrap(),
            Some(json!({"subscribe": true, "id": 1}))
        );
    }

    #[tokio::test]
    async fn test_subscribe_twice_is_noop() {
        let (store, reg) = registry();
        let user = UserId(2);

        reg.subscribe(user).await.unwrap();
        let before = store.get(&StoreKey::data(user)).await.unwrap();
        assert_eq!(
            reg.subscribe(user).await.unwrap(),
            SubscribeOutcome::AlreadySubscribed
        );
        assert_eq!(store.get(&StoreKey::data(user)).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_false_flag_counts_as_unsubscribed() {
        let (store, reg) = registry();
        let user = UserId(3);
        store
            .set(&StoreKey::data(user), json!({"subscribe": false, "id": 3}))
            .await
            .unwrap();

        assert!(!reg.is_subscribed(user).await.unwrap());
        assert_eq!(reg.subscribe(user).await.unwrap(), SubscribeOutcome::Subscribed);
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_everything() {
        let (store, reg) = registry();
        let user = UserId(4);
        reg.subscribe(user).await.unwrap();
        store.set(&StoreKey::chats(user), json!([])).await.unwrap();
        store.set(&StoreKey::prompt(user), json!("be terse")).await.unwrap();

        reg.unsubscribe(user).await.unwrap();
        assert!(!reg.is_subscribed(user).await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_unsubscribe_without_record() {
        let (_, reg) = registry();
        reg.unsubscribe(UserId(5)).await.unwrap();
    }

    #[tokio::test]
    async fn test_storage_failure_is_surfaced() {
        let (store, reg) = registry();
        store.close().await.unwrap();
        assert!(matches!(
            reg.subscribe(UserId(6)).await,
            Err(StoreError::Closed)
        ));
        assert!(matches!(
            reg.unsubscribe(UserId(6)).await,
            Err(StoreError::Closed)
        ));
    }
}
