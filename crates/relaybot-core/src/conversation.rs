//! Per-user directive and transcript storage.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::StoreError;
use crate::store::{self, KvStore, StoreKey};
use crate::types::{Message, Role, UserId};

#[derive(Clone)]
pub struct ConversationStore {
    store: Arc<dyn KvStore>,
    max_history: Option<usize>,
}

impl ConversationStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            max_history: None,
        }
    }

    /// Bound persisted transcripts to the last `max` non-system turns.
    pub fn with_max_history(mut self, max: Option<usize>) -> Self {
        self.max_history = max;
        self
    }

    /// Starting turns for the next exchange.
    ///
    /// An existing transcript is returned verbatim. Otherwise the directive, if
    /// any, becomes a single system turn. Otherwise the seed is empty.
    pub async fn load_seed(&self, user_id: UserId) -> Result<Vec<Message>, StoreError> {
        let key = StoreKey::chats(user_id);
        match self.store.get(&key).await? {
            Some(value) if value.is_array() => {
                return serde_json::from_value(value)
                    .map_err(|source| StoreError::Corrupt {
                        key: key.to_string(),
                        source,
                    });
            }
            Some(_) => warn!("Ignoring non-array transcript at {}", key),
            None => {}
        }

        Ok(match self.directive(user_id).await? {
            Some(directive) => vec![Message::system(directive)],
            None => Vec::new(),
        })
    }

    /// Persist the complete transcript, replacing whatever was stored.
    pub async fn append(&self, user_id: UserId, turns: &[Message]) -> Result<(), StoreError> {
        let key = StoreKey::chats(user_id);
        match self.max_history {
            Some(max) => {
                let windowed = window(turns, max);
                debug!("Persisting {} of {} turns for {}", windowed.len(), turns.len(), user_id);
                store::set_json(self.store.as_ref(), &key, &windowed).await
            }
            None => store::set_json(self.store.as_ref(), &key, turns).await,
        }
    }

    /// Drop the transcript. Directive and subscription stay.
    pub async fn clear(&self, user_id: UserId) -> Result<(), StoreError> {
        self.store.delete(&StoreKey::chats(user_id)).await
    }

    /// Stored directive, treating an empty string as absent.
    pub async fn directive(&self, user_id: UserId) -> Result<Option<String>, StoreError> {
        let directive: Option<String> =
            store::get_json(self.store.as_ref(), &StoreKey::prompt(user_id)).await?;
        Ok(directive.filter(|d| !d.is_empty()))
    }

    /// Replace the directive. Only seeds transcripts created after this call.
    pub async fn set_directive(&self, user_id: UserId, directive: &str) -> Result<(), StoreError> {
        store::set_json(self.store.as_ref(), &StoreKey::prompt(user_id), directive).await
    }
}

/// Keep a leading system turn plus at most the last `max` other turns, in order.
///
/// The kept turns never open with an assistant reply, so an odd `max` can
/// keep one turn fewer.
fn window(turns: &[Message], max: usize) -> Vec<Message> {
    let (head, rest) = match turns.first() {
        Some(first) if first.role == Role::System => (Some(first), &turns[1..]),
        _ => (None, turns),
    };
    let mut start = rest.len().saturating_sub(max);
    while rest.get(start).is_some_and(|m| m.role == Role::Assistant) {
        start += 1;
    }
    head.into_iter().chain(&rest[start..]).cloned().collect()
}
