use std::sync::Arc;

use tracing::{debug, info};

use crate::config::CompletionConfig;
use crate::conversation::ConversationStore;
use crate::error::RelayError;
use crate::provider::LlmProvider;
use crate::subscription::SubscriptionRegistry;
use crate::types::{Message, UserId};

use super::{UserLockGuard, UserLocks};

/// Per-request completion parameters.
#[derive(Debug, Clone)]
pub struct CompletionSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl From<&CompletionConfig> for CompletionSettings {
    fn from(cfg: &CompletionConfig) -> Self {
        Self {
            model: cfg.model.clone(),
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
        }
    }
}

/// An exchange that passed the subscription check and holds its in-memory turns.
///
/// Dropping it without calling [`SessionOrchestrator::complete`] leaves the
/// stored transcript untouched.
pub struct PendingExchange {
    user_id: UserId,
    turns: Vec<Message>,
    _guard: Option<UserLockGuard>,
}

impl PendingExchange {
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Seed plus the new user turn.
    pub fn turns(&self) -> &[Message] {
        &self.turns
    }
}

pub struct SessionOrchestrator {
    subscriptions: SubscriptionRegistry,
    conversations: ConversationStore,
    provider: Arc<dyn LlmProvider>,
    settings: CompletionSettings,
    locks: Option<UserLocks>,
}

impl SessionOrchestrator {
    pub fn new(
        subscriptions: SubscriptionRegistry,
        conversations: ConversationStore,
        provider: Arc<dyn LlmProvider>,
        settings: CompletionSettings,
    ) -> Self {
        Self {
            subscriptions,
            conversations,
            provider,
            settings,
            locks: None,
        }
    }

    /// Serialize exchanges per user from `begin` until `complete` returns.
    pub fn with_user_locks(mut self, locks: UserLocks) -> Self {
        self.locks = Some(locks);
        self
    }

    /// Check the subscription, load the seed and push the user turn.
    ///
    /// Returns `None` for users who are not subscribed. Nothing is written.
    pub async fn begin(
        &self,
        user_id: UserId,
        text: &str,
    ) -> Result<Option<PendingExchange>, RelayError> {
        let guard = match &self.locks {
            Some(locks) => Some(locks.acquire(user_id).await),
            None => None,
        };

        if !self.subscriptions.is_subscribed(user_id).await? {
            debug!("Ignoring message from unsubscribed user {}", user_id);
            return Ok(None);
        }

        let mut turns = self.conversations.load_seed(user_id).await?;
        turns.push(Message::user(text));

        Ok(Some(PendingExchange {
            user_id,
            turns,
            _guard: guard,
        }))
    }

    /// Call the provider once, then persist the full transcript and return the reply.
    ///
    /// A provider failure returns early, so the stored transcript is unchanged.
    pub async fn complete(&self, pending: PendingExchange) -> Result<String, RelayError> {
        let PendingExchange {
            user_id,
            mut turns,
            _guard,
        } = pending;

        let response = self
            .provider
            .chat(
                &turns,
                &self.settings.model,
                self.settings.max_tokens,
                self.settings.temperature,
            )
            .await?;

        info!(
            "Completion for {}: {} turns, {} tokens",
            user_id,
            turns.len(),
            response.usage.total_tokens
        );

        turns.push(Message::assistant(response.content.clone()));
        self.conversations.append(user_id, &turns).await?;
        Ok(response.content)
    }

    /// `begin` followed by `complete`. `None` when the user is not subscribed.
    pub async fn exchange(&self, user_id: UserId, text: &str) -> Result<Option<String>, RelayError> {
        match self.begin(user_id, text).await? {
            Some(pending) => self.complete(pending).await.map(Some),
            None => Ok(None),
        }
    }
}
