//! Routes inbound messages to commands, the image handler or the chat session.
//!
//! Every error stops here. Chat failures are logged and produce no reply;
//! image failures and storage failures on commands get a short apology.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::channel::Channel;
use crate::config::SessionConfig;
use crate::conversation::ConversationStore;
use crate::image::{ImageHandler, ImageOutcome, ImageService};
use crate::provider::LlmProvider;
use crate::session::{CompletionSettings, SessionOrchestrator, UserLocks};
use crate::store::KvStore;
use crate::subscription::{SubscribeOutcome, SubscriptionRegistry};
use crate::types::{ChatAction, InboundMessage, OutboundMessage};

use super::commands::{self, parse_command, BotCommand};

pub struct Bot {
    subscriptions: SubscriptionRegistry,
    conversations: ConversationStore,
    sessions: SessionOrchestrator,
    images: ImageHandler,
    channel: Arc<dyn Channel>,
    username: Option<String>,
}

impl Bot {
    pub fn new(
        store: Arc<dyn KvStore>,
        provider: Arc<dyn LlmProvider>,
        image_service: Arc<dyn ImageService>,
        channel: Arc<dyn Channel>,
        completion: CompletionSettings,
        session: &SessionConfig,
    ) -> Self {
        let subscriptions = SubscriptionRegistry::new(store.clone());
        let conversations = ConversationStore::new(store).with_max_history(session.max_history);

        let mut sessions = SessionOrchestrator::new(
            subscriptions.clone(),
            conversations.clone(),
            provider,
            completion,
        );
        if session.serialize_exchanges {
            sessions = sessions.with_user_locks(UserLocks::new());
        }

        Self {
            images: ImageHandler::new(subscriptions.clone(), image_service),
            subscriptions,
            conversations,
            sessions,
            channel,
            username: None,
        }
    }

    /// The bot's own username, which `/command@username` must name to count as a command.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Handle one inbound text message. Never fails.
    pub async fn handle(&self, msg: &InboundMessage) {
        match parse_command(&msg.text, self.username.as_deref()) {
            Some(BotCommand::Start) => self.reply(msg, commands::START_TEXT).await,
            Some(BotCommand::Help) => self.reply(msg, commands::help_text()).await,
            Some(BotCommand::Subscribe) => self.handle_subscribe(msg).await,
            Some(BotCommand::Unsubscribe) => self.handle_unsubscribe(msg).await,
            Some(BotCommand::Clear) => self.handle_clear(msg).await,
            Some(BotCommand::Prompt(text)) => self.handle_prompt(msg, text).await,
            Some(BotCommand::Image(prompt)) => self.handle_image(msg, prompt).await,
            None => self.handle_chat(msg).await,
        }
    }

    async fn handle_subscribe(&self, msg: &InboundMessage) {
        match self.subscriptions.subscribe(msg.user_id).await {
            Ok(SubscribeOutcome::Subscribed) => self.reply(msg, commands::SUBSCRIBED_TEXT).await,
            Ok(SubscribeOutcome::AlreadySubscribed) => {
                self.reply(msg, commands::ALREADY_SUBSCRIBED_TEXT).await
            }
            Err(e) => self.storage_failed(msg, "subscribe", e).await,
        }
    }

    async fn handle_unsubscribe(&self, msg: &InboundMessage) {
        match self.subscriptions.unsubscribe(msg.user_id).await {
            Ok(()) => self.reply(msg, commands::UNSUBSCRIBED_TEXT).await,
            Err(e) => self.storage_failed(msg, "unsubscribe", e).await,
        }
    }

    async fn handle_clear(&self, msg: &InboundMessage) {
        match self.conversations.clear(msg.user_id).await {
            Ok(()) => self.reply(msg, commands::CLEARED_TEXT).await,
            Err(e) => self.storage_failed(msg, "clear", e).await,
        }
    }

    async fn handle_prompt(&self, msg: &InboundMessage, text: Option<&str>) {
        match self.subscriptions.is_subscribed(msg.user_id).await {
            Ok(true) => {}
            Ok(false) => return self.reply(msg, commands::SUBSCRIBE_FIRST_TEXT).await,
            Err(e) => return self.storage_failed(msg, "prompt", e).await,
        }

        let result = match text {
            Some(directive) => self
                .conversations
                .set_directive(msg.user_id, directive)
                .await
                .map(|()| commands::PROMPT_SET_TEXT.to_string()),
            None => self.conversations.directive(msg.user_id).await.map(|d| match d {
                Some(d) => commands::current_prompt_text(&d),
                None => commands::NO_PROMPT_TEXT.to_string(),
            }),
        };

        match result {
            Ok(reply) => self.reply(msg, &reply).await,
            Err(e) => self.storage_failed(msg, "prompt", e).await,
        }
    }

    async fn handle_image(&self, msg: &InboundMessage, prompt: &str) {
        match self.images.check(msg.user_id, prompt).await {
            Ok(None) => {}
            Ok(Some(ImageOutcome::Unauthorized)) => {
                return self.reply(msg, commands::SUBSCRIBE_FIRST_TEXT).await
            }
            Ok(Some(ImageOutcome::EmptyPrompt)) => {
                return self.reply(msg, commands::IMAGE_USAGE_TEXT).await
            }
            Ok(Some(other)) => {
                warn!("Unexpected image check outcome: {:?}", other);
                return;
            }
            Err(e) => {
                error!("Image check failed for {}: {}", msg.user_id, e);
                return self.send(OutboundMessage::text(msg.chat_id, commands::IMAGE_FAILED_TEXT)).await;
            }
        }

        self.chat_action(msg.chat_id, ChatAction::UploadPhoto).await;

        let out = match self.images.render(prompt).await {
            Ok(ImageOutcome::Generated(bytes)) => OutboundMessage::photo(msg.chat_id, bytes),
            Ok(_) => OutboundMessage::text(msg.chat_id, commands::IMAGE_NOT_FOUND_TEXT),
            Err(e) => {
                error!("Image generation failed for {}: {}", msg.user_id, e);
                OutboundMessage::text(msg.chat_id, commands::IMAGE_FAILED_TEXT)
            }
        };
        self.send(out).await;
    }

    async fn handle_chat(&self, msg: &InboundMessage) {
        let pending = match self.sessions.begin(msg.user_id, &msg.text).await {
            Ok(Some(pending)) => pending,
            Ok(None) => return,
            Err(e) => {
                error!("Chat for {} aborted: {}", msg.user_id, e);
                return;
            }
        };

        self.chat_action(msg.chat_id, ChatAction::Typing).await;

        match self.sessions.complete(pending).await {
            Ok(reply) => self.reply(msg, &reply).await,
            Err(e) => error!("Chat for {} aborted: {}", msg.user_id, e),
        }
    }

    async fn storage_failed(&self, msg: &InboundMessage, command: &str, e: impl std::fmt::Display) {
        error!("/{} failed for {}: {}", command, msg.user_id, e);
        self.reply(msg, commands::STORAGE_FAILED_TEXT).await;
    }

    async fn reply(&self, msg: &InboundMessage, text: &str) {
        self.send(OutboundMessage::text(msg.chat_id, text).in_reply_to(msg.message_id))
            .await;
    }

    async fn send(&self, out: OutboundMessage) {
        if let Err(e) = self.channel.send(&out).await {
            error!("Failed to send to {} via {}: {}", out.chat_id, self.channel.name(), e);
        }
    }

    async fn chat_action(&self, chat_id: i64, action: ChatAction) {
        if let Err(e) = self.channel.send_chat_action(chat_id, action).await {
            debug!("Chat action {} failed: {}", action.as_str(), e);
        }
    }
}
