pub mod telegram;

use async_trait::async_trait;

use crate::types::{ChatAction, OutboundMessage};

/// Trait for chat channel implementations.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel name (e.g., "telegram").
    fn name(&self) -> &str;

    /// Send a message through this channel.
    async fn send(&self, msg: &OutboundMessage) -> anyhow::Result<()>;

    /// Show a transient activity indicator in the chat.
    async fn send_chat_action(&self, chat_id: i64, action: ChatAction) -> anyhow::Result<()>;
}
