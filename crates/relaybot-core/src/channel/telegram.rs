use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::config::TelegramConfig;
use crate::error::ChannelError;
use crate::types::{ChatAction, InboundMessage, OutboundMessage, OutboundPayload, UserId};
use crate::util::{http, truncate_string};

use super::Channel;

// ====== Webhook Types ======

/// Telegram Update object (subset for webhook use).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
}

/// Telegram Message object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    pub text: Option<String>,
    #[serde(default)]
    pub date: i64,
}

/// Telegram Chat object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelegramChat {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub chat_type: String,
}

/// Telegram User object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    pub username: Option<String>,
}

/// Bot API envelope: `{"ok": true, "result": ...}` or `{"ok": false, "description": ...}`.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Option<serde_json::Value>,
}

impl TelegramUpdate {
    /// The text message carried by this update, if any.
    ///
    /// Updates without a sender or without text (stickers, photos, edits)
    /// yield `None`.
    pub fn into_inbound(self) -> Option<InboundMessage> {
        let message = self.message?;
        let from = message.from?;
        let text = message.text?;
        Some(InboundMessage::new(
            UserId(from.id),
            message.chat.id,
            message.message_id,
            text,
        ))
    }
}

/// Parse a Telegram webhook update from JSON body.
pub fn parse_webhook_update(body: &str) -> Result<TelegramUpdate, serde_json::Error> {
    serde_json::from_str(body)
}

// ====== Channel Implementation ======

/// Telegram Bot API client for replies, chat actions and webhook management.
pub struct TelegramChannel {
    token: String,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(config: &TelegramConfig) -> Result<Self, ChannelError> {
        if config.token.is_empty() {
            return Err(ChannelError::NoToken);
        }
        Ok(Self {
            token: config.token.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            client: http::client().clone(),
        })
    }

    /// Build a Bot API URL for `method`.
    pub fn api_url(&self, method: &str) -> String {
        api_url_with_token(&self.api_base, &self.token, method)
    }

    async fn call(&self, method: &str, body: serde_json::Value) -> Result<ApiResponse, ChannelError> {
        let response = self
            .client
            .post(self.api_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::Send(e.to_string()))?;
        read_api_response(method, response).await
    }

    async fn send_text(&self, chat_id: i64, text: &str, reply_to: Option<i64>) -> Result<(), ChannelError> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(message_id) = reply_to {
            body["reply_parameters"] = json!({ "message_id": message_id });
        }
        self.call("sendMessage", body).await?;
        debug!("Sent to {}: {}", chat_id, truncate_string(text, 50, "..."));
        Ok(())
    }

    async fn send_photo(&self, chat_id: i64, bytes: &[u8], reply_to: Option<i64>) -> Result<(), ChannelError> {
        let photo = Part::bytes(bytes.to_vec())
            .file_name("image.png")
            .mime_str("image/png")
            .map_err(|e| ChannelError::Send(e.to_string()))?;
        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("photo", photo);
        if let Some(message_id) = reply_to {
            form = form.text(
                "reply_parameters",
                json!({ "message_id": message_id }).to_string(),
            );
        }

        let response = self
            .client
            .post(self.api_url("sendPhoto"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ChannelError::Send(e.to_string()))?;
        read_api_response("sendPhoto", response).await?;
        debug!("Sent photo to {} ({} bytes)", chat_id, bytes.len());
        Ok(())
    }

    /// Register `webhook_url` with the Bot API, with an optional secret token.
    pub async fn set_webhook(&self, webhook_url: &str, secret: Option<&str>) -> Result<(), ChannelError> {
        let mut body = json!({
            "url": webhook_url,
            "allowed_updates": ["message"],
        });
        if let Some(secret) = secret.filter(|s| !s.is_empty()) {
            body["secret_token"] = json!(secret);
        }
        self.call("setWebhook", body).await?;
        info!("Telegram webhook set to {}", webhook_url);
        Ok(())
    }

    /// The bot's own account, as reported by `getMe`.
    pub async fn get_me(&self) -> Result<TelegramUser, ChannelError> {
        let response = self.call("getMe", json!({})).await?;
        parse_get_me(response.result.unwrap_or_default())
    }

    /// Remove the webhook URL from the Telegram Bot API.
    pub async fn delete_webhook(&self) -> Result<(), ChannelError> {
        self.call("deleteWebhook", json!({})).await?;
        info!("Telegram webhook deleted");
        Ok(())
    }

    /// Current webhook registration as reported by `getWebhookInfo`.
    pub async fn webhook_info(&self) -> Result<serde_json::Value, ChannelError> {
        let response = self.call("getWebhookInfo", json!({})).await?;
        Ok(response.result.unwrap_or_default())
    }
}

/// Build a Telegram API URL from a base, token and method name.
fn api_url_with_token(api_base: &str, token: &str, method: &str) -> String {
    format!("{}/bot{}/{}", api_base, token, method)
}

fn parse_get_me(result: serde_json::Value) -> Result<TelegramUser, ChannelError> {
    serde_json::from_value(result).map_err(|e| ChannelError::Api {
        method: "getMe".to_string(),
        description: format!("unexpected result: {}", e),
    })
}

async fn read_api_response(method: &str, response: reqwest::Response) -> Result<ApiResponse, ChannelError> {
    let status = response.status();
    let body: ApiResponse = response.json().await.map_err(|e| ChannelError::Api {
        method: method.to_string(),
        description: format!("HTTP {}: {}", status.as_u16(), e),
    })?;

    if !status.is_success() || !body.ok {
        return Err(ChannelError::Api {
            method: method.to_string(),
            description: body
                .description
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
        });
    }
    Ok(body)
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, msg: &OutboundMessage) -> anyhow::Result<()> {
        match &msg.payload {
            OutboundPayload::Text(text) => self.send_text(msg.chat_id, text, msg.reply_to).await?,
            OutboundPayload::Photo(bytes) => self.send_photo(msg.chat_id, bytes, msg.reply_to).await?,
        }
        Ok(())
    }

    async fn send_chat_action(&self, chat_id: i64, action: ChatAction) -> anyhow::Result<()> {
        self.call(
            "sendChatAction",
            json!({ "chat_id": chat_id, "action": action.as_str() }),
        )
        .await?;
        Ok(())
    }
}
