//! In-process fakes for the chat platform and the external services.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::channel::Channel;
use crate::error::{ImageError, ProviderError};
use crate::image::ImageService;
use crate::provider::LlmProvider;
use crate::types::{
    ChatAction, CompletionResponse, FinishReason, Message, OutboundMessage, OutboundPayload,
    TokenUsage,
};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Sent {
    Text { text: String, reply_to: Option<i64> },
    Photo(Vec<u8>),
    Action(&'static str),
}

#[derive(Default)]
pub(crate) struct RecordingChannel {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingChannel {
    pub(crate) fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, msg: &OutboundMessage) -> anyhow::Result<()> {
        let sent = match &msg.payload {
            OutboundPayload::Text(text) => Sent::Text {
                text: text.clone(),
                reply_to: msg.reply_to,
            },
            OutboundPayload::Photo(bytes) => Sent::Photo(bytes.clone()),
        };
        self.sent.lock().unwrap().push(sent);
        Ok(())
    }

    async fn send_chat_action(&self, _chat_id: i64, action: ChatAction) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(Sent::Action(action.as_str()));
        Ok(())
    }
}

pub(crate) struct EchoProvider {
    pub(crate) fail: bool,
}

#[async_trait]
impl LlmProvider for EchoProvider {
    async fn chat(
        &self,
        messages: &[Message],
        _model: &str,
        _max_tokens: u32,
        _temperature: f64,
    ) -> Result<CompletionResponse, ProviderError> {
        if self.fail {
            return Err(ProviderError::Timeout(60));
        }
        let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        Ok(CompletionResponse {
            content: format!("echo: {last}"),
            finish_reason: FinishReason::Stop,
            usage: TokenUsage::default(),
        })
    }

    fn default_model(&self) -> &str {
        "echo"
    }
}

pub(crate) struct StaticImages(pub(crate) Result<&'static str, u16>);

#[async_trait]
impl ImageService for StaticImages {
    async fn fetch(&self, _prompt: &str) -> Result<String, ImageError> {
        self.0.map(str::to_string).map_err(ImageError::Status)
    }
}

