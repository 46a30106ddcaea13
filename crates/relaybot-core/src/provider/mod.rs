pub mod openai_compat;

use async_trait::async_trait;

use crate::config::CompletionConfig;
use crate::error::ProviderError;
use crate::types::{CompletionResponse, Message};

/// Trait for LLM providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request.
    async fn chat(
        &self,
        messages: &[Message],
        model: &str,
        max_tokens: u32,
        temperature: f64,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Get the default model for this provider.
    fn default_model(&self) -> &str;
}

/// Create the completion provider described by the config.
pub fn create_provider(config: &CompletionConfig) -> Result<Box<dyn LlmProvider>, ProviderError> {
    let provider = openai_compat::OpenAiCompatProvider::new(
        config.api_key.clone(),
        Some(config.api_base.clone()),
        config.model.clone(),
        config.timeout_secs,
    )?;
    Ok(Box::new(provider))
}
