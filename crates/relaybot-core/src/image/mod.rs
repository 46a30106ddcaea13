//! `/image <prompt>`: fetch a generated picture from the image service.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use tracing::{debug, info};

use crate::config::ImageConfig;
use crate::error::{ImageError, RelayError};
use crate::subscription::SubscriptionRegistry;
use crate::types::UserId;
use crate::util::http;

static PNG_DATA_URI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""src":"data:image/png;base64,([^"]+)""#).unwrap());

/// Result of an image request that did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    Generated(Vec<u8>),
    /// The page came back without an embedded image.
    NotFound,
    Unauthorized,
    EmptyPrompt,
}

/// Source of image pages.
#[async_trait]
pub trait ImageService: Send + Sync {
    /// Fetch the raw page for `prompt`.
    async fn fetch(&self, prompt: &str) -> Result<String, ImageError>;
}

/// HTTP image service queried with `GET <endpoint>?prompt=<prompt>`.
pub struct CraiyonClient {
    endpoint: String,
    timeout_secs: u64,
    client: Client,
}

impl CraiyonClient {
    pub fn new(config: &ImageConfig) -> Result<Self, ImageError> {
        Ok(Self {
            endpoint: config.endpoint.clone(),
            timeout_secs: config.timeout_secs,
            client: http::client_with_timeout(config.timeout_secs)?,
        })
    }

    pub fn request_url(&self, prompt: &str) -> String {
        format!("{}?prompt={}", self.endpoint, urlencoding::encode(prompt))
    }

    fn map_error(&self, e: reqwest::Error) -> ImageError {
        if e.is_timeout() {
            ImageError::Timeout(self.timeout_secs)
        } else {
            ImageError::Http(e)
        }
    }
}

#[async_trait]
impl ImageService for CraiyonClient {
    async fn fetch(&self, prompt: &str) -> Result<String, ImageError> {
        let url = self.request_url(prompt);
        debug!("Image request to {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::Status(status.as_u16()));
        }

        response.text().await.map_err(|e| self.map_error(e))
    }
}

/// Pull the first embedded PNG out of a page.
///
/// `Ok(None)` when the page has no image; `Err` when the payload is not valid base64.
pub fn extract_png(page: &str) -> Result<Option<Vec<u8>>, ImageError> {
    let Some(caps) = PNG_DATA_URI.captures(page) else {
        return Ok(None);
    };
    let payload = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let bytes = base64::engine::general_purpose::STANDARD.decode(payload)?;
    Ok(Some(bytes))
}

pub struct ImageHandler {
    subscriptions: SubscriptionRegistry,
    service: Arc<dyn ImageService>,
}

impl ImageHandler {
    pub fn new(subscriptions: SubscriptionRegistry, service: Arc<dyn ImageService>) -> Self {
        Self {
            subscriptions,
            service,
        }
    }

    /// Authorization and prompt validation. `None` means the request may proceed.
    pub async fn check(&self, user_id: UserId, prompt: &str) -> Result<Option<ImageOutcome>, RelayError> {
        if !self.subscriptions.is_subscribed(user_id).await? {
            return Ok(Some(ImageOutcome::Unauthorized));
        }
        if prompt.trim().is_empty() {
            return Ok(Some(ImageOutcome::EmptyPrompt));
        }
        Ok(None)
    }

    /// One request to the image service, then extraction.
    pub async fn render(&self, prompt: &str) -> Result<ImageOutcome, ImageError> {
        let page = self.service.fetch(prompt.trim()).await?;
        match extract_png(&page)? {
            Some(bytes) => {
                info!("Generated image ({} bytes)", bytes.len());
                Ok(ImageOutcome::Generated(bytes))
            }
            None => {
                debug!("No image in response for prompt {:?}", prompt);
                Ok(ImageOutcome::NotFound)
            }
        }
    }

    /// `check` followed by `render`.
    pub async fn generate(&self, user_id: UserId, prompt: &str) -> Result<ImageOutcome, RelayError> {
        if let Some(outcome) = self.check(user_id, prompt).await? {
            return Ok(outcome);
        }
        Ok(self.render(prompt).await?)
    }
}
