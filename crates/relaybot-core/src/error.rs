/// Core error types for relaybot.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Image error: {0}")]
    Image(#[from] ImageError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to read {key}: {message}")]
    Read { key: String, message: String },

    #[error("Failed to write {key}: {message}")]
    Write { key: String, message: String },

    #[error("Corrupt value at {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Store is closed")]
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Bot token not configured")]
    NoToken,

    #[error("Send error: {0}")]
    Send(String),

    #[error("Bot API rejected {method}: {description}")]
    Api { method: String, description: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image service returned {0}")]
    Status(u16),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Invalid base64 payload: {0}")]
    Decode(#[from] base64::DecodeError),
}
