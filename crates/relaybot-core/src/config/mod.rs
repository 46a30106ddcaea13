use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Root configuration for relaybot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[derive(Default)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub completion: CompletionConfig,
    pub image: ImageConfig,
    pub store: StoreConfig,
    pub session: SessionConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Check that both credentials are present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram.token.trim().is_empty() {
            return Err(ConfigError::MissingCredential("telegram.token"));
        }
        if self.completion.api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential("completion.apiKey"));
        }
        if self.completion.max_tokens == 0 {
            return Err(ConfigError::Invalid("completion.maxTokens must be positive".into()));
        }
        Ok(())
    }

    /// Resolved directory for the file store.
    pub fn store_path(&self) -> PathBuf {
        match self.store.path.as_deref() {
            Some(path) => expand_home(path),
            None => get_data_dir().join("store"),
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    if path.starts_with("~/") || path.starts_with("~\\") {
        if let Some(home) = dirs::home_dir() {
            return home.join(&path[2..]);
        }
    }
    PathBuf::from(path)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelegramConfig {
    pub token: String,
    /// Value Telegram echoes in `X-Telegram-Bot-Api-Secret-Token`. Empty disables the check.
    pub webhook_secret: String,
    pub api_base: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            webhook_secret: String::new(),
            api_base: "https://api.telegram.org".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompletionConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: "https://paxsenix-ai.onrender.com/v1".to_string(),
            model: "meta-llama/Meta-Llama-3-70B-Instruct".to_string(),
            max_tokens: 300,
            temperature: 0.9,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://www.craiyon.com/mini".to_string(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    File,
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "file" => Ok(StoreBackend::File),
            other => Err(ConfigError::Invalid(format!("unknown store backend: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub path: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::File,
            path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[derive(Default)]
pub struct SessionConfig {
    /// Hold a per-user lock for the whole exchange instead of racing.
    pub serialize_exchanges: bool,
    /// Keep at most the last N non-system turns when persisting, starting on a
    /// user turn. `None` keeps everything.
    pub max_history: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ====== Config loading/saving ======

/// Load configuration from environment variables.
///
/// Priority:
/// 1. `RELAYBOT_CONFIG` env var: full JSON config
/// 2. Individual env vars (merged on top of the file config)
/// 3. File fallback (`~/.relaybot/config.json`)
pub fn load_config_from_env() -> Config {
    if let Ok(json) = std::env::var("RELAYBOT_CONFIG") {
        match serde_json::from_str::<Config>(&json) {
            Ok(config) => return config,
            Err(e) => {
                tracing::warn!("Failed to parse RELAYBOT_CONFIG: {}", e);
            }
        }
    }

    let mut cfg = load_config(None);
    apply_env_overrides(&mut cfg);
    cfg
}

fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("TELEGRAM_BOT_TOKEN") {
        cfg.telegram.token = v;
    }
    if let Ok(v) = std::env::var("TELEGRAM_WEBHOOK_SECRET") {
        cfg.telegram.webhook_secret = v;
    }

    // APIKEY is the historical name; COMPLETION_API_KEY wins when both are set.
    if let Ok(v) = std::env::var("APIKEY") {
        cfg.completion.api_key = v;
    }
    if let Ok(v) = std::env::var("COMPLETION_API_KEY") {
        cfg.completion.api_key = v;
    }
    if let Ok(v) = std::env::var("COMPLETION_API_BASE") {
        cfg.completion.api_base = v;
    }
    if let Ok(v) = std::env::var("COMPLETION_MODEL") {
        cfg.completion.model = v;
    }

    if let Ok(v) = std::env::var("RELAYBOT_STORE") {
        match v.parse() {
            Ok(backend) => cfg.store.backend = backend,
            Err(e) => tracing::warn!("Ignoring RELAYBOT_STORE: {}", e),
        }
    }
    if let Ok(v) = std::env::var("RELAYBOT_STORE_PATH") {
        cfg.store.path = Some(v);
    }

    if let Ok(v) = std::env::var("PORT") {
        match v.parse() {
            Ok(port) => cfg.server.port = port,
            Err(e) => tracing::warn!("Ignoring PORT={}: {}", v, e),
        }
    }
}

/// Get the default configuration file path.
pub fn get_config_path() -> PathBuf {
    get_home_dir().join("config.json")
}

/// Get the relaybot data directory, creating it if needed.
pub fn get_data_dir() -> PathBuf {
    let path = get_home_dir();
    std::fs::create_dir_all(&path).ok();
    path
}

fn get_home_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".relaybot")
}

/// Load configuration from file or fall back to defaults.
pub fn load_config(config_path: Option<&Path>) -> Config {
    let path = config_path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(get_config_path);

    if path.exists() {
        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Config>(&content) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to parse config from {}: {}", path.display(), e);
                    tracing::warn!("Using default configuration.");
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config from {}: {}", path.display(), e);
                tracing::warn!("Using default configuration.");
            }
        }
    }

    Config::default()
}

/// Save configuration to file.
pub fn save_config(config: &Config, config_path: Option<&Path>) -> std::result::Result<(), ConfigError> {
    let path = config_path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(get_config_path);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    }

    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    Ok(())
}
