use std::sync::Arc;

use tracing::{error, info};

use crate::channel::telegram::TelegramChannel;
use crate::channel::Channel;
use crate::config::Config;
use crate::image::{CraiyonClient, ImageService};
use crate::provider::{self, LlmProvider};
use crate::session::CompletionSettings;
use crate::store;

use super::bot::Bot;
use super::http::{self, AppState};

/// Open the store, wire up the bot and serve webhooks until a shutdown signal.
///
/// The store is closed after the server has drained.
pub async fn run_gateway(config: Config) -> anyhow::Result<()> {
    config.validate()?;

    let telegram = TelegramChannel::new(&config.telegram)?;
    let me = telegram.get_me().await?;
    let username = me
        .username
        .ok_or_else(|| anyhow::anyhow!("getMe returned no username for bot {}", me.id))?;
    info!("Running as @{}", username);

    let store = store::open_store(&config).await?;

    let llm_provider: Arc<dyn LlmProvider> =
        Arc::from(provider::create_provider(&config.completion)?);
    let image_service: Arc<dyn ImageService> = Arc::new(CraiyonClient::new(&config.image)?);
    let channel: Arc<dyn Channel> = Arc::new(telegram);

    info!(
        "Completion model {} via {}, store backend {}",
        llm_provider.default_model(),
        config.completion.api_base,
        store.name()
    );
    if config.session.serialize_exchanges {
        info!("Exchanges are serialized per user");
    }

    let bot = Bot::new(
        store.clone(),
        llm_provider,
        image_service,
        channel,
        CompletionSettings::from(&config.completion),
        &config.session,
    )
    .with_username(username);
    let state = Arc::new(AppState {
        token: config.telegram.token.clone(),
        webhook_secret: config.telegram.webhook_secret.clone(),
        bot,
    });

    info!("relaybot gateway started");
    let served = http::serve(&config.server.addr(), state, shutdown_signal()).await;

    if let Err(e) = store.close().await {
        error!("Failed to close store: {}", e);
    }
    served
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
