use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::channel::telegram::parse_webhook_update;

use super::bot::Bot;

/// Header Telegram uses to echo the secret registered with `setWebhook`.
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Shared application state for the webhook server.
pub struct AppState {
    pub token: String,
    /// Empty disables the secret check.
    pub webhook_secret: String,
    pub bot: Bot,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Create the axum Router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/{token}", post(handle_telegram_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// POST /{token}: Telegram webhook
///
/// Anything that is not a handled update still gets `200`, so Telegram does not redeliver it.
async fn handle_telegram_webhook(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if token != state.token {
        debug!("Ignoring webhook call with unknown path token");
        return StatusCode::OK;
    }

    if !state.webhook_secret.is_empty() {
        let presented = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if presented != Some(state.webhook_secret.as_str()) {
            warn!("Rejected webhook call with bad secret token");
            return StatusCode::UNAUTHORIZED;
        }
    }

    let body = String::from_utf8_lossy(&body);
    let update = match parse_webhook_update(&body) {
        Ok(u) => u,
        Err(e) => {
            warn!("Failed to parse Telegram webhook: {}", e);
            return StatusCode::OK;
        }
    };

    let update_id = update.update_id;
    match update.into_inbound() {
        Some(msg) => {
            debug!("Update {} from {}", update_id, msg.user_id);
            state.bot.handle(&msg).await;
        }
        None => debug!("Update {} carries no text message", update_id),
    }
    StatusCode::OK
}

/// GET /health: Health check
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: format!("{} ({})", crate::VERSION, crate::GIT_HASH),
    })
}

/// Start the HTTP server on the given address and run until `shutdown` resolves.
pub async fn serve<F>(addr: &str, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("HTTP server stopped");
    Ok(())
}
