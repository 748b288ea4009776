use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};

use crate::dto::telegram_dto::TelegramUpdate;
use crate::error::{Error, Result};
use crate::utils::crypto::secrets_match;
use crate::AppState;

/// Webhook endpoint registered with Telegram. The path segment acts as a
/// shared secret, so a wrong one looks like any other unknown route.
///
/// The body is decoded only after the path matches; a wrong path is 404
/// whatever the payload looks like.
pub async fn handle_webhook(
    State(state): State<AppState>,
    Path(path): Path<String>,
    body: Bytes,
) -> Result<StatusCode> {
    let config = crate::config::get_config();
    if !secrets_match(&path, &config.webhook_path) {
        return Err(Error::NotFound("Not found".to_string()));
    }

    let update: TelegramUpdate = serde_json::from_slice(&body)?;
    tracing::info!("Received Telegram webhook update ID: {}", update.update_id);

    // Telegram redelivers updates that are not acknowledged quickly, so the
    // LLM round-trip happens after the response.
    let bot = state.bot_service.clone();
    tokio::spawn(async move {
        let update_id = update.update_id;
        if let Err(e) = bot.handle_update(update).await {
            tracing::error!(update_id, error = %e, "failed to handle update");
        }
    });

    Ok(StatusCode::OK)
}
