use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::utils::crypto::secrets_match;

pub const TELEGRAM_SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Rejects webhook calls that do not carry the secret registered with `setWebhook`.
/// Passes everything through when no secret is configured.
pub async fn require_telegram_secret(req: Request, next: Next) -> Response {
    let config = crate::config::get_config();
    let Some(expected) = config.webhook_secret.as_deref() else {
        return next.run(req).await;
    };

    let Some(provided) = req.headers().get(TELEGRAM_SECRET_HEADER) else {
        tracing::warn!("Webhook call without secret token header");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error":"unauthorized"})),
        )
            .into_response();
    };
    let Ok(provided) = provided.to_str() else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error":"unauthorized"})),
        )
            .into_response();
    };

    if !secrets_match(provided, expected) {
        tracing::warn!("Webhook call with wrong secret token");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error":"unauthorized"})),
        )
            .into_response();
    }
    next.run(req).await
}
