pub mod health;
pub mod leads;
pub mod telegram;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, MatchedPath},
    http::Request,
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::middleware::{auth::require_telegram_secret, cors::cors_layer};
use crate::AppState;

pub fn router(state: AppState) -> Router {
    let config = crate::config::get_config();

    let base_routes = Router::new()
        .route("/", get(health::health))
        .route("/health", get(health::health));

    let webhook = Router::new()
        .route("/webhook/:path", post(telegram::handle_webhook))
        .layer(from_fn(require_telegram_secret));

    let miniapp_api = Router::new()
        .route("/api/leads/miniapp", post(leads::create_miniapp_lead))
        .layer(cors_layer(&config.cors_allowed_origins));

    base_routes
        .merge(webhook)
        .merge(miniapp_api)
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
            tracing::info_span!("http_request", method = %req.method(), route = route_label(req))
        }))
        .layer(DefaultBodyLimit::max(1024 * 1024))
}

/// Route template for request spans. The raw URI is never recorded because
/// the webhook path is a secret.
pub fn route_label(req: &Request<Body>) -> &str {
    req.extensions()
        .get::<MatchedPath>()
        .map(MatchedPath::as_str)
        .unwrap_or("unmatched")
}
