use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
};

pub async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        "ok",
    )
}
