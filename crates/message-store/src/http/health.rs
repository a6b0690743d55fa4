use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct OkResponse {
    ok: bool,
}

pub(super) async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(OkResponse { ok: true }))
}
