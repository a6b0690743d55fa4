use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};
use tracing::warn;

use super::AppState;
use super::errors::unauthorized_response;

pub(super) async fn auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty());

    match token {
        Some(token) if token_matches(token, &state.api_key) => next.run(req).await,
        Some(_) => {
            warn!(path = %req.uri().path(), "rejected request with wrong api key");
            unauthorized_response()
        }
        None => {
            warn!(path = %req.uri().path(), "missing or invalid authorization header");
            unauthorized_response()
        }
    }
}

/// Compares SHA-256 digests in constant time so neither the key's bytes nor
/// its length show up in response timing.
fn token_matches(presented: &str, expected: &str) -> bool {
    let presented = Sha256::digest(presented.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());

    let mut diff = 0_u8;
    for (lhs, rhs) in presented.iter().zip(expected.iter()) {
        diff |= lhs ^ rhs;
    }
    diff == 0
}
