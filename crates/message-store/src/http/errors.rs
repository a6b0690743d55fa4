use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chat_core::{ErrorBody, ErrorResponse};
use tracing::warn;

use crate::store::StoreError;

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: message.to_string(),
            },
        }),
    )
        .into_response()
}

pub(super) fn bad_request_response(code: &str, message: &str) -> Response {
    error_response(StatusCode::BAD_REQUEST, code, message)
}

pub(super) fn validation_response(code: &str, message: &str) -> Response {
    error_response(StatusCode::UNPROCESSABLE_ENTITY, code, message)
}

pub(super) fn unauthorized_response() -> Response {
    error_response(
        StatusCode::UNAUTHORIZED,
        "unauthorized",
        "Missing or invalid bearer token",
    )
}

pub(super) fn store_error_response(err: StoreError) -> Response {
    warn!("message store rejected update: {err}");
    match err {
        StoreError::NotFound { .. } => {
            error_response(StatusCode::NOT_FOUND, "message_not_found", &err.to_string())
        }
        StoreError::FeedbackAlreadySet { .. } => {
            error_response(StatusCode::CONFLICT, "feedback_already_set", &err.to_string())
        }
        StoreError::FeedbackNotAllowed { .. } => {
            validation_response("feedback_not_allowed", &err.to_string())
        }
        StoreError::FeedbackKindMismatch { .. } => {
            validation_response("feedback_kind_mismatch", &err.to_string())
        }
    }
}
