use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chat_core::{FeedbackUpdate, Message, NewMessage, Role};
use serde::Serialize;
use tracing::{debug, info};

use super::AppState;
use super::errors::{bad_request_response, store_error_response, validation_response};

#[derive(Debug, Serialize)]
pub(super) struct CreatedMessage {
    pub(super) index: usize,
}

pub(super) async fn list_messages(State(state): State<AppState>) -> Json<Vec<Message>> {
    let messages = state.store.list().await;
    debug!(count = messages.len(), "listing messages");
    Json(messages)
}

pub(super) async fn create_message(
    State(state): State<AppState>,
    payload: Result<Json<NewMessage>, JsonRejection>,
) -> Response {
    let Json(message) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_request_response("invalid_body", &rejection.body_text()),
    };

    if !message.role.is_known() {
        return validation_response(
            "invalid_role",
            &format!("role must be 'user' or 'assistant', got '{}'", message.role),
        );
    }
    if message.content.trim().is_empty() {
        return validation_response("missing_content", "content must not be blank");
    }
    if message.role == Role::User && (message.reasoning.is_some() || message.kind.is_some()) {
        return validation_response(
            "invalid_field",
            "reasoning and kind are only accepted on assistant messages",
        );
    }

    let role = message.role.clone();
    let index = state.store.append(message).await;
    info!(index, role = %role, "message appended");

    (StatusCode::CREATED, Json(CreatedMessage { index })).into_response()
}

pub(super) async fn update_message(
    State(state): State<AppState>,
    index: Result<Path<usize>, PathRejection>,
    payload: Result<Json<FeedbackUpdate>, JsonRejection>,
) -> Response {
    let Path(index) = match index {
        Ok(index) => index,
        Err(rejection) => return bad_request_response("invalid_index", &rejection.body_text()),
    };
    let Json(FeedbackUpdate { feedback }) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return bad_request_response("invalid_body", &rejection.body_text()),
    };

    if !feedback.is_valid() {
        return validation_response(
            "invalid_feedback",
            &format!("feedback {feedback:?} is out of range"),
        );
    }

    match state.store.set_feedback(index, feedback).await {
        Ok(message) => {
            info!(index, %feedback, "feedback saved");
            (StatusCode::OK, Json(message)).into_response()
        }
        Err(err) => store_error_response(err),
    }
}

pub(super) async fn clear_messages(State(state): State<AppState>) -> StatusCode {
    let removed = state.store.clear().await;
    info!(removed, "conversation cleared");
    StatusCode::NO_CONTENT
}
