use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::{ClientConfig, ConfigError};
use crate::models::{ErrorResponse, Feedback, FeedbackUpdate, Message, NewMessage, Role};
use crate::store::{MessageStore, MessageStoreError, MessageStoreFuture};

pub const MESSAGES_PATH: &str = "/messages";

/// HTTP client for the message store, authenticated with a bearer token.
///
/// Only `get_messages` and `clear_messages` are retried; appends and
/// feedback updates are sent once because a blind resend could duplicate
/// or conflict with a write the server already applied.
#[derive(Clone)]
pub struct MessageStoreClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
    retry_base_backoff_ms: u64,
}

impl MessageStoreClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|err| ConfigError::HttpClient(err.to_string()))?;

        Ok(Self::with_http_client(config, http_client))
    }

    pub fn with_http_client(config: &ClientConfig, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            max_retries: config.max_retries,
            retry_base_backoff_ms: config.retry_base_backoff_ms,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch_messages(&self) -> Result<Vec<Message>, MessageStoreError> {
        let body = self
            .send_with_retries(Method::GET, MESSAGES_PATH.to_string())
            .await?;

        serde_json::from_str::<Vec<Message>>(&body).map_err(|err| {
            MessageStoreError::InvalidResponse {
                message: format!("failed to parse message list: {err}"),
            }
        })
    }

    async fn append_message(&self, message: NewMessage) -> Result<(), MessageStoreError> {
        validate_new_message(&message)?;

        debug!(role = %message.role, files = message.files.as_ref().map_or(0, Vec::len), "posting message");
        self.send_once(Method::POST, MESSAGES_PATH.to_string(), Some(&message), None)
            .await?;
        Ok(())
    }

    async fn set_feedback(&self, index: usize, feedback: Feedback) -> Result<(), MessageStoreError> {
        if !feedback.is_valid() {
            return Err(MessageStoreError::Validation {
                code: "invalid_feedback".to_string(),
                message: format!("feedback {feedback:?} is out of range"),
            });
        }

        debug!(index, ?feedback, "updating message feedback");
        self.send_once(
            Method::PATCH,
            format!("{MESSAGES_PATH}/{index}"),
            Some(&FeedbackUpdate { feedback }),
            Some(index),
        )
        .await?;
        Ok(())
    }

    async fn truncate(&self) -> Result<(), MessageStoreError> {
        self.send_with_retries(Method::DELETE, MESSAGES_PATH.to_string())
            .await?;
        Ok(())
    }

    async fn send_with_retries(
        &self,
        method: Method,
        path: String,
    ) -> Result<String, MessageStoreError> {
        let mut attempt = 0_u32;

        loop {
            match self
                .send_once::<()>(method.clone(), path.clone(), None, None)
                .await
            {
                Ok(body) => return Ok(body),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    let backoff_ms = self
                        .retry_base_backoff_ms
                        .saturating_mul(2_u64.saturating_pow(attempt));
                    warn!(%method, %path, attempt, backoff_ms, "retrying message store request: {err}");
                    sleep(Duration::from_millis(backoff_ms)).await;
                    attempt = attempt.saturating_add(1);
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn send_once<B>(
        &self,
        method: Method,
        path: String,
        body: Option<&B>,
        index: Option<usize>,
    ) -> Result<String, MessageStoreError>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .http_client
            .request(method, url)
            .bearer_auth(&self.api_key);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|err| {
            if err.is_timeout() {
                MessageStoreError::Timeout
            } else {
                MessageStoreError::Transport {
                    message: err.to_string(),
                }
            }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|err| {
            if err.is_timeout() {
                MessageStoreError::Timeout
            } else {
                MessageStoreError::InvalidResponse {
                    message: format!("failed to read response body: {err}"),
                }
            }
        })?;

        if status.is_success() {
            return Ok(text);
        }

        Err(error_for_status(status, &text, index))
    }
}

impl MessageStore for MessageStoreClient {
    fn get_messages(&self) -> MessageStoreFuture<'_, Vec<Message>> {
        Box::pin(self.fetch_messages())
    }

    fn post_message(&self, message: NewMessage) -> MessageStoreFuture<'_, ()> {
        Box::pin(self.append_message(message))
    }

    fn update_message(&self, index: usize, feedback: Feedback) -> MessageStoreFuture<'_, ()> {
        Box::pin(self.set_feedback(index, feedback))
    }

    fn clear_messages(&self) -> MessageStoreFuture<'_, ()> {
        Box::pin(self.truncate())
    }
}

pub(crate) fn validate_new_message(message: &NewMessage) -> Result<(), MessageStoreError> {
    if !message.role.is_known() {
        return Err(MessageStoreError::Validation {
            code: "invalid_role".to_string(),
            message: format!("unsupported role '{}'", message.role),
        });
    }

    if message.role == Role::User && message.content.trim().is_empty() {
        return Err(MessageStoreError::Validation {
            code: "missing_content".to_string(),
            message: "user messages require content".to_string(),
        });
    }

    Ok(())
}

fn error_for_status(status: StatusCode, body: &str, index: Option<usize>) -> MessageStoreError {
    let envelope = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .map(|response| response.error);
    let code = envelope
        .as_ref()
        .map(|error| error.code.clone())
        .unwrap_or_else(|| "unknown".to_string());

    match (status, index) {
        (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => {
            MessageStoreError::Unauthorized { code }
        }
        (StatusCode::NOT_FOUND, Some(index)) => MessageStoreError::NotFound { index },
        (StatusCode::CONFLICT, Some(index)) => MessageStoreError::FeedbackAlreadySet { index },
        (StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY, _) => {
            MessageStoreError::Validation {
                code,
                message: envelope
                    .map(|error| error.message)
                    .unwrap_or_else(|| format!("request rejected with status {status}")),
            }
        }
        _ => MessageStoreError::Status {
            status: status.as_u16(),
            code,
        },
    }
}
