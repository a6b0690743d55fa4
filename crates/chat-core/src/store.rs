use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::models::{Feedback, Message, NewMessage};

pub type MessageStoreFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, MessageStoreError>> + Send + 'a>>;

/// Remote, authoritative message list for one conversation.
pub trait MessageStore: Send + Sync {
    fn get_messages(&self) -> MessageStoreFuture<'_, Vec<Message>>;

    /// Appends a message; the store assigns index = current length.
    fn post_message(&self, message: NewMessage) -> MessageStoreFuture<'_, ()>;

    fn update_message(&self, index: usize, feedback: Feedback) -> MessageStoreFuture<'_, ()>;

    fn clear_messages(&self) -> MessageStoreFuture<'_, ()>;
}

#[derive(Debug, Error)]
pub enum MessageStoreError {
    #[error("message store unreachable: {message}")]
    Transport { message: String },
    #[error("message store request timed out")]
    Timeout,
    #[error("message store request failed: status={status} code={code}")]
    Status { status: u16, code: String },
    #[error("message rejected: code={code} message={message}")]
    Validation { code: String, message: String },
    #[error("no message at index {index}")]
    NotFound { index: usize },
    #[error("message {index} already has feedback")]
    FeedbackAlreadySet { index: usize },
    #[error("message store rejected credentials: code={code}")]
    Unauthorized { code: String },
    #[error("message store returned an invalid payload: {message}")]
    InvalidResponse { message: String },
}

impl MessageStoreError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Timeout => true,
            Self::Status { status, .. } => matches!(status, 408 | 429 | 500 | 502 | 503 | 504),
            _ => false,
        }
    }

    /// True when the server may or may not have applied the request.
    pub fn is_ambiguous(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Timeout | Self::InvalidResponse { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MessageStoreError;

    #[test]
    fn transport_and_gateway_failures_are_retryable() {
        assert!(
            MessageStoreError::Transport {
                message: "connection refused".to_string()
            }
            .is_retryable()
        );
        assert!(MessageStoreError::Timeout.is_retryable());
        assert!(
            MessageStoreError::Status {
                status: 503,
                code: "unavailable".to_string()
            }
            .is_retryable()
        );
    }

    #[test]
    fn client_errors_are_not_retryable() {
        assert!(!MessageStoreError::NotFound { index: 3 }.is_retryable());
        assert!(
            !MessageStoreError::Validation {
                code: "invalid_role".to_string(),
                message: "bad role".to_string()
            }
            .is_retryable()
        );
        assert!(
            !MessageStoreError::Unauthorized {
                code: "unauthorized".to_string()
            }
            .is_retryable()
        );
    }

    #[test]
    fn rejections_are_not_ambiguous() {
        assert!(MessageStoreError::Timeout.is_ambiguous());
        assert!(!MessageStoreError::NotFound { index: 0 }.is_ambiguous());
        assert!(
            !MessageStoreError::Status {
                status: 400,
                code: "bad_request".to_string()
            }
            .is_ambiguous()
        );
    }
}
