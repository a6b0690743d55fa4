use std::sync::Arc;

use chat_core::{Feedback, Message, NewMessage};
use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("message {index} not found")]
    NotFound { index: usize },
    #[error("message {index} already has feedback")]
    FeedbackAlreadySet { index: usize },
    #[error("message {index} does not accept feedback")]
    FeedbackNotAllowed { index: usize },
    #[error("feedback {feedback} does not match the control shown for message {index}")]
    FeedbackKindMismatch { index: usize, feedback: Feedback },
}

/// In-memory, append-only conversation shared by every request.
#[derive(Clone, Default)]
pub struct ConversationStore {
    messages: Arc<RwLock<Vec<Message>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn list(&self) -> Vec<Message> {
        self.messages.read().await.clone()
    }

    /// Appends `message` and returns its index.
    pub async fn append(&self, message: NewMessage) -> usize {
        let mut stored = message.into_message();
        stored.created_at = Some(Utc::now());

        let mut messages = self.messages.write().await;
        messages.push(stored);
        messages.len() - 1
    }

    /// Sets feedback on an assistant message. Feedback is write-once.
    pub async fn set_feedback(&self, index: usize, feedback: Feedback) -> Result<Message, StoreError> {
        let mut messages = self.messages.write().await;
        let message = messages
            .get_mut(index)
            .ok_or(StoreError::NotFound { index })?;

        let Some(control) = message.feedback_control() else {
            return Err(StoreError::FeedbackNotAllowed { index });
        };
        if message.feedback.is_some() {
            return Err(StoreError::FeedbackAlreadySet { index });
        }
        if feedback.control() != control {
            return Err(StoreError::FeedbackKindMismatch { index, feedback });
        }

        message.feedback = Some(feedback);
        Ok(message.clone())
    }

    /// Removes every message and returns how many were dropped.
    pub async fn clear(&self) -> usize {
        let mut messages = self.messages.write().await;
        let removed = messages.len();
        messages.clear();
        removed
    }
}
