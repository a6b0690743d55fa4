use chat_core::{ConfigError, ConversationError, GenerationSettingsError, MessageStoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid generation settings: {0}")]
    Settings(#[from] GenerationSettingsError),
    #[error(transparent)]
    Conversation(#[from] ConversationError),
    #[error(transparent)]
    Store(#[from] MessageStoreError),
    #[error("invalid rating '{0}': use up, down, or 1-5")]
    InvalidFeedback(String),
    #[error("unknown command /{0}; type /help for the list")]
    UnknownCommand(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("no such file: {0}")]
    MissingAttachment(String),
    #[error("terminal i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Settings(_) => 2,
            _ => 1,
        }
    }
}
