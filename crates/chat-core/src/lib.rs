//! Message store client and long-polling conversation loop for the
//! Wizard-of-Oz chat front-end.

pub mod client;
pub mod config;
pub mod config_env;
pub mod generation;
pub mod models;
pub mod render;
pub mod session;
pub mod store;

pub use client::{MESSAGES_PATH, MessageStoreClient};
pub use config::{ClientConfig, ConfigError, PollPolicy};
pub use generation::{GenerationSettings, GenerationSettingsError};
pub use models::{
    CLOSING_TEXT, END_MARKER, ErrorBody, ErrorResponse, Feedback, FeedbackControlKind,
    FeedbackUpdate, GREETING_TEXT, Message, MessageKind, NewMessage, Role, START_MARKER, Thumbs,
};
pub use render::{Block, FeedbackControl, RenderedMessage, render_conversation, render_message};
pub use session::{
    AssistantReply, CancelHandle, CancelToken, ConversationError, FeedbackOutcome, NoopObserver,
    Session, TurnObserver, TurnState, UserTurn, cancellation,
};
pub use store::{MessageStore, MessageStoreError, MessageStoreFuture};
