use tracing::warn;

use crate::models::{
    CLOSING_TEXT, Feedback, FeedbackControlKind, GREETING_TEXT, Message, MessageKind, Role,
};

pub const ASSISTANT_AVATAR: &str = "🦖";
pub const USER_AVATAR: &str = "🧑‍💻";
pub const UNKNOWN_AVATAR: &str = "❔";

pub const PAGE_TITLE: &str = "💬 Chat";
pub const PAGE_CAPTION: &str = "Powered by OpenRouter";
pub const WELCOME_TEXT: &str = "Welcome to our AI system! Meet your personal travel agent 🪄 ✨";

pub const THINKING_LABEL: &str = "Thinking ...";
pub const THOUGHTS_LABEL: &str = "Thoughts";
pub const FILES_LABEL: &str = "Files";
pub const FILE_ICON: &str = "📄";

/// One visual element of a rendered message, in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Thoughts(String),
    Files(Vec<String>),
    Text(String),
    Greeting,
    Closing,
    /// Placeholder for a role this client does not understand.
    UnknownRole { role: String, content: String },
}

impl Block {
    pub fn text(&self) -> String {
        match self {
            Self::Thoughts(reasoning) => reasoning.clone(),
            Self::Files(files) => files
                .iter()
                .map(|file| format!("{FILE_ICON} {file}"))
                .collect::<Vec<_>>()
                .join("\n"),
            Self::Text(text) => text.clone(),
            Self::Greeting => GREETING_TEXT.to_string(),
            Self::Closing => CLOSING_TEXT.to_string(),
            Self::UnknownRole { role, content } => {
                format!("Unknown message from '{role}': {content}")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackControl {
    pub kind: FeedbackControlKind,
    pub current: Option<Feedback>,
    /// False once a rating exists; ratings are write-once.
    pub enabled: bool,
}

impl FeedbackControl {
    pub fn accepts(&self, feedback: &Feedback) -> bool {
        self.enabled && feedback.control() == self.kind && feedback.is_valid()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub index: usize,
    pub role: Role,
    pub avatar: &'static str,
    pub blocks: Vec<Block>,
    pub feedback: Option<FeedbackControl>,
}

pub fn render_message(index: usize, message: &Message) -> RenderedMessage {
    match &message.role {
        Role::Assistant => render_assistant(index, message),
        Role::User => {
            let mut blocks = Vec::new();
            if let Some(files) = message.files.as_ref().filter(|files| !files.is_empty()) {
                blocks.push(Block::Files(files.clone()));
            }
            blocks.push(Block::Text(message.content.clone()));

            RenderedMessage {
                index,
                role: Role::User,
                avatar: USER_AVATAR,
                blocks,
                feedback: None,
            }
        }
        Role::Unknown(role) => {
            warn!(index, role = %role, "rendering message with unexpected role");
            RenderedMessage {
                index,
                role: message.role.clone(),
                avatar: UNKNOWN_AVATAR,
                blocks: vec![Block::UnknownRole {
                    role: role.clone(),
                    content: message.content.clone(),
                }],
                feedback: None,
            }
        }
    }
}

pub fn render_conversation(messages: &[Message]) -> Vec<RenderedMessage> {
    messages
        .iter()
        .enumerate()
        .map(|(index, message)| render_message(index, message))
        .collect()
}

fn render_assistant(index: usize, message: &Message) -> RenderedMessage {
    let kind = message.content_kind();
    let mut blocks = Vec::new();

    if kind == MessageKind::Greeting {
        blocks.push(Block::Greeting);
    } else {
        if let Some(reasoning) = message.reasoning.as_ref() {
            blocks.push(Block::Thoughts(reasoning.clone()));
        }

        let body = message.body();
        if kind == MessageKind::Plain || !body.is_empty() {
            blocks.push(Block::Text(body.to_string()));
        }
        if kind == MessageKind::Closing {
            blocks.push(Block::Closing);
        }
    }

    RenderedMessage {
        index,
        role: Role::Assistant,
        avatar: ASSISTANT_AVATAR,
        blocks,
        feedback: message.feedback_control().map(|kind| FeedbackControl {
            kind,
            current: message.feedback,
            enabled: message.feedback.is_none(),
        }),
    }
}
