use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const START_MARKER: &str = "<s>";
pub const END_MARKER: &str = "</s>";

pub const GREETING_TEXT: &str = "How can I help you today?";
pub const CLOSING_TEXT: &str = "Thank you for choosing our service! Your feedback matters, please take a moment to rate your experience.";

pub const MIN_STARS: u8 = 1;
pub const MAX_STARS: u8 = 5;

/// Author of a message. Unrecognized wire values are kept verbatim so
/// they can still be rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    User,
    Assistant,
    Unknown(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Unknown(raw) => raw.as_str(),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "user" => Self::User,
            "assistant" => Self::Assistant,
            _ => Self::Unknown(value),
        }
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        match value {
            Role::User => "user".to_string(),
            Role::Assistant => "assistant".to_string(),
            Role::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content mode of an assistant message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Greeting,
    Closing,
    Plain,
}

impl MessageKind {
    /// Derives the kind from sentinel markers for producers that do not
    /// set an explicit kind.
    pub fn from_content(content: &str) -> Self {
        if content == START_MARKER {
            Self::Greeting
        } else if content.ends_with(END_MARKER) {
            Self::Closing
        } else {
            Self::Plain
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Thumbs {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Feedback {
    Thumbs(Thumbs),
    Stars(u8),
}

impl Feedback {
    pub fn stars(value: u8) -> Option<Self> {
        (MIN_STARS..=MAX_STARS)
            .contains(&value)
            .then_some(Self::Stars(value))
    }

    pub fn is_valid(&self) -> bool {
        match self {
            Self::Thumbs(_) => true,
            Self::Stars(value) => (MIN_STARS..=MAX_STARS).contains(value),
        }
    }

    pub fn control(&self) -> FeedbackControlKind {
        match self {
            Self::Thumbs(_) => FeedbackControlKind::Thumbs,
            Self::Stars(_) => FeedbackControlKind::Stars,
        }
    }

    /// Parses `up`/`down` or a star count.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "up" | "+" | "👍" => Some(Self::Thumbs(Thumbs::Up)),
            "down" | "-" | "👎" => Some(Self::Thumbs(Thumbs::Down)),
            other => other.parse::<u8>().ok().and_then(Self::stars),
        }
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Thumbs(Thumbs::Up) => write!(f, "👍"),
            Self::Thumbs(Thumbs::Down) => write!(f, "👎"),
            Self::Stars(value) => {
                let filled = usize::from(*value);
                let empty = usize::from(MAX_STARS).saturating_sub(filled);
                write!(f, "{}{}", "★".repeat(filled), "☆".repeat(empty))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackControlKind {
    Thumbs,
    Stars,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
    #[serde(default)]
    pub feedback: Option<Feedback>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn user(content: impl Into<String>, files: Option<Vec<String>>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            reasoning: None,
            files,
            feedback: None,
            kind: None,
            created_at: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            reasoning: None,
            files: None,
            feedback: None,
            kind: None,
            created_at: None,
        }
    }

    pub fn greeting() -> Self {
        let mut message = Self::assistant(START_MARKER);
        message.kind = Some(MessageKind::Greeting);
        message
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    /// Explicit kind wins; otherwise the content markers decide.
    pub fn content_kind(&self) -> MessageKind {
        self.kind
            .unwrap_or_else(|| MessageKind::from_content(&self.content))
    }

    /// Content with the end marker stripped.
    pub fn body(&self) -> &str {
        match self.content_kind() {
            MessageKind::Greeting => "",
            MessageKind::Closing => self
                .content
                .strip_suffix(END_MARKER)
                .unwrap_or(&self.content),
            MessageKind::Plain => &self.content,
        }
    }

    /// Feedback control an assistant message offers, if any.
    pub fn feedback_control(&self) -> Option<FeedbackControlKind> {
        if self.role != Role::Assistant {
            return None;
        }

        match self.content_kind() {
            MessageKind::Greeting => None,
            MessageKind::Closing => Some(FeedbackControlKind::Stars),
            MessageKind::Plain => Some(FeedbackControlKind::Thumbs),
        }
    }
}

/// Body of `POST /messages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageKind>,
}

impl NewMessage {
    pub fn user(content: impl Into<String>, files: Option<Vec<String>>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            files,
            reasoning: None,
            kind: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            files: None,
            reasoning: None,
            kind: None,
        }
    }

    pub fn greeting() -> Self {
        Self {
            kind: Some(MessageKind::Greeting),
            ..Self::assistant(START_MARKER)
        }
    }

    /// Operator-authored closing turn: `content` followed by the end marker.
    pub fn closing(content: &str) -> Self {
        Self {
            kind: Some(MessageKind::Closing),
            ..Self::assistant(format!("{content}{END_MARKER}"))
        }
    }

    pub fn with_reasoning(mut self, reasoning: Option<String>) -> Self {
        self.reasoning = reasoning.filter(|value| !value.trim().is_empty());
        self
    }

    pub fn into_message(self) -> Message {
        Message {
            role: self.role,
            content: self.content,
            reasoning: self.reasoning,
            files: self.files,
            feedback: None,
            kind: self.kind,
            created_at: None,
        }
    }
}

/// Body of `PATCH /messages/{index}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackUpdate {
    pub feedback: Feedback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}
