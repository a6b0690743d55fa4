mod cancel;


use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub use cancel::{CancelHandle, CancelToken, cancellation};

use crate::client::validate_new_message;
use crate::config::PollPolicy;
use crate::models::{Feedback, FeedbackControlKind, Message, MessageKind, NewMessage, Role};
use crate::render::{RenderedMessage, render_conversation, render_message};
use crate::store::{MessageStore, MessageStoreError};

/// Progress of a single chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingPost,
    AwaitingAssistantReply { polls: u32 },
    Rendered { index: usize },
    Failed,
}

/// What the user submitted: text plus the names of attached files.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserTurn {
    pub content: String,
    pub files: Vec<String>,
}

impl UserTurn {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            files: Vec::new(),
        }
    }

    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.files = files;
        self
    }

    fn to_new_message(&self) -> NewMessage {
        let files = (!self.files.is_empty()).then(|| self.files.clone());
        NewMessage::user(self.content.clone(), files)
    }

    fn matches(&self, message: &Message) -> bool {
        message.role == Role::User
            && message.content == self.content
            && message.files.as_deref().unwrap_or_default() == self.files.as_slice()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    pub index: usize,
    pub message: Message,
}

impl AssistantReply {
    pub fn render(&self) -> RenderedMessage {
        render_message(self.index, &self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackOutcome {
    Saved,
    MissingMessage,
    AlreadyRated,
}

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("message rejected: {source}")]
    Rejected {
        turn: UserTurn,
        source: MessageStoreError,
    },
    #[error("failed to send message: {source}")]
    SendFailed {
        turn: UserTurn,
        source: MessageStoreError,
    },
    #[error("no assistant reply after {polls} polls in {waited:?}")]
    ReplyTimedOut { waited: Duration, polls: u32 },
    #[error("stopped waiting for the assistant reply after {polls} polls")]
    Cancelled { polls: u32 },
    #[error("feedback {feedback:?} does not fit message {index} (expects {expected:?})")]
    FeedbackMismatch {
        index: usize,
        feedback: Feedback,
        expected: Option<FeedbackControlKind>,
    },
    #[error("the store accepted the message but no longer lists it")]
    PostedTurnMissing,
    #[error(transparent)]
    Store(#[from] MessageStoreError),
}

impl ConversationError {
    /// The submitted turn, when the send failed before the store recorded it.
    pub fn unsent_turn(&self) -> Option<&UserTurn> {
        match self {
            Self::Rejected { turn, .. } | Self::SendFailed { turn, .. } => Some(turn),
            _ => None,
        }
    }
}

/// Hooks for front-ends that render a turn while it is in flight.
pub trait TurnObserver {
    fn state_changed(&mut self, _state: TurnState) {}

    /// Called once the store accepted the user's message, before polling.
    fn user_turn_posted(&mut self, _index: usize, _message: &Message) {}

    fn poll_missed(&mut self, _polls: u32) {}
}

/// Observer that ignores every event.
pub struct NoopObserver;

impl TurnObserver for NoopObserver {}

enum Wake<T> {
    Cancelled,
    Deadline,
    Ready(T),
}

/// One chat session against a message store.
///
/// Holds the conversation as last seen from the store and the index of the
/// newest assistant message already shown, so a reply is only accepted
/// when a newer one appears.
pub struct Session<S> {
    store: S,
    poll: PollPolicy,
    conversation_id: Uuid,
    started_at: DateTime<Utc>,
    messages: Vec<Message>,
    last_assistant_index: Option<usize>,
    state: TurnState,
}

impl<S: MessageStore> Session<S> {
    /// Loads the current conversation, posting the greeting if it is empty.
    pub async fn open(store: S, poll: PollPolicy) -> Result<Self, ConversationError> {
        let mut session = Self::detached(store, poll);
        session.refresh().await?;

        if session.messages.is_empty() {
            info!(conversation_id = %session.conversation_id, "conversation empty; posting greeting");
            session.store.post_message(NewMessage::greeting()).await?;
            session.refresh().await?;
        }

        Ok(session)
    }

    /// Session with no conversation loaded yet.
    pub fn detached(store: S, poll: PollPolicy) -> Self {
        Self {
            store,
            poll,
            conversation_id: Uuid::new_v4(),
            started_at: Utc::now(),
            messages: Vec::new(),
            last_assistant_index: None,
            state: TurnState::Idle,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_assistant_index(&self) -> Option<usize> {
        self.last_assistant_index
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn render(&self) -> Vec<RenderedMessage> {
        render_conversation(&self.messages)
    }

    /// Clears the store and starts over with the greeting.
    pub async fn start_new(&mut self) -> Result<(), ConversationError> {
        self.store.clear_messages().await?;
        self.store.post_message(NewMessage::greeting()).await?;

        self.conversation_id = Uuid::new_v4();
        self.started_at = Utc::now();
        self.messages.clear();
        self.last_assistant_index = None;
        self.state = TurnState::Idle;
        self.refresh().await?;

        info!(conversation_id = %self.conversation_id, "started new conversation");
        Ok(())
    }

    /// Replaces the local view with the store's.
    pub async fn refresh(&mut self) -> Result<&[Message], ConversationError> {
        let messages = self.store.get_messages().await?;
        self.adopt(messages);
        Ok(&self.messages)
    }

    /// Posts the user's turn, then reads the conversation back to learn the
    /// index the store gave it. Returns that index.
    pub async fn post_user_turn(
        &mut self,
        turn: UserTurn,
        observer: &mut dyn TurnObserver,
    ) -> Result<usize, ConversationError> {
        let message = turn.to_new_message();
        if let Err(source) = validate_new_message(&message) {
            return Err(self.fail(ConversationError::Rejected { turn, source }, observer));
        }

        self.transition(TurnState::AwaitingPost, observer);
        info!(
            conversation_id = %self.conversation_id,
            files = turn.files.len(),
            "sending user message"
        );

        let known_len = self.messages.len();
        match self.store.post_message(message).await {
            Ok(()) => match self.locate_posted(&turn).await {
                Ok(index) => {
                    observer.user_turn_posted(index, &self.messages[index]);
                    Ok(index)
                }
                Err(err) => Err(self.fail(err, observer)),
            },
            Err(source @ MessageStoreError::Validation { .. }) => {
                Err(self.fail(ConversationError::Rejected { turn, source }, observer))
            }
            Err(source) if source.is_ambiguous() => {
                warn!(
                    conversation_id = %self.conversation_id,
                    "post outcome unknown, reconciling with store: {source}"
                );
                match self.reconcile_post(&turn, known_len).await {
                    Some(index) => {
                        observer.user_turn_posted(index, &self.messages[index]);
                        Ok(index)
                    }
                    None => Err(self.fail(ConversationError::SendFailed { turn, source }, observer)),
                }
            }
            Err(source) => Err(self.fail(ConversationError::SendFailed { turn, source }, observer)),
        }
    }

    /// Polls the store until an assistant message newer than the last one
    /// shown is the newest message, the poll deadline passes, or `cancel`
    /// fires.
    pub async fn await_assistant_reply(
        &mut self,
        cancel: &mut CancelToken,
        observer: &mut dyn TurnObserver,
    ) -> Result<AssistantReply, ConversationError> {
        let started = Instant::now();
        let deadline = started + self.poll.timeout;
        let mut polls = 0_u32;

        loop {
            polls = polls.saturating_add(1);
            self.transition(TurnState::AwaitingAssistantReply { polls }, observer);

            let wake = tokio::select! {
                biased;
                _ = cancel.cancelled() => Wake::Cancelled,
                _ = sleep_until(deadline) => Wake::Deadline,
                result = self.store.get_messages() => Wake::Ready(result),
            };

            match wake {
                Wake::Cancelled => {
                    return Err(self.fail(ConversationError::Cancelled { polls }, observer));
                }
                Wake::Deadline => {
                    let waited = started.elapsed();
                    return Err(self.fail(
                        ConversationError::ReplyTimedOut { waited, polls },
                        observer,
                    ));
                }
                Wake::Ready(Ok(messages)) => {
                    if let Some(index) = self.reply_index(&messages) {
                        self.adopt(messages);
                        let message = self.messages[index].clone();
                        if message.content_kind() == MessageKind::Greeting {
                            error!(
                                conversation_id = %self.conversation_id,
                                index,
                                "assistant replied with the session start marker"
                            );
                        }
                        info!(conversation_id = %self.conversation_id, index, polls, "assistant reply received");
                        self.transition(TurnState::Rendered { index }, observer);
                        return Ok(AssistantReply { index, message });
                    }
                    debug!(conversation_id = %self.conversation_id, polls, "assistant reply not ready");
                }
                Wake::Ready(Err(err @ MessageStoreError::Unauthorized { .. })) => {
                    return Err(self.fail(ConversationError::Store(err), observer));
                }
                Wake::Ready(Err(err)) => {
                    warn!(conversation_id = %self.conversation_id, polls, "poll failed, will retry: {err}");
                }
            }

            observer.poll_missed(polls);

            let wake = tokio::select! {
                biased;
                _ = cancel.cancelled() => Wake::Cancelled,
                _ = sleep_until(deadline) => Wake::Deadline,
                _ = sleep(self.poll.interval) => Wake::Ready(()),
            };
            match wake {
                Wake::Cancelled => {
                    return Err(self.fail(ConversationError::Cancelled { polls }, observer));
                }
                Wake::Deadline => {
                    let waited = started.elapsed();
                    return Err(self.fail(
                        ConversationError::ReplyTimedOut { waited, polls },
                        observer,
                    ));
                }
                Wake::Ready(()) => {}
            }
        }
    }

    /// Posts `turn` and waits for the assistant's answer.
    pub async fn send_user_turn(
        &mut self,
        turn: UserTurn,
        cancel: &mut CancelToken,
        observer: &mut dyn TurnObserver,
    ) -> Result<AssistantReply, ConversationError> {
        self.post_user_turn(turn, observer).await?;
        self.await_assistant_reply(cancel, observer).await
    }

    /// Records feedback for the message at `index`. Ratings are write-once.
    pub async fn rate(
        &mut self,
        index: usize,
        feedback: Feedback,
    ) -> Result<FeedbackOutcome, ConversationError> {
        if index >= self.messages.len() {
            self.refresh().await?;
        }
        let Some(message) = self.messages.get(index) else {
            warn!(conversation_id = %self.conversation_id, index, "feedback for missing message ignored");
            return Ok(FeedbackOutcome::MissingMessage);
        };

        let Some(control) = render_message(index, message).feedback else {
            return Err(ConversationError::FeedbackMismatch {
                index,
                feedback,
                expected: None,
            });
        };
        if control.current.is_some() {
            warn!(conversation_id = %self.conversation_id, index, "message already rated");
            return Ok(FeedbackOutcome::AlreadyRated);
        }
        if !control.accepts(&feedback) {
            return Err(ConversationError::FeedbackMismatch {
                index,
                feedback,
                expected: Some(control.kind),
            });
        }

        match self.store.update_message(index, feedback).await {
            Ok(()) => {
                info!(conversation_id = %self.conversation_id, index, %feedback, "updated message feedback");
                self.messages[index].feedback = Some(feedback);
                Ok(FeedbackOutcome::Saved)
            }
            Err(MessageStoreError::NotFound { .. }) => {
                warn!(conversation_id = %self.conversation_id, index, "store has no message for feedback");
                Ok(FeedbackOutcome::MissingMessage)
            }
            Err(MessageStoreError::FeedbackAlreadySet { .. }) => {
                warn!(conversation_id = %self.conversation_id, index, "store reports message already rated");
                if let Err(err) = self.refresh().await {
                    warn!(conversation_id = %self.conversation_id, "failed to refresh after rating conflict: {err}");
                }
                Ok(FeedbackOutcome::AlreadyRated)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn reply_index(&self, messages: &[Message]) -> Option<usize> {
        let index = messages.len().checked_sub(1)?;
        let is_new = self
            .last_assistant_index
            .is_none_or(|last_seen| index > last_seen);
        (messages[index].role == Role::Assistant && is_new).then_some(index)
    }

    async fn locate_posted(&mut self, turn: &UserTurn) -> Result<usize, ConversationError> {
        let messages = self.store.get_messages().await?;
        let Some(index) = messages.iter().rposition(|message| turn.matches(message)) else {
            warn!(conversation_id = %self.conversation_id, "store accepted the message but does not list it");
            self.adopt(messages);
            return Err(ConversationError::PostedTurnMissing);
        };

        self.adopt_through(messages, index);
        Ok(index)
    }

    async fn reconcile_post(&mut self, turn: &UserTurn, known_len: usize) -> Option<usize> {
        let messages = match self.store.get_messages().await {
            Ok(messages) => messages,
            Err(err) => {
                warn!(conversation_id = %self.conversation_id, "reconcile fetch failed: {err}");
                return None;
            }
        };

        let index = messages
            .iter()
            .enumerate()
            .skip(known_len)
            .rev()
            .find(|(_, message)| turn.matches(message))
            .map(|(index, _)| index)?;

        info!(conversation_id = %self.conversation_id, index, "store recorded the message despite the error");
        self.adopt_through(messages, index);
        Some(index)
    }

    /// Adopts the store's view up to and including the user's turn at
    /// `index`. Anything after it is left for the poll loop to find.
    fn adopt_through(&mut self, mut messages: Vec<Message>, index: usize) {
        messages.truncate(index + 1);
        self.adopt(messages);
    }

    fn adopt(&mut self, messages: Vec<Message>) {
        let last_assistant = messages
            .iter()
            .rposition(|message| message.role == Role::Assistant);
        self.last_assistant_index = match (self.last_assistant_index, last_assistant) {
            (Some(previous), Some(current)) => Some(previous.max(current)),
            (previous, current) => current.or(previous),
        };
        if messages.len() < self.messages.len() {
            // The store was cleared elsewhere.
            self.last_assistant_index = last_assistant;
        }
        self.messages = messages;
    }

    fn transition(&mut self, state: TurnState, observer: &mut dyn TurnObserver) {
        self.state = state;
        observer.state_changed(state);
    }

    fn fail(
        &mut self,
        err: ConversationError,
        observer: &mut dyn TurnObserver,
    ) -> ConversationError {
        self.transition(TurnState::Failed, observer);
        err
    }
}
