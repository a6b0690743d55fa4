use std::path::Path;

use chat_core::{
    ConversationError, Feedback, FeedbackOutcome, GenerationSettings, MessageStore,
    MessageStoreError, Session, UserTurn, cancellation,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::error::CliError;
use crate::terminal::{Console, ConsoleObserver};

const HELP_TEXT: &str = "\
Commands:
  /new                     start a new chat
  /attach <file>           attach a file to your next message
  /rate <index> <value>    rate a reply (up|down) or the closing message (1-5)
  /retry                   resend the last message that failed to send
  /history                 show the conversation so far
  /settings                show model and generation settings
  /help                    show this help
  /quit                    leave the chat";

#[derive(Debug, Clone, PartialEq)]
pub enum SlashCommand {
    New,
    Attach(String),
    Rate { index: usize, feedback: Feedback },
    Retry,
    History,
    Settings,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatInput {
    Empty,
    Message(String),
    Command(SlashCommand),
}

pub fn parse_input(line: &str) -> Result<ChatInput, CliError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ChatInput::Empty);
    }
    let Some(command) = line.strip_prefix('/') else {
        return Ok(ChatInput::Message(line.to_string()));
    };

    let command = command.trim_start();
    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let command = match name {
        "new" => SlashCommand::New,
        "attach" => {
            let path = command[name.len()..].trim();
            if path.is_empty() {
                return Err(CliError::Usage("/attach <file>"));
            }
            SlashCommand::Attach(path.to_string())
        }
        "rate" => {
            let (Some(index), Some(value), None) = (parts.next(), parts.next(), parts.next())
            else {
                return Err(CliError::Usage("/rate <index> <up|down|1-5>"));
            };
            let index = index
                .parse::<usize>()
                .map_err(|_| CliError::Usage("/rate <index> <up|down|1-5>"))?;
            let feedback =
                Feedback::parse(value).ok_or_else(|| CliError::InvalidFeedback(value.to_string()))?;
            SlashCommand::Rate { index, feedback }
        }
        "retry" => SlashCommand::Retry,
        "history" => SlashCommand::History,
        "settings" => SlashCommand::Settings,
        "help" => SlashCommand::Help,
        "quit" | "exit" => SlashCommand::Quit,
        other => return Err(CliError::UnknownCommand(other.to_string())),
    };
    Ok(ChatInput::Command(command))
}

pub fn describe_outcome(index: usize, feedback: Feedback, outcome: FeedbackOutcome) -> String {
    match outcome {
        FeedbackOutcome::Saved => format!("Thanks! Saved {feedback} for message {index}."),
        FeedbackOutcome::MissingMessage => format!("There is no message {index} to rate."),
        FeedbackOutcome::AlreadyRated => format!("Message {index} has already been rated."),
    }
}

/// Interactive chat loop. Returns when the user quits or stdin closes.
pub async fn run_chat<S: MessageStore>(
    session: &mut Session<S>,
    settings: &GenerationSettings,
    console: Console,
) -> Result<(), CliError> {
    console.banner(settings)?;
    console.transcript(&session.render())?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut attachments: Vec<String> = Vec::new();
    let mut unsent: Option<UserTurn> = None;

    loop {
        console.prompt()?;
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            console.line("")?;
            break;
        };

        let input = match parse_input(&line) {
            Ok(input) => input,
            Err(err) => {
                console.line(&err.to_string())?;
                continue;
            }
        };

        let turn = match input {
            ChatInput::Empty => continue,
            ChatInput::Message(content) => {
                UserTurn::new(content).with_files(std::mem::take(&mut attachments))
            }
            ChatInput::Command(SlashCommand::Retry) => match unsent.take() {
                Some(turn) => turn,
                None => {
                    console.line("Nothing to resend.")?;
                    continue;
                }
            },
            ChatInput::Command(SlashCommand::Quit) => break,
            ChatInput::Command(command) => {
                run_command(session, settings, console, command, &mut attachments).await?;
                continue;
            }
        };

        unsent = send_turn(session, console, turn).await?;
    }

    info!(conversation_id = %session.conversation_id(), "chat closed");
    Ok(())
}

async fn run_command<S: MessageStore>(
    session: &mut Session<S>,
    settings: &GenerationSettings,
    console: Console,
    command: SlashCommand,
    attachments: &mut Vec<String>,
) -> Result<(), CliError> {
    match command {
        SlashCommand::New => match session.start_new().await {
            Ok(()) => {
                attachments.clear();
                console.line("Started a new chat.")?;
                console.transcript(&session.render())?;
            }
            Err(err) => console.line(&format!("Could not start a new chat: {err}"))?,
        },
        SlashCommand::Attach(path) => match attachment_name(&path) {
            Ok(name) => {
                console.line(&format!("Attached {name}."))?;
                attachments.push(name);
            }
            Err(err) => console.line(&err.to_string())?,
        },
        SlashCommand::Rate { index, feedback } => match session.rate(index, feedback).await {
            Ok(outcome) => console.line(&describe_outcome(index, feedback, outcome))?,
            Err(err) => console.line(&format!("Could not save rating: {err}"))?,
        },
        SlashCommand::History => match session.refresh().await.map(|_| ()) {
            Ok(()) => console.transcript(&session.render())?,
            Err(err) => console.line(&format!("Could not load the conversation: {err}"))?,
        },
        SlashCommand::Settings => console.line(&settings.to_string())?,
        SlashCommand::Help => console.line(HELP_TEXT)?,
        SlashCommand::Retry | SlashCommand::Quit => {}
    }
    Ok(())
}

/// Sends one turn and shows the reply. Returns the turn when it was not
/// stored so the user can resend it.
async fn send_turn<S: MessageStore>(
    session: &mut Session<S>,
    console: Console,
    turn: UserTurn,
) -> Result<Option<UserTurn>, CliError> {
    let (handle, mut cancel) = cancellation();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });

    let mut observer = ConsoleObserver::new(console);
    let result = session
        .send_user_turn(turn, &mut cancel, &mut observer)
        .await;
    ctrl_c.abort();

    match result {
        Ok(reply) => {
            console.reveal(&reply.render()).await?;
            Ok(None)
        }
        Err(ConversationError::Cancelled { polls }) => {
            info!(polls, "reply wait cancelled by user");
            console.line("Stopped waiting. Use /history to check for the reply later.")?;
            Ok(None)
        }
        Err(ConversationError::ReplyTimedOut { waited, .. }) => {
            console.line(&format!(
                "No reply after {}s. Use /history to check again later.",
                waited.as_secs()
            ))?;
            Ok(None)
        }
        Err(ConversationError::Rejected { turn, source }) => {
            console.line(&format!("Message not sent: {}", rejection_text(&source)))?;
            Ok(Some(turn))
        }
        Err(ConversationError::SendFailed { turn, source }) => {
            warn!("send failed: {source}");
            console.line(&format!(
                "Message not sent ({source}). Type /retry to send it again."
            ))?;
            Ok(Some(turn))
        }
        Err(err) => {
            console.line(&format!("Something went wrong: {err}"))?;
            Ok(None)
        }
    }
}

fn rejection_text(source: &MessageStoreError) -> String {
    match source {
        MessageStoreError::Validation { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

fn attachment_name(path: &str) -> Result<String, CliError> {
    let path = Path::new(path);
    if !path.is_file() {
        return Err(CliError::MissingAttachment(path.display().to_string()));
    }
    Ok(path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string()))
}
