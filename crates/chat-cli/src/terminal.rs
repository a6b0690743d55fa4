use std::io::{self, Write};
use std::time::Duration;

use chat_core::render::{
    ASSISTANT_AVATAR, FILES_LABEL, PAGE_CAPTION, PAGE_TITLE, THINKING_LABEL, THOUGHTS_LABEL,
    WELCOME_TEXT,
};
use chat_core::{
    Block, FeedbackControlKind, GenerationSettings, Message, RenderedMessage, TurnObserver,
    TurnState, render_message,
};
use tokio::time::sleep;
use tracing::{debug, warn};

pub const TYPING_DELAY: Duration = Duration::from_millis(5);

/// Writes rendered messages to stdout. Logs go to stderr.
#[derive(Debug, Clone, Copy)]
pub struct Console {
    typing: bool,
}

impl Console {
    pub fn new(typing: bool) -> Self {
        Self { typing }
    }

    pub fn banner(&self, settings: &GenerationSettings) -> io::Result<()> {
        let mut out = io::stdout();
        writeln!(out, "{PAGE_TITLE}")?;
        writeln!(out, "{PAGE_CAPTION}")?;
        writeln!(out, "{WELCOME_TEXT}")?;
        writeln!(out, "Model: {} | Tools: {}", settings.model, settings.tools.join(", "))?;
        writeln!(out, "Type /help for commands.")?;
        writeln!(out)?;
        out.flush()
    }

    pub fn line(&self, text: &str) -> io::Result<()> {
        let mut out = io::stdout();
        writeln!(out, "{text}")?;
        out.flush()
    }

    pub fn prompt(&self) -> io::Result<()> {
        let mut out = io::stdout();
        write!(out, "> ")?;
        out.flush()
    }

    pub fn transcript(&self, rendered: &[RenderedMessage]) -> io::Result<()> {
        let mut out = io::stdout();
        for message in rendered {
            write_message(&mut out, message)?;
        }
        out.flush()
    }

    /// Shows a freshly arrived message, typing its text out when enabled.
    pub async fn reveal(&self, rendered: &RenderedMessage) -> io::Result<()> {
        if !self.typing {
            return self.transcript(std::slice::from_ref(rendered));
        }

        write_typed(&mut io::stdout(), rendered, TYPING_DELAY).await
    }
}

/// Types a message out one character per `delay`. Reasoning is typed under
/// the thinking label and closed with the thoughts label.
async fn write_typed(
    out: &mut impl Write,
    rendered: &RenderedMessage,
    delay: Duration,
) -> io::Result<()> {
    writeln!(out, "{}", format_header(rendered))?;
    for block in &rendered.blocks {
        match block {
            Block::Thoughts(reasoning) => {
                writeln!(out, "  ▸ {THINKING_LABEL}")?;
                type_out(out, &indent_by(reasoning, 4), delay).await?;
                writeln!(out, "  ▸ {THOUGHTS_LABEL}")?;
            }
            Block::Text(_) | Block::Greeting | Block::Closing => {
                type_out(out, &indent(&block.text()), delay).await?;
            }
            other => writeln!(out, "{}", format_block(other))?,
        }
    }
    if let Some(hint) = feedback_hint(rendered) {
        writeln!(out, "{hint}")?;
    }
    writeln!(out)?;
    out.flush()
}

async fn type_out(out: &mut impl Write, text: &str, delay: Duration) -> io::Result<()> {
    for ch in text.chars() {
        write!(out, "{ch}")?;
        out.flush()?;
        sleep(delay).await;
    }
    writeln!(out)
}

fn write_message(out: &mut impl Write, rendered: &RenderedMessage) -> io::Result<()> {
    writeln!(out, "{}", format_header(rendered))?;
    for block in &rendered.blocks {
        writeln!(out, "{}", format_block(block))?;
    }
    if let Some(hint) = feedback_hint(rendered) {
        writeln!(out, "{hint}")?;
    }
    writeln!(out)
}

pub fn format_header(rendered: &RenderedMessage) -> String {
    format!("{} [{}] {}", rendered.avatar, rendered.index, rendered.role)
}

pub fn format_block(block: &Block) -> String {
    match block {
        Block::Thoughts(_) => format!("  ▸ {THOUGHTS_LABEL}\n{}", indent_by(&block.text(), 4)),
        Block::Files(_) => format!("  {FILES_LABEL}:\n{}", indent_by(&block.text(), 4)),
        _ => indent(&block.text()),
    }
}

/// The rating prompt under an assistant message, or the rating it already has.
pub fn feedback_hint(rendered: &RenderedMessage) -> Option<String> {
    let control = rendered.feedback?;
    if let Some(current) = control.current {
        return Some(format!("  Rated {current}"));
    }

    let hint = match control.kind {
        FeedbackControlKind::Thumbs => format!("  Rate this reply: /rate {} up|down", rendered.index),
        FeedbackControlKind::Stars => {
            format!("  Rate your experience: /rate {} 1-5", rendered.index)
        }
    };
    Some(hint)
}

fn indent(text: &str) -> String {
    indent_by(text, 2)
}

fn indent_by(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .map(|line| format!("{pad}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Echoes the user's message once stored and shows the thinking indicator
/// while the reply is pending.
pub struct ConsoleObserver {
    console: Console,
}

impl ConsoleObserver {
    pub fn new(console: Console) -> Self {
        Self { console }
    }
}

impl TurnObserver for ConsoleObserver {
    fn state_changed(&mut self, state: TurnState) {
        if state == (TurnState::AwaitingAssistantReply { polls: 1 })
            && let Err(err) = self
                .console
                .line(&format!("{ASSISTANT_AVATAR} {THINKING_LABEL}"))
        {
            warn!("failed to write thinking indicator: {err}");
        }
    }

    fn user_turn_posted(&mut self, index: usize, message: &Message) {
        if let Err(err) = self
            .console
            .transcript(std::slice::from_ref(&render_message(index, message)))
        {
            warn!("failed to echo user message: {err}");
        }
    }

    fn poll_missed(&mut self, polls: u32) {
        debug!(polls, "assistant has not replied yet");
    }
}

#[cfg(test)]
mod tests {
    use chat_core::{Feedback, Message, Thumbs, render_message};

    use std::time::Duration;

    use super::{feedback_hint, format_block, format_header, write_message, write_typed};

    #[test]
    fn header_shows_avatar_index_and_role() {
        let rendered = render_message(1, &Message::user("Book me a flight", None));
        assert_eq!(format_header(&rendered), "🧑‍💻 [1] user");
    }

    #[test]
    fn thoughts_are_labelled_and_nested() {
        let rendered = render_message(
            2,
            &Message::assistant("Lisbon").with_reasoning("checked fares\ncompared dates"),
        );
        assert_eq!(
            format_block(&rendered.blocks[0]),
            "  ▸ Thoughts\n    checked fares\n    compared dates"
        );
        assert_eq!(format_block(&rendered.blocks[1]), "  Lisbon");
    }

    #[test]
    fn hints_match_the_control_kind() {
        let reply = render_message(2, &Message::assistant("Lisbon"));
        assert_eq!(
            feedback_hint(&reply).as_deref(),
            Some("  Rate this reply: /rate 2 up|down")
        );

        let closing = render_message(4, &Message::assistant("Safe travels!</s>"));
        assert_eq!(
            feedback_hint(&closing).as_deref(),
            Some("  Rate your experience: /rate 4 1-5")
        );

        assert_eq!(feedback_hint(&render_message(0, &Message::greeting())), None);
    }

    #[test]
    fn rated_message_shows_existing_rating() {
        let mut message = Message::assistant("Lisbon");
        message.feedback = Some(Feedback::Thumbs(Thumbs::Down));

        assert_eq!(
            feedback_hint(&render_message(2, &message)).as_deref(),
            Some("  Rated 👎")
        );
    }

    #[test]
    fn transcript_lists_closing_after_prefix() {
        let mut out = Vec::new();
        write_message(&mut out, &render_message(3, &Message::assistant("Safe travels!</s>")))
            .expect("write to buffer");

        let text = String::from_utf8(out).expect("utf8 output");
        let prefix = text.find("Safe travels!").expect("prefix shown");
        let closing = text.find("Thank you for choosing").expect("closing shown");
        assert!(prefix < closing);
        assert!(text.contains("/rate 3 1-5"));
    }

    #[tokio::test]
    async fn typed_reasoning_runs_under_thinking_then_thoughts() {
        let rendered = render_message(
            2,
            &Message::assistant("Lisbon").with_reasoning("checked fares\ncompared dates"),
        );
        let mut out = Vec::new();
        write_typed(&mut out, &rendered, Duration::ZERO)
            .await
            .expect("write to buffer");

        let text = String::from_utf8(out).expect("utf8 output");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            &lines[1..6],
            &[
                "  ▸ Thinking ...",
                "    checked fares",
                "    compared dates",
                "  ▸ Thoughts",
                "  Lisbon",
            ]
        );
        assert!(text.contains("/rate 2 up|down"));
    }
}
