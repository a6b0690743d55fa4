mod chat;
mod cli;
mod error;
mod terminal;

use chat_core::{ClientConfig, Feedback, MessageStore, MessageStoreClient, NewMessage, Session};
use clap::Parser;
use tracing::{error, info};

use chat::describe_outcome;
use cli::{Cli, Command};
use error::CliError;
use terminal::Console;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "oz_chat=info,chat_core=info".to_string()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        error!("{err}");
        eprintln!("error: {err}");
        std::process::exit(err.exit_code());
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let settings = cli.settings.to_settings();
    settings.validate()?;

    let config = ClientConfig::from_env()?;
    let client = MessageStoreClient::new(&config)?;
    let console = Console::new(!cli.no_typing);
    info!(base_url = client.base_url(), model = %settings.model, "connecting to message store");

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => {
            let mut session = Session::open(client, config.poll).await?;
            chat::run_chat(&mut session, &settings, console).await
        }
        Command::New => {
            let mut session = Session::detached(client, config.poll);
            session.start_new().await?;
            console.transcript(&session.render())?;
            Ok(())
        }
        Command::History => {
            let mut session = Session::detached(client, config.poll);
            session.refresh().await?;
            console.transcript(&session.render())?;
            Ok(())
        }
        Command::Rate { index, value } => {
            let feedback =
                Feedback::parse(&value).ok_or_else(|| CliError::InvalidFeedback(value.clone()))?;
            let mut session = Session::detached(client, config.poll);
            let outcome = session.rate(index, feedback).await?;
            console.line(&describe_outcome(index, feedback, outcome))?;
            Ok(())
        }
        Command::Reply {
            text,
            reasoning,
            end,
        } => {
            let message = if end {
                NewMessage::closing(&text)
            } else {
                NewMessage::assistant(text)
            }
            .with_reasoning(reasoning);
            client.post_message(message).await?;
            console.line(if end {
                "Posted closing message."
            } else {
                "Posted assistant reply."
            })?;
            Ok(())
        }
    }
}
