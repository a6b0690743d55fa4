use chat_core::GenerationSettings;
use clap::{Args, Parser, Subcommand};

/// Terminal chat with a human-operated travel assistant
#[derive(Debug, Parser)]
#[command(name = "oz-chat")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Print replies at once instead of typing them out
    #[arg(long, global = true, env = "OZ_CHAT_NO_TYPING")]
    pub no_typing: bool,

    #[command(flatten)]
    pub settings: SettingsArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive chat (default when no command specified)
    Chat,

    /// Clear the conversation and start over with a greeting
    New,

    /// Print the conversation so far
    History,

    /// Rate an assistant message: up/down for replies, 1-5 for the closing message
    Rate {
        /// 0-based message index, as shown in the transcript
        index: usize,

        /// up, down, or a star count from 1 to 5
        value: String,
    },

    /// Post an assistant turn as the operator
    Reply {
        /// Reply text
        text: String,

        /// Reasoning shown to the user above the reply
        #[arg(long)]
        reasoning: Option<String>,

        /// Close the conversation and ask the user for a star rating
        #[arg(long)]
        end: bool,
    },
}

/// Model and sampling choices. Shown to the user, never sent to the store.
#[derive(Debug, Clone, Args)]
pub struct SettingsArgs {
    /// Model name
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Tool to enable (repeatable)
    #[arg(long = "tool", global = true)]
    pub tools: Vec<String>,

    /// Enable custom mode
    #[arg(long, global = true)]
    pub custom: bool,

    /// Use greedy decoding instead of sampling
    #[arg(long, global = true)]
    pub greedy: bool,

    #[arg(long, global = true)]
    pub temperature: Option<f32>,

    #[arg(long, global = true)]
    pub top_p: Option<f32>,

    #[arg(long, global = true)]
    pub top_k: Option<u32>,

    #[arg(long, global = true)]
    pub seed: Option<u32>,

    #[arg(long, global = true)]
    pub repetition_penalty: Option<f32>,

    #[arg(long, global = true)]
    pub min_new_tokens: Option<u32>,

    #[arg(long, global = true)]
    pub max_new_tokens: Option<u32>,
}

impl SettingsArgs {
    pub fn to_settings(&self) -> GenerationSettings {
        let defaults = GenerationSettings::default();

        GenerationSettings {
            model: self.model.clone().unwrap_or(defaults.model),
            tools: if self.tools.is_empty() {
                defaults.tools
            } else {
                self.tools.clone()
            },
            custom: self.custom,
            sampling: !self.greedy,
            temperature: self.temperature.unwrap_or(defaults.temperature),
            top_p: self.top_p.unwrap_or(defaults.top_p),
            top_k: self.top_k.unwrap_or(defaults.top_k),
            random_seed: self.seed.unwrap_or(defaults.random_seed),
            repetition_penalty: self
                .repetition_penalty
                .unwrap_or(defaults.repetition_penalty),
            min_new_tokens: self.min_new_tokens.unwrap_or(defaults.min_new_tokens),
            max_new_tokens: self.max_new_tokens.unwrap_or(defaults.max_new_tokens),
        }
    }
}
