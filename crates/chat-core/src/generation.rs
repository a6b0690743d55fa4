use std::fmt;

use thiserror::Error;

pub const AVAILABLE_MODELS: &[&str] = &["deepseek/deepseek-r1", "google/gemini-2.0-flash-exp"];
pub const AVAILABLE_TOOLS: &[&str] = &["Deep Research", "Web Search", "File Search", "Computer Use"];
pub const DEFAULT_TOOLS: &[&str] = &["Web Search"];

pub const TEMPERATURE_RANGE: (f32, f32) = (0.0, 2.0);
pub const TOP_P_RANGE: (f32, f32) = (0.0, 1.0);
pub const TOP_K_MAX: u32 = 100;
pub const REPETITION_PENALTY_RANGE: (f32, f32) = (1.0, 2.0);
pub const MAX_NEW_TOKENS_LIMIT: u32 = 16_384;

/// Model and sampling choices made in the settings panel.
///
/// These are shown to the user and logged but are not sent to the
/// message store; the store contract has no field for them.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub model: String,
    pub tools: Vec<String>,
    pub custom: bool,
    pub sampling: bool,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub random_seed: u32,
    pub repetition_penalty: f32,
    pub min_new_tokens: u32,
    pub max_new_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: AVAILABLE_MODELS[0].to_string(),
            tools: DEFAULT_TOOLS.iter().map(|tool| (*tool).to_string()).collect(),
            custom: false,
            sampling: true,
            temperature: 0.6,
            top_p: 0.9,
            top_k: 50,
            random_seed: 0,
            repetition_penalty: 1.0,
            min_new_tokens: 0,
            max_new_tokens: 1024,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum GenerationSettingsError {
    #[error("unknown model {0}")]
    UnknownModel(String),
    #[error("unknown tool {0}")]
    UnknownTool(String),
    #[error("{name} must be between {min} and {max}, got {value}")]
    OutOfRange {
        name: &'static str,
        min: String,
        max: String,
        value: String,
    },
}

impl GenerationSettings {
    pub fn validate(&self) -> Result<(), GenerationSettingsError> {
        if !AVAILABLE_MODELS.contains(&self.model.as_str()) {
            return Err(GenerationSettingsError::UnknownModel(self.model.clone()));
        }

        if let Some(tool) = self
            .tools
            .iter()
            .find(|tool| !AVAILABLE_TOOLS.contains(&tool.as_str()))
        {
            return Err(GenerationSettingsError::UnknownTool(tool.clone()));
        }

        check_float("temperature", self.temperature, TEMPERATURE_RANGE)?;
        check_float("top_p", self.top_p, TOP_P_RANGE)?;
        check_float(
            "repetition_penalty",
            self.repetition_penalty,
            REPETITION_PENALTY_RANGE,
        )?;

        if self.top_k > TOP_K_MAX {
            return Err(out_of_range("top_k", 0, TOP_K_MAX, self.top_k));
        }

        if self.max_new_tokens < self.min_new_tokens || self.max_new_tokens > MAX_NEW_TOKENS_LIMIT
        {
            return Err(out_of_range(
                "max_new_tokens",
                self.min_new_tokens,
                MAX_NEW_TOKENS_LIMIT,
                self.max_new_tokens,
            ));
        }

        Ok(())
    }
}

impl fmt::Display for GenerationSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Model: {}", self.model)?;
        writeln!(f, "Tools: {}", self.tools.join(", "))?;
        writeln!(f, "Custom mode: {}", on_off(self.custom))?;
        writeln!(f, "Sampling decoding: {}", on_off(self.sampling))?;
        if self.sampling {
            writeln!(f, "Temperature: {}", self.temperature)?;
            writeln!(f, "Top P: {}", self.top_p)?;
            writeln!(f, "Top K: {}", self.top_k)?;
            writeln!(f, "Random seed: {}", self.random_seed)?;
        }
        writeln!(f, "Repetition penalty: {}", self.repetition_penalty)?;
        writeln!(f, "Min tokens: {}", self.min_new_tokens)?;
        write!(f, "Max tokens: {}", self.max_new_tokens)
    }
}

fn check_float(
    name: &'static str,
    value: f32,
    (min, max): (f32, f32),
) -> Result<(), GenerationSettingsError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(out_of_range(name, min, max, value))
    }
}

fn out_of_range<T: ToString>(name: &'static str, min: T, max: T, value: T) -> GenerationSettingsError {
    GenerationSettingsError::OutOfRange {
        name,
        min: min.to_string(),
        max: max.to_string(),
        value: value.to_string(),
    }
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}
