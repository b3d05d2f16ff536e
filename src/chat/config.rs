//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling chat behavior.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::chat::render::REDRAW_INTERVAL;
use crate::history::HistoryStore;
use crate::types::DEFAULT_MODEL;

/// Command-line arguments for the clix tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Model to use for chat.
    #[arrrg(
        optional,
        "Model to use (default: groq/llama-3.1-8b-instant)",
        "PROVIDER/MODEL"
    )]
    pub model: Option<String>,
}

/// Rewrites the `-m` short option into the `--model` long option.
///
/// Accepts `-m VALUE` and `-mVALUE` in option position. The value of a model option
/// and everything after `--` pass through untouched.
pub fn normalize_arguments<I, S>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut normalized = Vec::new();
    let mut takes_value = false;
    let mut options_done = false;
    for arg in args.into_iter().map(Into::into) {
        if takes_value || options_done {
            takes_value = false;
            normalized.push(arg);
        } else if arg == "--" {
            options_done = true;
            normalized.push(arg);
        } else if arg == "-m" || arg == "--model" {
            takes_value = true;
            normalized.push("--model".to_string());
        } else if let Some(value) = arg.strip_prefix("-m") {
            normalized.push(format!("--model={value}"));
        } else {
            normalized.push(arg);
        }
    }
    normalized
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// The `provider/model` identifier sent with every turn.
    pub model: String,

    /// Where the conversation is persisted by `/exit-v`.
    pub history_path: PathBuf,

    /// Minimum time between two redraws of a streaming reply.
    pub redraw_interval: Duration,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Model: groq/llama-3.1-8b-instant
    /// - History: ~/.clix_chat_history.json
    /// - Redraw interval: 100ms
    /// - Color: enabled when stdout is a terminal
    pub fn new() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            history_path: HistoryStore::default_path(),
            redraw_interval: REDRAW_INTERVAL,
            use_color: std::io::stdout().is_terminal(),
        }
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the history file location.
    pub fn with_history_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.history_path = path.into();
        self
    }

    /// Sets the minimum time between redraws.
    pub fn with_redraw_interval(mut self, interval: Duration) -> Self {
        self.redraw_interval = interval;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        let config = ChatConfig::new();
        match args.model {
            Some(model) if !model.trim().is_empty() => config.with_model(model.trim()),
            _ => config,
        }
    }
}
