//! Chat application module for interactive conversations.
//!
//! This module provides a streaming REPL chat interface built on top of the
//! completion client. It supports:
//!
//! - Streaming responses redrawn in place as Markdown
//! - Conversation history restored at startup and saved on request
//! - The `/exit` and `/exit-v` commands for ending the session
//!
//! # Architecture
//!
//! The module is organized into several components:
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`session`]: Conversation state and the per-turn request cycle
//! - [`commands`]: Slash command parsing
//! - [`render`]: The live two-column reply view
//! - [`repl`]: The input loop

pub mod markdown;

mod commands;
mod config;
mod render;
mod repl;
mod session;

pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig, normalize_arguments};
pub use render::{LABEL, LiveRenderer, REDRAW_INTERVAL, Renderer, Tone, prompt, render_stream};
pub use repl::{Editor, ExitReason, InputEvent, LineSource, run};
pub use session::{ChatSession, TurnOutcome};
