//! Interactive chat client that streams replies from Groq or Gemini.
//!
//! # Usage
//!
//! ```bash
//! # Chat with the default model (groq/llama-3.1-8b-instant)
//! clix
//!
//! # Pick another provider/model
//! clix --model gemini/gemini-2.0-flash
//! clix -m groq/llama-3.3-70b-versatile
//! ```
//!
//! # Commands
//!
//! - `/exit` - Delete the saved history and quit
//! - `/exit-v` - Save the conversation and quit
//!
//! `GROQ_API_KEY` and `GEMINI_API_KEY` are read from the environment, or from a
//! `.env` file in the working directory or one of its parents.
//!
//! Diagnostics go to stderr; set `CLIX_LOG` (e.g. `CLIX_LOG=clix=debug`) to see them.

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arrrg::CommandLine;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use clix::chat::{
    ChatArgs, ChatConfig, ChatSession, Editor, LiveRenderer, Renderer, normalize_arguments,
    prompt, run,
};
use clix::{Credentials, Gateway, Provider};

const USAGE: &str = "clix [--model PROVIDER/MODEL]";

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("CLIX_LOG").unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Main entry point for the clix application.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_logging();

    let args = normalize_arguments(std::env::args().skip(1));
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let (args, _) = ChatArgs::from_arguments_relaxed(USAGE, &args);
    let config = ChatConfig::from(args);
    let use_color = config.use_color;
    let mut renderer = LiveRenderer::stdout(use_color);

    let credentials = Credentials::load();
    if credentials.is_empty() {
        let vars: Vec<&str> = Provider::ALL.iter().map(|p| p.credential_var()).collect();
        renderer.print_error(&format!(
            "No API key found. Set {} in your environment or a .env file.",
            vars.join(" or ")
        ));
        return ExitCode::FAILURE;
    }
    tracing::debug!(providers = ?credentials.available(), model = %config.model, "starting");

    match chat(config, credentials, &mut renderer, use_color).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            renderer.print_error(&err.to_string());
            ExitCode::FAILURE
        }
    }
}

async fn chat(
    config: ChatConfig,
    credentials: Credentials,
    renderer: &mut LiveRenderer<std::io::Stdout>,
    use_color: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = Gateway::new(credentials)?;
    let mut session = ChatSession::new(client, config);
    let mut editor = Editor::new()?;

    // Ctrl+C while a reply is pending or streaming. SIGTERM keeps its default action.
    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    tracing::info!(model = %session.model(), "chat ready");

    let reason = run(
        &mut session,
        &mut editor,
        renderer,
        &interrupted,
        &prompt(use_color),
    )
    .await?;
    tracing::debug!(?reason, "chat finished");
    Ok(())
}
