//! The read-eval-print loop that ties input, commands, and the session together.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::chat::commands::{ChatCommand, help_text, parse_command};
use crate::chat::render::{Renderer, Tone};
use crate::chat::session::{ChatSession, TurnOutcome};
use crate::client::CompletionClient;
use crate::error::{Error, Result};

/// One event from the input source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// A line of input, without its trailing newline.
    Line(String),
    /// Ctrl+C at the prompt.
    Interrupted,
    /// Ctrl+D or end of the input stream.
    Eof,
}

/// Source of user input lines.
pub trait LineSource {
    /// Shows `prompt` and waits for the next input event.
    fn read_line(&mut self, prompt: &str) -> Result<InputEvent>;
}

/// Line source backed by a `rustyline` editor with in-memory recall.
pub struct Editor {
    editor: DefaultEditor,
}

impl Editor {
    /// Creates an editor on the controlling terminal.
    pub fn new() -> Result<Self> {
        let editor = DefaultEditor::new().map_err(input_error)?;
        Ok(Self { editor })
    }
}

impl LineSource for Editor {
    fn read_line(&mut self, prompt: &str) -> Result<InputEvent> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(InputEvent::Line(line))
            }
            Err(ReadlineError::Interrupted) => Ok(InputEvent::Interrupted),
            Err(ReadlineError::Eof) => Ok(InputEvent::Eof),
            Err(err) => Err(input_error(err)),
        }
    }
}

fn input_error(err: ReadlineError) -> Error {
    match err {
        ReadlineError::Io(err) => Error::io("terminal input failed", err),
        err => Error::io("terminal input failed", io::Error::other(err.to_string())),
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// `/exit`: history deleted.
    Discarded,
    /// `/exit-v`: history saved.
    Saved,
    /// Ctrl+C at the prompt or during a reply; nothing saved.
    Interrupted,
    /// End of input; nothing saved.
    EndOfInput,
}

/// Runs the chat loop until a command, an interrupt, or the end of input.
///
/// Greets with the restore notices (when history was loaded), then the banner and
/// the command help.
///
/// Per-turn failures are reported through `renderer` and the loop continues. A
/// failure to save or delete the history ends the loop with an error.
pub async fn run<C: CompletionClient>(
    session: &mut ChatSession<C>,
    input: &mut dyn LineSource,
    renderer: &mut dyn Renderer,
    interrupted: &AtomicBool,
    prompt: &str,
) -> Result<ExitReason> {
    if session.restored() {
        renderer.print_notice(Tone::Muted, "↻ Resuming previous session...");
        renderer.print_notice(Tone::Success, "Session Restored!");
    }
    renderer.print_notice(Tone::Info, "Clix Online.");
    renderer.print_notice(Tone::Muted, help_text());

    loop {
        let event = input.read_line(prompt)?;
        // A signal delivered while blocked at the prompt must not abort the next turn.
        interrupted.store(false, Ordering::Relaxed);

        let line = match event {
            InputEvent::Line(line) => line,
            InputEvent::Interrupted => {
                renderer.print_notice(Tone::Warning, "Exiting without saving...");
                return Ok(ExitReason::Interrupted);
            }
            InputEvent::Eof => {
                renderer.print_notice(Tone::Warning, "Exiting without saving...");
                return Ok(ExitReason::EndOfInput);
            }
        };

        match parse_command(&line) {
            Some(ChatCommand::Discard) => {
                session.discard()?;
                renderer.print_notice(Tone::Danger, "Session deleted. Peace!");
                return Ok(ExitReason::Discarded);
            }
            Some(ChatCommand::SaveAndExit) => {
                session.save()?;
                renderer.print_notice(Tone::Success, "Session saved. Peace!");
                return Ok(ExitReason::Saved);
            }
            None => {}
        }

        match session.take_turn(&line, renderer, interrupted).await {
            TurnOutcome::Completed(_) => {}
            TurnOutcome::Failed(err) => renderer.print_error(&err.to_string()),
            TurnOutcome::Interrupted => {
                renderer.print_notice(Tone::Warning, "Exiting without saving...");
                return Ok(ExitReason::Interrupted);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;

    use futures::stream;

    use crate::chat::config::ChatConfig;
    use crate::chat::render::LiveRenderer;
    use crate::client::FragmentStream;
    use crate::history::HistoryStore;
    use crate::types::{Conversation, Message};

    struct Lines(VecDeque<InputEvent>);

    impl Lines {
        fn new(lines: &[&str]) -> Self {
            Self(
                lines
                    .iter()
                    .map(|line| InputEvent::Line(line.to_string()))
                    .collect(),
            )
        }
    }

    impl LineSource for Lines {
        fn read_line(&mut self, _prompt: &str) -> Result<InputEvent> {
            Ok(self.0.pop_front().unwrap_or(InputEvent::Eof))
        }
    }

    struct Echo;

    #[async_trait::async_trait]
    impl CompletionClient for Echo {
        async fn stream_completion(
            &self,
            _model: &str,
            messages: &[Message],
        ) -> Result<FragmentStream> {
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            if last == "fail" {
                return Err(Error::api(500, None, "boom"));
            }
            Ok(Box::pin(stream::iter(vec![Ok(format!("echo {last}"))])))
        }
    }

    fn setup() -> (tempfile::TempDir, ChatSession<Echo>) {
        let dir = tempfile::tempdir().unwrap();
        let config = ChatConfig::new()
            .with_history_path(dir.path().join("history.json"))
            .without_color();
        let session = ChatSession::new(Echo, config);
        (dir, session)
    }

    async fn drive(
        session: &mut ChatSession<Echo>,
        input: &mut dyn LineSource,
    ) -> (Result<ExitReason>, String) {
        let mut renderer = LiveRenderer::new(Vec::new(), false).with_size(80, 24);
        let interrupted = AtomicBool::new(false);
        let reason = run(session, input, &mut renderer, &interrupted, "You > ").await;
        let output = String::from_utf8(renderer.into_inner()).unwrap();
        (reason, output)
    }

    #[tokio::test]
    async fn save_and_exit_persists() {
        let (dir, mut session) = setup();
        let (reason, output) = drive(&mut session, &mut Lines::new(&["hi", "/exit-v"])).await;
        assert_eq!(reason.unwrap(), ExitReason::Saved);
        assert!(output.contains("Session saved. Peace!"));
        assert!(dir.path().join("history.json").exists());
    }

    #[tokio::test]
    async fn failed_turn_is_reported_and_loop_continues() {
        let (_dir, mut session) = setup();
        let (reason, output) =
            drive(&mut session, &mut Lines::new(&["fail", "again"])).await;
        assert_eq!(reason.unwrap(), ExitReason::EndOfInput);
        assert!(output.contains("Error: API error (500): boom"));
        assert!(output.contains("echo again"));
        assert_eq!(session.conversation().len(), 2);
    }

    #[tokio::test]
    async fn interrupt_at_prompt_exits_without_saving() {
        let (dir, mut session) = setup();
        let mut input = Lines(vec![
            InputEvent::Line("hi".to_string()),
            InputEvent::Interrupted,
        ]
        .into());
        let (reason, output) = drive(&mut session, &mut input).await;
        assert_eq!(reason.unwrap(), ExitReason::Interrupted);
        assert!(output.contains("Exiting without saving..."));
        assert!(!dir.path().join("history.json").exists());
    }

    #[tokio::test]
    async fn restore_notices_come_before_banner() {
        let (dir, mut session) = setup();
        HistoryStore::new(dir.path().join("history.json"))
            .save(&Conversation::from(vec![Message::user("hi")]))
            .unwrap();
        let mut session_restored = ChatSession::new(Echo, session.config().clone());
        assert!(session_restored.restored());

        let (_, output) = drive(&mut session_restored, &mut Lines::new(&[])).await;
        let resuming = output.find("↻ Resuming previous session...").unwrap();
        let restored = output.find("Session Restored!").unwrap();
        let online = output.find("Clix Online.").unwrap();
        let help = output.find("/exit-v").unwrap();
        assert!(resuming < restored && restored < online && online < help);

        let (_, output) = drive(&mut session, &mut Lines::new(&[])).await;
        assert!(!output.contains("Session Restored!"));
        assert!(output.starts_with("Clix Online."));
    }

    /// Sets the interrupt flag while "blocked" at the prompt, as a signal would.
    struct SignalAtPrompt<'a> {
        lines: Lines,
        interrupted: &'a AtomicBool,
    }

    impl LineSource for SignalAtPrompt<'_> {
        fn read_line(&mut self, prompt: &str) -> Result<InputEvent> {
            self.interrupted.store(true, Ordering::Relaxed);
            self.lines.read_line(prompt)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn signal_between_turns_does_not_abort_next_turn() {
        let (_dir, mut session) = setup();
        let interrupted = AtomicBool::new(false);
        let mut input = SignalAtPrompt {
            lines: Lines::new(&["hi", "/exit-v"]),
            interrupted: &interrupted,
        };
        let mut renderer = LiveRenderer::new(Vec::new(), false).with_size(80, 24);
        let reason = run(&mut session, &mut input, &mut renderer, &interrupted, "You > ")
            .await
            .unwrap();
        assert_eq!(reason, ExitReason::Saved);
        assert!(String::from_utf8(renderer.into_inner()).unwrap().contains("echo hi"));
        assert_eq!(
            session.conversation().messages(),
            &[Message::user("hi"), Message::assistant("echo hi")]
        );
    }

    #[tokio::test]
    async fn save_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = ChatConfig::new()
            .with_history_path(dir.path().join("missing").join("history.json"))
            .without_color();
        let mut session = ChatSession::new(Echo, config);
        let (reason, _) = drive(&mut session, &mut Lines::new(&["/exit-v"])).await;
        assert!(matches!(reason, Err(Error::Io { .. })));
    }
}
