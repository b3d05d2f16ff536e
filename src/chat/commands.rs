//! Slash command parsing for the chat application.
//!
//! Only two commands exist, and both end the session. Every other input, including
//! unknown `/words` and the empty line, is sent to the model as a chat turn.

/// A parsed chat command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatCommand {
    /// `/exit`: delete the persisted history and quit.
    Discard,

    /// `/exit-v`: persist the conversation and quit.
    SaveAndExit,
}

impl ChatCommand {
    /// Every command, in the order they are listed in the help.
    pub const ALL: [ChatCommand; 2] = [ChatCommand::Discard, ChatCommand::SaveAndExit];

    /// The literal text that invokes this command.
    pub fn literal(&self) -> &'static str {
        match self {
            ChatCommand::Discard => "/exit",
            ChatCommand::SaveAndExit => "/exit-v",
        }
    }
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the trimmed input is exactly a command,
/// or `None` if it should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use clix::chat::{parse_command, ChatCommand};
/// assert_eq!(parse_command(" /exit "), Some(ChatCommand::Discard));
/// assert_eq!(parse_command("/exit-v"), Some(ChatCommand::SaveAndExit));
/// assert!(parse_command("/EXIT").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    ChatCommand::ALL
        .into_iter()
        .find(|command| command.literal() == input)
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Commands:
  /exit     Delete saved history and quit
  /exit-v   Save this conversation and quit"#
}
