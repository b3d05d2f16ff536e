use serde::{Deserialize, Serialize};

use crate::types::{Message, MessageRole};

/// The ordered message list of one chat session.
///
/// Messages can only be appended. The single exception is [`Conversation::truncate`],
/// which the session uses to roll back the user message of a turn that failed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Creates an empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Appends a user message.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Message::new(MessageRole::User, content));
    }

    /// Appends an assistant message.
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Message::new(MessageRole::Assistant, content));
    }

    /// Returns the messages in insertion order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if the conversation holds no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drops every message past `len`.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.messages.truncate(len);
    }
}

impl From<Vec<Message>> for Conversation {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}
