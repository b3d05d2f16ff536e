use serde::{Deserialize, Serialize};

/// Role of a message within a conversation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User role.
    User,

    /// Assistant role.
    Assistant,
}

impl MessageRole {
    /// Returns the wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single role/content record.
///
/// This is both the persisted history record and the element of the `messages` array
/// sent to the completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// The role of the message.
    pub role: MessageRole,

    /// The text content of the message.
    pub content: String,
}

impl Message {
    /// Create a new `Message` with the given role and content.
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a new user `Message`.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create a new assistant `Message`.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_serialization() {
        let message = Message::user("hi");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json, json!({"role": "user", "content": "hi"}));
    }

    #[test]
    fn message_deserialization() {
        let message: Message =
            serde_json::from_value(json!({"role": "assistant", "content": "Hello!"})).unwrap();
        assert_eq!(message, Message::assistant("Hello!"));
    }

    #[test]
    fn unknown_role_is_rejected() {
        let result: Result<Message, _> =
            serde_json::from_value(json!({"role": "system", "content": "x"}));
        assert!(result.is_err());
    }
}
