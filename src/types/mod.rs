// Public modules
pub mod chat_completion;
pub mod conversation;
pub mod message;
pub mod model;

// Re-exports
pub use chat_completion::{
    ChatCompletionChunk, ChatCompletionRequest, ChunkChoice, ChunkDelta, ChunkError,
};
pub use conversation::Conversation;
pub use message::{Message, MessageRole};
pub use model::{DEFAULT_MODEL, ModelId, Provider};
