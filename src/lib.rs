// Public modules
pub mod chat;
pub mod client;
pub mod credentials;
pub mod error;
pub mod history;
pub mod types;

mod observability;
mod sse;

// Re-exports
pub use client::{CompletionClient, FragmentStream, Gateway};
pub use credentials::Credentials;
pub use error::{Error, Result};
pub use history::HistoryStore;
pub use observability::register_biometrics;
pub use sse::process_sse;
pub use types::*;
