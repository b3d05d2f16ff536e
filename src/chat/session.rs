//! Core chat session management.
//!
//! This module provides the `ChatSession` struct which owns the conversation,
//! drives one streamed completion per turn, and persists or discards the history
//! when the session ends.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::chat::config::ChatConfig;
use crate::chat::render::{Renderer, render_stream};
use crate::client::{CompletionClient, FragmentStream};
use crate::error::{Error, Result};
use crate::history::HistoryStore;
use crate::observability::{SESSION_TURN_FAILURES, SESSION_TURNS};
use crate::types::Conversation;

/// How a single chat turn ended.
#[derive(Debug)]
pub enum TurnOutcome {
    /// The reply streamed to completion and was appended to the conversation.
    Completed(String),
    /// The request or stream failed; the conversation is unchanged.
    Failed(Error),
    /// The user interrupted the turn; the conversation is unchanged.
    Interrupted,
}

impl TurnOutcome {
    /// Returns true if the turn produced a reply.
    pub fn is_completed(&self) -> bool {
        matches!(self, TurnOutcome::Completed(_))
    }
}

/// A chat session that manages conversation state and API interactions.
pub struct ChatSession<C: CompletionClient> {
    client: C,
    config: ChatConfig,
    store: HistoryStore,
    conversation: Conversation,
    restored: bool,
}

impl<C: CompletionClient> ChatSession<C> {
    /// Creates a session, loading any history persisted at the configured path.
    pub fn new(client: C, config: ChatConfig) -> Self {
        let store = HistoryStore::new(config.history_path.clone());
        let conversation = store.load();
        let restored = !conversation.is_empty();
        if restored {
            tracing::info!(
                messages = conversation.len(),
                path = %store.path().display(),
                "restored conversation"
            );
        }
        Self {
            client,
            config,
            store,
            conversation,
            restored,
        }
    }

    /// Returns the conversation so far.
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Returns true if the session started from a non-empty persisted history.
    pub fn restored(&self) -> bool {
        self.restored
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Returns the model used for responses.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Sends a user message and streams the response.
    ///
    /// This method:
    /// 1. Adds the user message to history
    /// 2. Requests a streaming completion over the whole conversation
    /// 3. Renders response fragments as they arrive
    /// 4. Adds the complete assistant response to history
    ///
    /// If any step fails or is interrupted, the user message is rolled back so the
    /// conversation is exactly what it was before the call.
    pub async fn take_turn(
        &mut self,
        input: &str,
        renderer: &mut dyn Renderer,
        interrupted: &AtomicBool,
    ) -> TurnOutcome {
        SESSION_TURNS.click();
        let previous_len = self.conversation.len();
        self.conversation.push_user(input);

        let result = match self.request(interrupted).await {
            Ok(fragments) => {
                render_stream(fragments, renderer, interrupted, self.config.redraw_interval).await
            }
            Err(err) => Err(err),
        };

        match result {
            Ok(text) => {
                self.conversation.push_assistant(text.clone());
                TurnOutcome::Completed(text)
            }
            Err(err) => {
                self.conversation.truncate(previous_len);
                if err.is_abort() {
                    tracing::info!("turn interrupted");
                    TurnOutcome::Interrupted
                } else {
                    SESSION_TURN_FAILURES.click();
                    tracing::warn!(error = %err, model = %self.config.model, "turn failed");
                    TurnOutcome::Failed(err)
                }
            }
        }
    }

    /// Opens the completion stream, giving up early if the user interrupts.
    async fn request(&self, interrupted: &AtomicBool) -> Result<FragmentStream> {
        let mut request = self
            .client
            .stream_completion(&self.config.model, self.conversation.messages());
        let mut ticker = tokio::time::interval(self.config.redraw_interval);
        loop {
            tokio::select! {
                result = &mut request => return result,
                _ = ticker.tick() => {
                    if interrupted.load(Ordering::Relaxed) {
                        return Err(Error::abort("interrupted by user"));
                    }
                }
            }
        }
    }

    /// Deletes the persisted history. The in-memory conversation is left as is.
    pub fn discard(&self) -> Result<()> {
        self.store.delete()
    }

    /// Persists the whole conversation, replacing any previous history.
    pub fn save(&self) -> Result<()> {
        self.store.save(&self.conversation)
    }
}
