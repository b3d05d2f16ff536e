//! On-disk persistence of the conversation.
//!
//! The history is a single JSON array of `{"role", "content"}` objects. A missing or
//! unreadable file is treated as an empty history; writes replace the file wholesale.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde_json::{from_reader, to_writer};

use crate::error::{Error, Result};
use crate::observability::{HISTORY_CORRUPT, HISTORY_DELETES, HISTORY_LOADS, HISTORY_SAVES};
use crate::types::Conversation;

/// File name of the history, relative to the home directory.
pub const HISTORY_FILE_NAME: &str = ".clix_chat_history.json";

/// Reads and writes the persisted conversation at a fixed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    /// Creates a store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the default history location, `~/.clix_chat_history.json`.
    ///
    /// Falls back to the current directory when no home directory can be determined.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(HISTORY_FILE_NAME)
    }

    /// Returns the path of the history file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if a history file currently exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Loads the persisted conversation.
    ///
    /// Never fails: a missing file, an unreadable file, and content that does not
    /// decode as a message array all yield an empty conversation.
    pub fn load(&self) -> Conversation {
        HISTORY_LOADS.click();
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Conversation::new(),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "cannot open history");
                return Conversation::new();
            }
        };
        match from_reader::<_, Conversation>(BufReader::new(file)) {
            Ok(conversation) => {
                tracing::debug!(
                    path = %self.path.display(),
                    messages = conversation.len(),
                    "loaded history"
                );
                conversation
            }
            Err(err) => {
                HISTORY_CORRUPT.click();
                tracing::warn!(path = %self.path.display(), error = %err, "ignoring corrupt history");
                Conversation::new()
            }
        }
    }

    /// Writes `conversation`, replacing any existing file content.
    pub fn save(&self, conversation: &Conversation) -> Result<()> {
        HISTORY_SAVES.click();
        let file = File::create(&self.path)
            .map_err(|err| Error::io("failed to create history file", err))?;
        let mut writer = BufWriter::new(file);
        to_writer(&mut writer, conversation)
            .map_err(|err| Error::io("failed to write history file", err.into()))?;
        writer
            .flush()
            .map_err(|err| Error::io("failed to write history file", err))?;
        tracing::debug!(
            path = %self.path.display(),
            messages = conversation.len(),
            "saved history"
        );
        Ok(())
    }

    /// Removes the history file. Does nothing if it does not exist.
    pub fn delete(&self) -> Result<()> {
        HISTORY_DELETES.click();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::io("failed to delete history file", err)),
        }
    }
}
