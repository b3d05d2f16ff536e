//! Provider credentials sourced once from the environment.

use std::env;
use std::fmt;

use crate::types::Provider;

/// API keys for the recognized providers.
///
/// Built once at startup and handed to the completion client; nothing else in the
/// crate reads the environment for credentials.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    groq: Option<String>,
    gemini: Option<String>,
}

impl Credentials {
    /// Loads a `.env` file from the working directory or one of its parents, then
    /// reads the keys from the process environment.
    ///
    /// Variables already set in the environment take precedence over the file.
    pub fn load() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env file"),
            Err(err) if err.not_found() => {}
            Err(err) => tracing::warn!(error = %err, "ignoring unreadable .env file"),
        }
        Self::from_env()
    }

    /// Reads `GROQ_API_KEY` and `GEMINI_API_KEY` from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds credentials from an arbitrary variable lookup.
    ///
    /// A variable counts as present when it is set to a non-empty value; the value
    /// itself is not validated.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |provider: Provider| {
            lookup(provider.credential_var()).filter(|value| !value.is_empty())
        };
        Self {
            groq: read(Provider::Groq),
            gemini: read(Provider::Gemini),
        }
    }

    /// Sets the key for a provider.
    pub fn with_key(mut self, provider: Provider, key: impl Into<String>) -> Self {
        let key = Some(key.into());
        match provider {
            Provider::Groq => self.groq = key,
            Provider::Gemini => self.gemini = key,
        }
        self
    }

    /// Returns the key for a provider, if present.
    pub fn key(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Groq => self.groq.as_deref(),
            Provider::Gemini => self.gemini.as_deref(),
        }
    }

    /// Returns true if no recognized credential is present.
    pub fn is_empty(&self) -> bool {
        Provider::ALL.iter().all(|p| self.key(*p).is_none())
    }

    /// Providers with a key present.
    pub fn available(&self) -> Vec<Provider> {
        Provider::ALL
            .into_iter()
            .filter(|p| self.key(*p).is_some())
            .collect()
    }
}

// Keys never end up in logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("groq", &self.groq.as_ref().map(|_| "<redacted>"))
            .field("gemini", &self.gemini.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
