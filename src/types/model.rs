use std::fmt;
use std::str::FromStr;

use crate::Error;

/// The default model used when `--model` is not given.
pub const DEFAULT_MODEL: &str = "groq/llama-3.1-8b-instant";

/// A completion provider reachable through an OpenAI-compatible endpoint.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Provider {
    /// Groq.
    Groq,

    /// Google Gemini.
    Gemini,
}

impl Provider {
    /// All recognized providers.
    pub const ALL: [Provider; 2] = [Provider::Groq, Provider::Gemini];

    /// The prefix used in model identifiers, e.g. `groq` in `groq/llama-3.1-8b-instant`.
    pub fn prefix(&self) -> &'static str {
        match self {
            Provider::Groq => "groq",
            Provider::Gemini => "gemini",
        }
    }

    /// The environment variable holding this provider's API key.
    pub fn credential_var(&self) -> &'static str {
        match self {
            Provider::Groq => "GROQ_API_KEY",
            Provider::Gemini => "GEMINI_API_KEY",
        }
    }

    /// Base URL of the provider's OpenAI-compatible API, with a trailing slash.
    pub fn base_url(&self) -> &'static str {
        match self {
            Provider::Groq => "https://api.groq.com/openai/v1/",
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai/",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::ALL
            .into_iter()
            .find(|p| p.prefix().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                Error::validation(
                    format!("unknown provider '{s}' (expected one of: groq, gemini)"),
                    Some("model".to_string()),
                )
            })
    }
}

/// A `<provider>/<model>` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelId {
    /// The provider serving the model.
    pub provider: Provider,

    /// The provider-side model name sent in requests.
    pub name: String,
}

impl ModelId {
    /// Creates a model identifier from its parts.
    pub fn new(provider: Provider, name: impl Into<String>) -> Self {
        Self {
            provider,
            name: name.into(),
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.name)
    }
}

impl FromStr for ModelId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let Some((prefix, name)) = s.split_once('/') else {
            return Err(Error::validation(
                format!("model '{s}' has no provider prefix (expected e.g. {DEFAULT_MODEL})"),
                Some("model".to_string()),
            ));
        };
        if name.is_empty() {
            return Err(Error::validation(
                format!("model '{s}' is missing a model name"),
                Some("model".to_string()),
            ));
        }
        Ok(ModelId::new(prefix.parse()?, name))
    }
}
