//! Error types for clix.
//!
//! The session loop reports every per-turn failure the same way (through `Display`),
//! so the variants mostly serve logging. [`Error::Abort`] is the exception: it marks a
//! user interrupt, which ends the session instead of being reported.

use std::error;
use std::fmt;
use std::io;
use std::str::Utf8Error;
use std::sync::Arc;

type Cause = Arc<dyn error::Error + Send + Sync>;

/// The main error type for clix.
#[derive(Clone, Debug)]
pub enum Error {
    /// The provider answered with an error status or sent an error object mid-stream.
    Api {
        status_code: u16,
        /// The provider's own classification, e.g. `invalid_request_error`.
        error_type: Option<String>,
        message: String,
    },

    /// No credential for the provider, or the provider rejected it.
    Authentication { message: String },

    /// The credential may not use the requested model.
    Permission { message: String },

    /// Too many requests; `retry_after` is in seconds when the provider says.
    RateLimit {
        message: String,
        retry_after: Option<u64>,
    },

    /// The request did not finish in time.
    Timeout {
        message: String,
        duration: Option<f64>,
    },

    /// The user pressed Ctrl+C.
    Abort { message: String },

    /// Building the HTTP client, connecting, or reading the response body failed.
    Transport {
        message: String,
        cause: Option<Cause>,
    },

    /// Bytes from the provider or the history file were not what we expected.
    Decode {
        message: String,
        cause: Option<Cause>,
    },

    /// Reading or writing a local file failed.
    Io {
        message: String,
        cause: Arc<io::Error>,
    },

    /// A user-supplied value (model id, endpoint) cannot be used.
    Validation {
        message: String,
        param: Option<String>,
    },
}

impl Error {
    pub fn api(status_code: u16, error_type: Option<String>, message: impl Into<String>) -> Self {
        Error::Api {
            status_code,
            error_type,
            message: message.into(),
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Error::Authentication {
            message: message.into(),
        }
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Error::Permission {
            message: message.into(),
        }
    }

    pub fn rate_limit(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        Error::RateLimit {
            message: message.into(),
            retry_after,
        }
    }

    pub fn timeout(message: impl Into<String>, duration: Option<f64>) -> Self {
        Error::Timeout {
            message: message.into(),
            duration,
        }
    }

    pub fn abort(message: impl Into<String>) -> Self {
        Error::Abort {
            message: message.into(),
        }
    }

    /// Creates a transport error, keeping the underlying cause when there is one.
    pub fn transport(
        message: impl Into<String>,
        cause: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Transport {
            message: message.into(),
            cause: cause.map(Arc::from),
        }
    }

    /// Creates a decode error, keeping the underlying cause when there is one.
    pub fn decode(
        message: impl Into<String>,
        cause: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Decode {
            message: message.into(),
            cause: cause.map(Arc::from),
        }
    }

    pub fn io(message: impl Into<String>, cause: io::Error) -> Self {
        Error::Io {
            message: message.into(),
            cause: Arc::new(cause),
        }
    }

    pub fn validation(message: impl Into<String>, param: Option<String>) -> Self {
        Error::Validation {
            message: message.into(),
            param,
        }
    }

    /// Returns true if this error is related to authentication.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Error::Authentication { .. })
    }

    /// Returns true if this error marks a user interrupt.
    pub fn is_abort(&self) -> bool {
        matches!(self, Error::Abort { .. })
    }

    /// Returns true if this error is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }

    /// Returns the HTTP status code associated with this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Api { status_code, .. } => Some(*status_code),
            Error::RateLimit { .. } => Some(429),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Api {
                status_code,
                error_type: Some(error_type),
                message,
            } => write!(f, "{error_type} ({status_code}): {message}"),
            Error::Api {
                status_code,
                error_type: None,
                message,
            } => write!(f, "API error ({status_code}): {message}"),
            Error::Authentication { message } => write!(f, "Authentication error: {message}"),
            Error::Permission { message } => write!(f, "Permission denied: {message}"),
            Error::RateLimit {
                message,
                retry_after: Some(seconds),
            } => write!(f, "Rate limited: {message} (retry in {seconds}s)"),
            Error::RateLimit { message, .. } => write!(f, "Rate limited: {message}"),
            Error::Timeout {
                message,
                duration: Some(seconds),
            } => write!(f, "Timed out after {seconds}s: {message}"),
            Error::Timeout { message, .. } => write!(f, "Timed out: {message}"),
            Error::Abort { message } => write!(f, "Aborted: {message}"),
            Error::Transport { message, .. } => write!(f, "Connection problem: {message}"),
            Error::Decode { message, .. } => write!(f, "Unreadable data: {message}"),
            Error::Io { message, .. } => write!(f, "I/O error: {message}"),
            Error::Validation {
                message,
                param: Some(param),
            } => write!(f, "Invalid {param}: {message}"),
            Error::Validation { message, .. } => write!(f, "Invalid input: {message}"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Transport { cause, .. } | Error::Decode { cause, .. } => cause
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Io { cause, .. } => Some(cause.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err.to_string(), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::decode(format!("JSON error: {err}"), Some(Box::new(err)))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::validation(err.to_string(), Some("endpoint URL".to_string()))
    }
}

impl From<Utf8Error> for Error {
    fn from(err: Utf8Error) -> Self {
        Error::decode(format!("UTF-8 error: {err}"), Some(Box::new(err)))
    }
}

/// A specialized Result type for clix operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display() {
        let err = Error::api(500, None, "boom");
        assert_eq!(err.to_string(), "API error (500): boom");
        assert_eq!(err.status_code(), Some(500));

        let err = Error::api(400, Some("invalid_request_error".to_string()), "bad model");
        assert_eq!(err.to_string(), "invalid_request_error (400): bad model");
    }

    #[test]
    fn rate_limit_carries_status() {
        let err = Error::rate_limit("slow down", Some(7));
        assert_eq!(err.status_code(), Some(429));
        assert_eq!(err.to_string(), "Rate limited: slow down (retry in 7s)");
    }

    #[test]
    fn abort_is_distinguishable() {
        let err = Error::abort("interrupted by user");
        assert!(err.is_abort());
        assert!(!Error::authentication("nope").is_abort());
    }

    #[test]
    fn io_error_keeps_source() {
        let err: Error = io::Error::new(io::ErrorKind::PermissionDenied, "denied").into();
        assert!(err.to_string().contains("denied"));
        assert!(error::Error::source(&err).is_some());
    }

    #[test]
    fn json_error_converts_to_decode() {
        let err: Error = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, Error::Decode { .. }));
        assert!(error::Error::source(&err).is_some());
    }

    #[test]
    fn bad_url_is_a_validation_error() {
        let err: Error = url::Url::parse("not a url").unwrap_err().into();
        assert!(err.is_validation());
        assert!(err.to_string().starts_with("Invalid endpoint URL:"));
    }
}
