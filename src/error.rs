//! Error types for the query cache and remote-fetch layer.
//!
//! Every failure that reaches view code has been normalised into [`Error`] by
//! the remote fetch adapter. Views only ask [`Error::feedback`] whether to show
//! the problem inline, as a global notice, or to tear the session down; they
//! never look at transport details.

use std::fmt;

/// Result type for cache and remote operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the query cache.
///
/// `Error` is `Clone` because one in-flight fetch result is handed to every
/// reader that joined the same request.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// No response was received (connection refused, DNS failure, timeout).
    ///
    /// **Recovery:** retried with exponential backoff for queries.
    Network(String),

    /// The collaborator API rejected the request with a 4xx status.
    ///
    /// Never retried: repeating the same request yields the same answer.
    Client {
        status: u16,
        message: String,
        code: Option<String>,
    },

    /// HTTP 429. Retried a bounded number of times.
    RateLimited {
        message: String,
        code: Option<String>,
    },

    /// The collaborator API failed with a 5xx status.
    ///
    /// **Recovery:** retried with exponential backoff for queries.
    Server {
        status: u16,
        message: String,
        code: Option<String>,
    },

    /// HTTP 422. Rendered next to the offending field, never as a global notice.
    Validation {
        message: String,
        code: Option<String>,
    },

    /// HTTP 401 or 403. Fatal to the current session.
    Auth {
        status: u16,
        message: String,
        code: Option<String>,
    },

    /// The envelope arrived with `success: false` on a 2xx response.
    Remote {
        message: String,
        code: Option<String>,
    },

    /// The response body could not be decoded into the expected shape.
    DeserializationError(String),

    /// A request body or filter object could not be encoded.
    SerializationError(String),

    /// Local key-value storage failed (auth token, downloads, dismissed flags).
    StorageError(String),

    /// Invalid configuration (bad base URL, unparsable timeout).
    ConfigError(String),

    /// Cache miss with [`CacheStrategy::Fresh`](crate::CacheStrategy::Fresh).
    CacheMiss,

    /// The in-flight request was cancelled before it resolved.
    Cancelled,

    /// Generic error with custom message.
    Other(String),
}

/// Classification of an [`Error`], independent of the payload it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    Client,
    RateLimited,
    Server,
    Validation,
    Auth,
    Remote,
    Decode,
    Local,
    Cancelled,
}

/// How a view should surface an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    /// Render near the offending form field.
    Inline,
    /// Show a global, user-visible notice.
    Global,
    /// Tear the session down and redirect to sign-in.
    SessionTeardown,
    /// Handled by the caller; nothing to show.
    Silent,
}

impl Error {
    /// Classify an HTTP failure by status code.
    pub fn from_status(status: u16, message: impl Into<String>, code: Option<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Error::Auth {
                status,
                message,
                code,
            },
            422 => Error::Validation { message, code },
            429 => Error::RateLimited { message, code },
            400..=499 => Error::Client {
                status,
                message,
                code,
            },
            _ => Error::Server {
                status,
                message,
                code,
            },
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Client { status, .. }
            | Error::Server { status, .. }
            | Error::Auth { status, .. } => Some(*status),
            Error::RateLimited { .. } => Some(429),
            Error::Validation { .. } => Some(422),
            _ => None,
        }
    }

    /// Server-supplied error code, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            Error::Client { code, .. }
            | Error::RateLimited { code, .. }
            | Error::Server { code, .. }
            | Error::Validation { code, .. }
            | Error::Auth { code, .. }
            | Error::Remote { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Network(_) => ErrorKind::Network,
            Error::Client { .. } => ErrorKind::Client,
            Error::RateLimited { .. } => ErrorKind::RateLimited,
            Error::Server { .. } => ErrorKind::Server,
            Error::Validation { .. } => ErrorKind::Validation,
            Error::Auth { .. } => ErrorKind::Auth,
            Error::Remote { .. } => ErrorKind::Remote,
            Error::DeserializationError(_) | Error::SerializationError(_) => ErrorKind::Decode,
            Error::StorageError(_)
            | Error::ConfigError(_)
            | Error::CacheMiss
            | Error::Other(_) => ErrorKind::Local,
            Error::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Whether a query that failed this way may be attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Network | ErrorKind::Server | ErrorKind::RateLimited
        )
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Auth { .. })
    }

    /// How a view should present this error.
    pub fn feedback(&self) -> Feedback {
        match self.kind() {
            ErrorKind::Auth => Feedback::SessionTeardown,
            ErrorKind::Validation => Feedback::Inline,
            ErrorKind::Cancelled => Feedback::Silent,
            _ => Feedback::Global,
        }
    }

    /// User-facing message without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            Error::Client { message, .. }
            | Error::RateLimited { message, .. }
            | Error::Server { message, .. }
            | Error::Validation { message, .. }
            | Error::Auth { message, .. }
            | Error::Remote { message, .. } => message.clone(),
            Error::Network(msg)
            | Error::DeserializationError(msg)
            | Error::SerializationError(msg)
            | Error::StorageError(msg)
            | Error::ConfigError(msg)
            | Error::Other(msg) => msg.clone(),
            Error::CacheMiss => "Cache miss".to_string(),
            Error::Cancelled => "Request cancelled".to_string(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Network(msg) => write!(f, "Network error: {}", msg),
            Error::Client {
                status, message, ..
            } => write!(f, "Client error ({}): {}", status, message),
            Error::RateLimited { message, .. } => write!(f, "Rate limited: {}", message),
            Error::Server {
                status, message, ..
            } => write!(f, "Server error ({}): {}", status, message),
            Error::Validation { message, .. } => write!(f, "Validation error: {}", message),
            Error::Auth {
                status, message, ..
            } => write!(f, "Auth error ({}): {}", status, message),
            Error::Remote { message, code } => match code {
                Some(code) => write!(f, "Remote error [{}]: {}", code, message),
                None => write!(f, "Remote error: {}", message),
            },
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::StorageError(msg) => write!(f, "Storage error: {}", msg),
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
            Error::CacheMiss => write!(f, "Cache miss"),
            Error::Cancelled => write!(f, "Request cancelled"),
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            Error::StorageError(e.to_string())
        } else if e.is_syntax() || e.is_data() || e.is_eof() {
            Error::DeserializationError(e.to_string())
        } else {
            Error::SerializationError(e.to_string())
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::StorageError(e.to_string())
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Other(e)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Other(e.to_string())
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Error::DeserializationError(e.to_string())
        } else if let Some(status) = e.status() {
            Error::from_status(status.as_u16(), e.to_string(), None)
        } else {
            Error::Network(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Validation {
            message: "quantity must be positive".to_string(),
            code: None,
        };
        assert_eq!(err.to_string(), "Validation error: quantity must be positive");
    }

    #[test]
    fn test_error_from_string() {
        let err: Error = "test error".into();
        assert!(matches!(err, Error::Other(_)));
    }

    #[test]
    fn test_from_status_classification() {
        assert_eq!(Error::from_status(401, "x", None).kind(), ErrorKind::Auth);
        assert_eq!(Error::from_status(403, "x", None).kind(), ErrorKind::Auth);
        assert_eq!(Error::from_status(422, "x", None).kind(), ErrorKind::Validation);
        assert_eq!(Error::from_status(429, "x", None).kind(), ErrorKind::RateLimited);
        assert_eq!(Error::from_status(404, "x", None).kind(), ErrorKind::Client);
        assert_eq!(Error::from_status(503, "x", None).kind(), ErrorKind::Server);
    }

    #[test]
    fn test_status_round_trips_through_classification() {
        for status in [400, 401, 403, 404, 409, 422, 429, 500, 502] {
            assert_eq!(Error::from_status(status, "x", None).status(), Some(status));
        }
        assert_eq!(Error::Network("offline".into()).status(), None);
    }

    #[test]
    fn test_retryable() {
        assert!(Error::Network("offline".into()).is_retryable());
        assert!(Error::from_status(500, "boom", None).is_retryable());
        assert!(Error::from_status(429, "slow down", None).is_retryable());
        assert!(!Error::from_status(400, "bad", None).is_retryable());
        assert!(!Error::from_status(401, "who", None).is_retryable());
        assert!(!Error::Cancelled.is_retryable());
    }

    #[test]
    fn test_feedback() {
        assert_eq!(
            Error::from_status(422, "bad field", None).feedback(),
            Feedback::Inline
        );
        assert_eq!(
            Error::from_status(401, "expired", None).feedback(),
            Feedback::SessionTeardown
        );
        assert_eq!(Error::Network("offline".into()).feedback(), Feedback::Global);
        assert_eq!(Error::Cancelled.feedback(), Feedback::Silent);
    }

    #[test]
    fn test_code_and_message() {
        let err = Error::from_status(409, "already confirmed", Some("CONFLICT".into()));
        assert_eq!(err.code(), Some("CONFLICT"));
        assert_eq!(err.message(), "already confirmed");
    }
}
