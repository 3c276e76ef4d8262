//! Error types for RackTables API operations.
//!
//! Errors are split by where they happen: the transport (the request never
//! got an answer), the server (it answered with a non-success status) and the
//! decoder (it answered with something we could not read).

/// Result type alias for RackTables operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Maximum number of body bytes kept in a [`Error::Remote`] message.
const MAX_MESSAGE_LEN: usize = 200;

/// Categories of API errors for user feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The request could not be delivered.
    Network,
    /// The server rejected the request.
    Rejected,
    /// The server answered with an unreadable body.
    Format,
}

impl ErrorCategory {
    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check the API URL and that the RackTables host is reachable",
            Self::Rejected => "Check the credentials and that the referenced ids exist",
            Self::Format => "Check that the API URL points at RackTables api.php",
        }
    }
}

/// Errors that can occur while talking to RackTables.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The HTTP request failed before a response was received.
    #[error("HTTP request failed: {message}")]
    Http {
        /// Error message.
        message: String,
    },

    /// The server answered with a non-success status.
    #[error("{method} returned HTTP {status}: {message}")]
    Remote {
        /// API method that was called.
        method: &'static str,
        /// HTTP status code.
        status: u16,
        /// Excerpt of the response body.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("invalid response from {method}: {message}")]
    Parse {
        /// API method that was called.
        method: &'static str,
        /// Decoder message.
        message: String,
    },
}

impl Error {
    /// Create a remote error, keeping only the head of the body.
    pub fn remote(method: &'static str, status: u16, body: &str) -> Self {
        let trimmed = body.trim();
        let message = match trimmed.char_indices().nth(MAX_MESSAGE_LEN) {
            Some((cut, _)) => format!("{}...", &trimmed[..cut]),
            None => trimmed.to_string(),
        };
        Self::Remote {
            method,
            status,
            message,
        }
    }

    /// Create a decode error.
    pub fn parse(method: &'static str, message: impl Into<String>) -> Self {
        Self::Parse {
            method,
            message: message.into(),
        }
    }

    /// HTTP status carried by the error, if the server answered.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the server refused to create something because it already exists.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        match self {
            Self::Remote { message, .. } => {
                let lower = message.to_lowercase();
                lower.contains("already exists") || lower.contains("duplicate")
            }
            _ => false,
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Http { .. } => ErrorCategory::Network,
            Self::Remote { .. } => ErrorCategory::Rejected,
            Self::Parse { .. } => ErrorCategory::Format,
        }
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        Self::Http {
            message: err.to_string(),
        }
    }
}
