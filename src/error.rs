//! Error types for MangaClip.
//!
//! Uses `thiserror` for structured error definitions. Extraction has no
//! error type on purpose: a field that cannot be found degrades to its
//! default instead of failing.

use thiserror::Error;

/// Errors raised while loading a page to extract from.
#[derive(Error, Debug)]
pub enum PageError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Failed to read a saved HTML snapshot
    #[error("Failed to read page: {0}")]
    ReadError(#[from] std::io::Error),

    /// URL parsing or validation failed
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Errors raised by the durable extension store and the handoff slot.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to read or write the store file
    #[error("Failed to access store: {0}")]
    Io(#[from] std::io::Error),

    /// Store file holds invalid JSON
    #[error("Failed to parse store: {0}")]
    Json(#[from] serde_json::Error),

    /// A context tried to write a key it does not own
    #[error("{context} context may not write '{key}'")]
    WriteDenied {
        key: &'static str,
        context: &'static str,
    },
}

/// Error type for configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse config file
    #[error("Failed to parse config: {0}")]
    ParseError(String),

    /// Invalid configuration value
    #[error("Invalid config value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Config directory not found
    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Errors raised when sending a record to the creation endpoint.
#[derive(Error, Debug)]
pub enum SubmissionError {
    /// Network fault before a response arrived
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-2xx status
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// Server base URL could not be combined with the endpoint path
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),
}

impl SubmissionError {
    /// Returns the HTTP status for server rejections.
    pub fn status(&self) -> Option<u16> {
        match self {
            SubmissionError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors raised by the sign-in handshake.
#[derive(Error, Debug)]
pub enum AuthError {
    /// No browser opener could be found
    #[error("No browser command found; set auth.browser_command in the config")]
    NoBrowser,

    /// The browser opener failed to start
    #[error("Failed to open sign-in page: {0}")]
    LaunchFailed(String),

    /// Reading or writing the token failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The coordinator went away while waiting for a token
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Errors raised by cross-context message passing.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The receiving context has shut down
    #[error("{0} context is not running")]
    ContextClosed(&'static str),

    /// The receiving context dropped the request without replying
    #[error("No reply to '{0}'")]
    NoReply(&'static str),

    /// The reply had an unexpected shape
    #[error("Unexpected reply to '{0}'")]
    UnexpectedReply(&'static str),
}

/// Errors raised by the submission state machine.
#[derive(Error, Debug)]
pub enum FlowError {
    /// The requested transition is not part of the flow
    #[error("Cannot move from {from} to {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
}

/// Errors raised while reviewing and submitting a record from the popup.
#[derive(Error, Debug)]
pub enum ReviewError {
    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Shown to the user as the server worded it
    #[error(transparent)]
    Submission(#[from] SubmissionError),
}

/// Result type alias using anyhow for application-level error handling.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_message_is_verbatim() {
        let err = SubmissionError::Rejected {
            status: 400,
            message: "Title and current chapter are required".to_string(),
        };
        assert_eq!(err.to_string(), "Title and current chapter are required");
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn test_review_error_keeps_server_wording() {
        let err: ReviewError = SubmissionError::Rejected {
            status: 401,
            message: "Unauthorized".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Unauthorized");
    }

    #[test]
    fn test_write_denied_display() {
        let err = StoreError::WriteDenied {
            key: "thelibAuthToken",
            context: "content",
        };
        assert_eq!(
            err.to_string(),
            "content context may not write 'thelibAuthToken'"
        );
    }
}
