//! Error types for kernel-host.

use thiserror::Error;

/// Main error type for all host operations.
#[derive(Debug, Error)]
pub enum HostError {
    /// I/O error on one of the transport endpoints.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error while building an envelope.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Protocol violation (completion marker outside a callback, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The stream closed or sent `exit` while a callback was outstanding.
    #[error("Interrupted before callback returned")]
    Interrupted,

    /// A request handler failed to compute its response payload.
    #[error("{message}")]
    Handler {
        /// Error kind reported in the `name` field of the error envelope.
        name: String,
        /// Human readable message.
        message: String,
    },

    /// The engine went away without delivering an exit notification.
    #[error("Host stopped without an exit notification")]
    Stopped,
}

impl HostError {
    /// Create a handler error with a generic `Error` kind.
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler {
            name: "Error".to_string(),
            message: message.into(),
        }
    }

    /// Kind of the error, as written to the `name` field of error envelopes.
    pub fn name(&self) -> &str {
        match self {
            HostError::Io(_) => "IoError",
            HostError::Json(_) => "JsonError",
            HostError::Protocol(_) => "ProtocolError",
            HostError::Interrupted => "InterruptedError",
            HostError::Handler { name, .. } => name,
            HostError::Stopped => "StoppedError",
        }
    }

    /// Whether this error must end the current processing chain.
    ///
    /// Non-fatal errors are request-level failures: they are turned into an
    /// error envelope and the engine moves on to the next request.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, HostError::Json(_) | HostError::Handler { .. })
    }

    /// Render a trace for the `stack` field: the error followed by its sources.
    pub fn trace(&self) -> String {
        let mut trace = format!("{}: {}", self.name(), self);
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            trace.push_str("\n    caused by: ");
            trace.push_str(&cause.to_string());
            source = cause.source();
        }
        trace
    }
}

/// Result type alias using HostError.
pub type Result<T> = std::result::Result<T, HostError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(HostError::Interrupted.is_fatal());
        assert!(HostError::Protocol("x".into()).is_fatal());
        assert!(HostError::Io(std::io::Error::other("boom")).is_fatal());
        assert!(!HostError::handler("bad input").is_fatal());
    }

    #[test]
    fn test_handler_error_name_and_message() {
        let err = HostError::Handler {
            name: "TypeError".into(),
            message: "not a number".into(),
        };
        assert_eq!(err.name(), "TypeError");
        assert_eq!(err.to_string(), "not a number");
        assert_eq!(err.trace(), "TypeError: not a number");
    }

    #[test]
    fn test_trace_includes_source() {
        let err = HostError::Io(std::io::Error::other("pipe gone"));
        assert!(err.trace().starts_with("IoError: I/O error: pipe gone"));
    }
}
