//! Error types for conduit
//!
//! Every failure surfaced by the transport, connection and supervisor layers is
//! a [`ConduitError`]. Errors are `Clone` because a single channel-wide failure
//! (worker exit, transport error, disposal) is delivered to every pending call.

use crate::process::ProcessExit;
use serde_json::Value;
use thiserror::Error;

/// Result type alias for conduit operations
pub type ConduitResult<T> = Result<T, ConduitError>;

/// Unified error trait implemented by conduit errors.
///
/// - error_code(): Unique code for programmatic error identification
/// - message(): Human-readable error message
/// - context(): Optional additional context
pub trait UnifiedError: std::error::Error + Send + Sync {
    /// Get the error code for programmatic handling
    fn error_code(&self) -> &str;

    /// Get the human-readable error message
    fn message(&self) -> &str;

    /// Get optional context about the error
    fn context(&self) -> Option<&str> {
        None
    }

    /// Check if this error is retryable
    fn is_retryable(&self) -> bool {
        false
    }
}

/// Errors raised while supervising a worker and talking to it
#[derive(Debug, Error, Clone)]
pub enum ConduitError {
    /// The process factory failed to create the worker
    #[error("Spawn error: {message}")]
    Spawn {
        message: String,
        context: Option<String>,
    },

    /// The byte stream could not be read or written
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        context: Option<String>,
    },

    /// The worker exited while the supervisor was not disposed
    #[error("Worker exited unexpectedly: {exit}")]
    UnexpectedExit { exit: ProcessExit },

    /// The supervisor (or connection) was disposed by its owner
    #[error("Connection disposed")]
    Disposed,

    /// The channel to the worker went away while the call was pending
    #[error("Connection closed: {reason}")]
    ConnectionClosed { reason: String },

    /// A message could not be framed, parsed, or correlated
    #[error("Protocol violation: {message}")]
    ProtocolViolation {
        message: String,
        context: Option<String>,
    },

    /// The worker answered with an error response
    #[error("Remote error {code}: {message}")]
    Remote {
        code: i32,
        message: String,
        data: Option<Value>,
    },

    /// No service with this name is registered
    #[error("Service not found: {service}")]
    ServiceNotFound { service: String },

    /// The service has no method with this name
    #[error("Method not found: {service}/{method}")]
    MethodNotFound { service: String, method: String },

    /// The call does not match the method's registered signature
    #[error("Invalid call: {message}")]
    InvalidCall { message: String },

    /// Serialization error
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        context: Option<String>,
    },
}

impl ConduitError {
    /// Create a new Spawn error
    pub fn spawn(message: impl Into<String>) -> Self {
        Self::Spawn {
            message: message.into(),
            context: None,
        }
    }

    /// Create a new Transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            context: None,
        }
    }

    /// Create a new ConnectionClosed error
    pub fn connection_closed(reason: impl Into<String>) -> Self {
        Self::ConnectionClosed {
            reason: reason.into(),
        }
    }

    /// Create a new ProtocolViolation error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            message: message.into(),
            context: None,
        }
    }

    /// Create a new Remote error
    pub fn remote(code: i32, message: impl Into<String>) -> Self {
        Self::Remote {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create a new ServiceNotFound error
    pub fn service_not_found(service: impl Into<String>) -> Self {
        Self::ServiceNotFound {
            service: service.into(),
        }
    }

    /// Create a new MethodNotFound error
    pub fn method_not_found(service: impl Into<String>, method: impl Into<String>) -> Self {
        Self::MethodNotFound {
            service: service.into(),
            method: method.into(),
        }
    }

    /// Create a new InvalidCall error
    pub fn invalid_call(message: impl Into<String>) -> Self {
        Self::InvalidCall {
            message: message.into(),
        }
    }

    /// Create a new Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            context: None,
        }
    }

    /// Add context to errors that carry it; other variants are returned unchanged
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let ctx = Some(context.into());
        match &mut self {
            Self::Spawn { context: c, .. } => *c = ctx,
            Self::Transport { context: c, .. } => *c = ctx,
            Self::ProtocolViolation { context: c, .. } => *c = ctx,
            Self::Config { context: c, .. } => *c = ctx,
            Self::UnexpectedExit { .. }
            | Self::Disposed
            | Self::ConnectionClosed { .. }
            | Self::Remote { .. }
            | Self::ServiceNotFound { .. }
            | Self::MethodNotFound { .. }
            | Self::InvalidCall { .. }
            | Self::Serialization { .. } => {}
        }
        self
    }

    /// True for the synthetic failures delivered when the channel is torn down
    pub fn is_channel_closed(&self) -> bool {
        matches!(self, Self::Disposed | Self::ConnectionClosed { .. })
    }

    /// Protocol violations are local to one message; the stream stays usable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ProtocolViolation { .. })
    }
}

impl UnifiedError for ConduitError {
    fn error_code(&self) -> &str {
        match self {
            Self::Spawn { .. } => "CONDUIT_SPAWN",
            Self::Transport { .. } => "CONDUIT_TRANSPORT",
            Self::UnexpectedExit { .. } => "CONDUIT_UNEXPECTED_EXIT",
            Self::Disposed => "CONDUIT_DISPOSED",
            Self::ConnectionClosed { .. } => "CONDUIT_CONNECTION_CLOSED",
            Self::ProtocolViolation { .. } => "CONDUIT_PROTOCOL",
            Self::Remote { .. } => "CONDUIT_REMOTE",
            Self::ServiceNotFound { .. } => "CONDUIT_SERVICE_NOT_FOUND",
            Self::MethodNotFound { .. } => "CONDUIT_METHOD_NOT_FOUND",
            Self::InvalidCall { .. } => "CONDUIT_INVALID_CALL",
            Self::Serialization { .. } => "CONDUIT_SERIALIZATION",
            Self::Config { .. } => "CONDUIT_CONFIG",
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::Spawn { message, .. } => message,
            Self::Transport { message, .. } => message,
            Self::UnexpectedExit { .. } => "Worker exited unexpectedly",
            Self::Disposed => "Connection disposed",
            Self::ConnectionClosed { reason } => reason,
            Self::ProtocolViolation { message, .. } => message,
            Self::Remote { message, .. } => message,
            Self::ServiceNotFound { service } => service,
            Self::MethodNotFound { method, .. } => method,
            Self::InvalidCall { message } => message,
            Self::Serialization { message } => message,
            Self::Config { message, .. } => message,
        }
    }

    fn context(&self) -> Option<&str> {
        match self {
            Self::Spawn { context, .. } => context.as_deref(),
            Self::Transport { context, .. } => context.as_deref(),
            Self::ProtocolViolation { context, .. } => context.as_deref(),
            Self::Config { context, .. } => context.as_deref(),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Spawn { .. }
                | Self::Transport { .. }
                | Self::ConnectionClosed { .. }
                | Self::UnexpectedExit { .. }
        )
    }
}

impl From<serde_json::Error> for ConduitError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for ConduitError {
    fn from(err: std::io::Error) -> Self {
        Self::transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ConduitError::spawn("boom").error_code(), "CONDUIT_SPAWN");
        assert_eq!(ConduitError::Disposed.error_code(), "CONDUIT_DISPOSED");
        assert_eq!(
            ConduitError::method_not_found("Hover", "hover").to_string(),
            "Method not found: Hover/hover"
        );
    }

    #[test]
    fn test_with_context() {
        let err = ConduitError::transport("broken pipe").with_context("writing request 4");
        assert_eq!(err.context(), Some("writing request 4"));

        // Variants without a context slot are left untouched
        let err = ConduitError::Disposed.with_context("ignored");
        assert_eq!(err.context(), None);
    }

    #[test]
    fn test_classification() {
        assert!(ConduitError::Disposed.is_channel_closed());
        assert!(ConduitError::connection_closed("eof").is_channel_closed());
        assert!(!ConduitError::remote(-1, "nope").is_channel_closed());

        assert!(ConduitError::protocol("bad json").is_recoverable());
        assert!(!ConduitError::transport("eof").is_recoverable());

        assert!(ConduitError::spawn("enoent").is_retryable());
        assert!(!ConduitError::Disposed.is_retryable());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: ConduitError = io.into();
        assert!(matches!(err, ConduitError::Transport { .. }));
    }
}
