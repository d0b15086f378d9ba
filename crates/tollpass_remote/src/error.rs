//! Error types for remote calls.

use std::fmt;
use thiserror::Error;

/// Result type for remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors returned by a [`RemoteLink`](crate::RemoteLink).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The remote peer rejected the credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The call did not produce a usable result.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Why a remote call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// No response within the call timeout.
    Timeout,
    /// The peer answered with a non-success HTTP status.
    HttpStatus(u16),
    /// The response could not be decoded.
    Malformed,
    /// The connection could not be established or broke.
    Connect,
    /// The peer returned an RPC error object.
    Fault(i64),
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::Timeout => f.write_str("timeout"),
            TransportErrorKind::HttpStatus(code) => write!(f, "http status {code}"),
            TransportErrorKind::Malformed => f.write_str("malformed response"),
            TransportErrorKind::Connect => f.write_str("connection failed"),
            TransportErrorKind::Fault(code) => write!(f, "remote fault {code}"),
        }
    }
}

/// A failed remote call, with the message of the underlying failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct TransportError {
    /// Failure category.
    pub kind: TransportErrorKind,
    /// Original diagnostic message.
    pub message: String,
}

impl TransportError {
    /// Creates an error of the given kind.
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// A call that ran out of time.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    /// A non-success HTTP status.
    pub fn http_status(code: u16, message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::HttpStatus(code), message)
    }

    /// An undecodable response.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Malformed, message)
    }

    /// A connection failure.
    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connect, message)
    }

    /// An RPC error object returned by the peer.
    pub fn fault(code: i64, message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Fault(code), message)
    }

    /// Returns true for timeouts.
    pub fn is_timeout(&self) -> bool {
        self.kind == TransportErrorKind::Timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_keeps_message() {
        let err = TransportError::timeout("no answer after 10s");
        assert_eq!(err.to_string(), "timeout: no answer after 10s");
        assert!(err.is_timeout());

        let err = TransportError::http_status(502, "bad gateway");
        assert_eq!(err.to_string(), "http status 502: bad gateway");

        let err: RemoteError = TransportError::fault(200, "access denied").into();
        assert_eq!(
            err.to_string(),
            "transport error: remote fault 200: access denied"
        );
    }

    #[test]
    fn auth_is_not_transport() {
        let err = RemoteError::Auth("login rejected".into());
        assert!(!matches!(err, RemoteError::Transport(_)));
    }
}
