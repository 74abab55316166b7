//! Server error types.

use std::fmt;

use interlock_proto::ProtocolError;

/// Errors that can occur in the server.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error (invalid bind address, unreadable TLS files, etc.).
    ///
    /// Fatal: prevents server startup.
    Config(String),

    /// Transport/network error (accept failure, stream I/O, etc.).
    ///
    /// Fatal for the affected connection or stream only.
    Transport(String),

    /// Protocol error (malformed frame from the verifier).
    ///
    /// Fatal for that stream. The server keeps serving others.
    Protocol(ProtocolError),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Protocol(err) => write!(f, "protocol error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Protocol(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ProtocolError> for ServerError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
