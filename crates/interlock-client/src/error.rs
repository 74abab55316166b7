use interlock_core::{BackendId, PrimitiveError};
use interlock_proto::{Opcode, ProtocolError};
use thiserror::Error;

/// Transport errors.
///
/// Every variant means the backend could not be used, never that it
/// rejected a primitive operation. Those arrive as error frames.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Stream error.
    #[error("stream error: {0}")]
    Stream(String),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Exchange did not complete in time.
    #[error("{operation} timed out after {millis}ms")]
    Timeout {
        /// What was being waited for
        operation: &'static str,
        /// Configured timeout
        millis: u128,
    },

    /// Response does not belong to the request.
    #[error("unexpected response to {request:?}: {detail}")]
    UnexpectedResponse {
        /// Request opcode
        request: Opcode,
        /// What did not match
        detail: String,
    },

    /// Backend has no configured address.
    #[error("no address configured for backend {0}")]
    UnknownBackend(BackendId),
}

impl TransportError {
    /// Whether the connection itself is unusable.
    ///
    /// Only these failures evict a cached connection. A malformed or
    /// mismatched response leaves it in place.
    #[must_use]
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Stream(_) | Self::Timeout { .. })
    }
}

impl From<TransportError> for PrimitiveError {
    fn from(err: TransportError) -> Self {
        PrimitiveError::Unavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failures_are_unavailability() {
        let err: PrimitiveError = TransportError::Timeout { operation: "request", millis: 250 }.into();
        assert_eq!(err, PrimitiveError::Unavailable("request timed out after 250ms".into()));
        assert!(err.is_unavailable());
    }

    #[test]
    fn only_link_failures_are_connection_failures() {
        assert!(TransportError::Connection("refused".into()).is_connection_failure());
        assert!(TransportError::Stream("reset".into()).is_connection_failure());
        assert!(TransportError::Timeout { operation: "request", millis: 1 }.is_connection_failure());

        let mismatch = TransportError::UnexpectedResponse {
            request: Opcode::DaeadEncrypt,
            detail: "wrong opcode".into(),
        };
        assert!(!mismatch.is_connection_failure());
        assert!(!TransportError::UnknownBackend("go".into()).is_connection_failure());
        assert!(!TransportError::Protocol(ProtocolError::UnsupportedVersion(9)).is_connection_failure());
    }
}
