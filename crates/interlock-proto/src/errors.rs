//! Protocol-level errors.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while parsing or building frames and payloads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer shorter than a header.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Minimum number of bytes required
        expected: usize,
        /// Bytes actually available
        actual: usize,
    },

    /// Payload shorter than the header claims.
    #[error("frame truncated: header claims {expected} payload bytes, got {actual}")]
    FrameTruncated {
        /// Payload size claimed by the header
        expected: usize,
        /// Payload bytes actually available
        actual: usize,
    },

    /// Magic number mismatch.
    #[error("invalid magic number")]
    InvalidMagic,

    /// Unknown protocol version.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Reserved header byte was not zero.
    #[error("reserved header byte set: {0:#04x}")]
    ReservedByteSet(u8),

    /// Payload exceeds the protocol limit.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Offending payload size
        size: usize,
        /// Protocol maximum
        max: usize,
    },

    /// Opcode not known to this protocol version.
    #[error("unknown opcode: {0:#06x}")]
    UnknownOpcode(u16),

    /// CBOR serialization failed.
    #[error("CBOR encode failed: {0}")]
    CborEncode(String),

    /// CBOR deserialization failed.
    #[error("CBOR decode failed: {0}")]
    CborDecode(String),
}
