//! Interlock wire protocol.
//!
//! The verifier talks to every backend test server over the same narrow
//! protocol: a fixed 16-byte binary header followed by a CBOR payload. One
//! request and its response travel on a single QUIC bidirectional stream.
//!
//! # Layers
//!
//! - [`FrameHeader`]: raw big-endian header, parsed zero-copy
//! - [`Frame`]: header plus undecoded payload bytes
//! - [`Payload`]: typed request/response messages, selected by [`Opcode`]
//!
//! Backends never see each other; the verifier is the only party that
//! compares their outputs.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod errors;
mod frame;
mod header;
mod opcode;
pub mod payloads;

pub use errors::{ProtocolError, Result};
pub use frame::Frame;
pub use header::FrameHeader;
pub use opcode::Opcode;
pub use payloads::{ErrorPayload, Payload};

/// ALPN protocol identifier negotiated by clients and backend servers.
pub const ALPN_PROTOCOL: &[u8] = b"interlock/1";
