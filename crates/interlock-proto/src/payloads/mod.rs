//! CBOR-encoded protocol messages.
//!
//! The header's opcode selects the payload type, so only the inner struct is
//! serialized (no variant tag). Byte strings inside payloads are opaque to
//! the protocol: keysets, plaintexts and ciphertexts pass through unchanged.

pub mod daead;
pub mod keyset;

use bytes::BufMut;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    Frame, FrameHeader, Opcode,
    errors::{ProtocolError, Result},
};

/// All possible frame payloads.
///
/// # Invariants
///
/// - Each variant maps to exactly one [`Opcode`].
/// - Decoding the encoding of a payload with its own opcode yields an equal
///   value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Liveness probe
    Ping,
    /// Liveness reply
    Pong,
    /// Keyset generation request
    KeysetGenerate(keyset::KeysetGenerate),
    /// Generated keyset
    KeysetGenerated(keyset::KeysetGenerated),
    /// Deterministic encryption request
    DaeadEncrypt(daead::EncryptRequest),
    /// Deterministic encryption result
    DaeadEncrypted(daead::EncryptResponse),
    /// Deterministic decryption request
    DaeadDecrypt(daead::DecryptRequest),
    /// Deterministic decryption result
    DaeadDecrypted(daead::DecryptResponse),
    /// Backend-side failure
    Error(ErrorPayload),
}

/// Error payload for error frames.
///
/// Backends report primitive failures (unsupported key type, failed
/// authentication) through these codes. The verifier distinguishes them from
/// transport failures, which never produce an error frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Error code identifying the failure class.
    pub code: u16,
    /// Human-readable message from the backend.
    pub message: String,
}

impl ErrorPayload {
    /// Backend does not implement the key type or operation.
    pub const UNSUPPORTED: u16 = 0x0001;
    /// Ciphertext or associated data failed to authenticate.
    pub const AUTHENTICATION_FAILED: u16 = 0x0002;
    /// Keyset could not be parsed or used.
    pub const INVALID_KEYSET: u16 = 0x0003;
    /// Request was malformed or of the wrong kind.
    pub const INVALID_REQUEST: u16 = 0x0004;
    /// Backend failed internally.
    pub const INTERNAL: u16 = 0x0005;

    /// Create an unsupported-operation error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self { code: Self::UNSUPPORTED, message: msg.into() }
    }

    /// Create an authentication failure.
    pub fn authentication_failed(msg: impl Into<String>) -> Self {
        Self { code: Self::AUTHENTICATION_FAILED, message: msg.into() }
    }

    /// Create an invalid keyset error.
    pub fn invalid_keyset(msg: impl Into<String>) -> Self {
        Self { code: Self::INVALID_KEYSET, message: msg.into() }
    }

    /// Create an invalid request error.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self { code: Self::INVALID_REQUEST, message: msg.into() }
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self { code: Self::INTERNAL, message: msg.into() }
    }
}

impl Payload {
    /// Opcode corresponding to this payload type.
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        match self {
            Self::Ping => Opcode::Ping,
            Self::Pong => Opcode::Pong,
            Self::KeysetGenerate(_) => Opcode::KeysetGenerate,
            Self::KeysetGenerated(_) => Opcode::KeysetGenerated,
            Self::DaeadEncrypt(_) => Opcode::DaeadEncrypt,
            Self::DaeadEncrypted(_) => Opcode::DaeadEncrypted,
            Self::DaeadDecrypt(_) => Opcode::DaeadDecrypt,
            Self::DaeadDecrypted(_) => Opcode::DaeadDecrypted,
            Self::Error(_) => Opcode::Error,
        }
    }

    /// Whether this payload is an acceptable response to `request`.
    ///
    /// An error payload answers every request.
    #[must_use]
    pub fn answers(&self, request: Opcode) -> bool {
        let opcode = self.opcode();
        opcode == Opcode::Error || request.response() == Some(opcode)
    }

    /// Encode the inner struct into `dst` (no variant tag).
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborEncode` if serialization fails
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        let mut writer = dst.writer();

        match self {
            Self::Ping | Self::Pong => Ok(()),
            Self::KeysetGenerate(inner) => ciborium::ser::into_writer(inner, &mut writer),
            Self::KeysetGenerated(inner) => ciborium::ser::into_writer(inner, &mut writer),
            Self::DaeadEncrypt(inner) => ciborium::ser::into_writer(inner, &mut writer),
            Self::DaeadEncrypted(inner) => ciborium::ser::into_writer(inner, &mut writer),
            Self::DaeadDecrypt(inner) => ciborium::ser::into_writer(inner, &mut writer),
            Self::DaeadDecrypted(inner) => ciborium::ser::into_writer(inner, &mut writer),
            Self::Error(inner) => ciborium::ser::into_writer(inner, &mut writer),
        }
        .map_err(|e| ProtocolError::CborEncode(e.to_string()))
    }

    /// Decode payload bytes for `opcode`.
    ///
    /// The size check runs before the CBOR parser sees the input.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PayloadTooLarge` if bytes exceed the protocol limit
    /// - `ProtocolError::CborDecode` if deserialization fails
    pub fn decode(opcode: Opcode, bytes: &[u8]) -> Result<Self> {
        if bytes.len() > FrameHeader::MAX_PAYLOAD_SIZE as usize {
            return Err(ProtocolError::PayloadTooLarge {
                size: bytes.len(),
                max: FrameHeader::MAX_PAYLOAD_SIZE as usize,
            });
        }

        let payload = match opcode {
            Opcode::Ping => Self::Ping,
            Opcode::Pong => Self::Pong,
            Opcode::KeysetGenerate => Self::KeysetGenerate(cbor(bytes)?),
            Opcode::KeysetGenerated => Self::KeysetGenerated(cbor(bytes)?),
            Opcode::DaeadEncrypt => Self::DaeadEncrypt(cbor(bytes)?),
            Opcode::DaeadEncrypted => Self::DaeadEncrypted(cbor(bytes)?),
            Opcode::DaeadDecrypt => Self::DaeadDecrypt(cbor(bytes)?),
            Opcode::DaeadDecrypted => Self::DaeadDecrypted(cbor(bytes)?),
            Opcode::Error => Self::Error(cbor(bytes)?),
        };

        Ok(payload)
    }

    /// Convert into a frame carrying `request_id`.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborEncode` if serialization fails
    pub fn into_frame(self, request_id: u32) -> Result<Frame> {
        let mut buf = Vec::new();
        self.encode(&mut buf)?;

        let mut header = FrameHeader::new(self.opcode());
        header.set_request_id(request_id);
        Ok(Frame::new(header, buf))
    }

    /// Parse the payload of a frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnknownOpcode` if the header opcode is not recognized
    /// - Any error from [`Payload::decode`]
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let opcode = frame
            .header
            .opcode_enum()
            .ok_or(ProtocolError::UnknownOpcode(frame.header.opcode()))?;
        Self::decode(opcode, &frame.payload)
    }
}

fn cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::CborDecode(e.to_string()))
}
