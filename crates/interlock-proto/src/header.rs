//! Frame header with zero-copy parsing.
//!
//! The header is a fixed 16-byte big-endian structure. It carries just enough
//! to route a response back to the request that caused it and to bound the
//! payload read before any CBOR is touched.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{
    Opcode,
    errors::{ProtocolError, Result},
};

/// Fixed 16-byte frame header (big endian).
///
/// ```text
/// 0      4   5   6      8          12         16
/// | magic| v | r | opcode| request_id| payload_size|
/// ```
///
/// # Invariants
///
/// - A header returned by [`FrameHeader::from_bytes`] has the right magic,
///   version, a zero reserved byte, and `payload_size <= MAX_PAYLOAD_SIZE`.
/// - Every 16-byte pattern is a valid in-memory value, so casting untrusted
///   bytes is safe; validation happens after the cast.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct FrameHeader {
    magic: [u8; 4],
    version: u8,
    reserved: u8,
    pub(crate) opcode: [u8; 2],
    request_id: [u8; 4],
    pub(crate) payload_size: [u8; 4],
}

impl FrameHeader {
    /// Size of the serialized header.
    pub const SIZE: usize = 16;

    /// Magic number: "ILCK" in ASCII.
    pub const MAGIC: u32 = 0x494C_434B;

    /// Current protocol version.
    pub const VERSION: u8 = 0x01;

    /// Maximum payload size (16 MB).
    pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

    /// Create a header for `opcode` with a zero request id and empty payload.
    #[must_use]
    pub fn new(opcode: Opcode) -> Self {
        Self {
            magic: Self::MAGIC.to_be_bytes(),
            version: Self::VERSION,
            reserved: 0,
            opcode: opcode.to_u16().to_be_bytes(),
            request_id: [0; 4],
            payload_size: [0; 4],
        }
    }

    /// Parse and validate a header from the front of `bytes`.
    ///
    /// # Errors
    ///
    /// - `FrameTooShort` if fewer than [`Self::SIZE`] bytes are available
    /// - `InvalidMagic`, `UnsupportedVersion`, `ReservedByteSet`
    /// - `PayloadTooLarge` if the claimed payload exceeds the limit
    ///
    /// Cheap checks run first so garbage input fails fast.
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        let (header, _) = Self::ref_from_prefix(bytes).map_err(|_| {
            ProtocolError::FrameTooShort { expected: Self::SIZE, actual: bytes.len() }
        })?;

        if u32::from_be_bytes(header.magic) != Self::MAGIC {
            return Err(ProtocolError::InvalidMagic);
        }

        if header.version != Self::VERSION {
            return Err(ProtocolError::UnsupportedVersion(header.version));
        }

        if header.reserved != 0 {
            return Err(ProtocolError::ReservedByteSet(header.reserved));
        }

        let payload_size = u32::from_be_bytes(header.payload_size);
        if payload_size > Self::MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_size as usize,
                max: Self::MAX_PAYLOAD_SIZE as usize,
            });
        }

        Ok(header)
    }

    /// Serialize to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(IntoBytes::as_bytes(self));
        arr
    }

    /// Protocol magic number.
    #[must_use]
    pub fn magic(&self) -> u32 {
        u32::from_be_bytes(self.magic)
    }

    /// Protocol version byte.
    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Operation code as raw u16.
    #[must_use]
    pub fn opcode(&self) -> u16 {
        u16::from_be_bytes(self.opcode)
    }

    /// Operation code as enum. `None` if unrecognized.
    #[must_use]
    pub fn opcode_enum(&self) -> Option<Opcode> {
        Opcode::from_u16(self.opcode())
    }

    /// Client-assigned id echoed back in the response.
    #[must_use]
    pub fn request_id(&self) -> u32 {
        u32::from_be_bytes(self.request_id)
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn payload_size(&self) -> u32 {
        u32::from_be_bytes(self.payload_size)
    }

    /// Set the request id.
    pub fn set_request_id(&mut self, request_id: u32) {
        self.request_id = request_id.to_be_bytes();
    }

    /// Set the opcode.
    pub fn set_opcode(&mut self, opcode: Opcode) {
        self.opcode = opcode.to_u16().to_be_bytes();
    }
}

impl std::fmt::Debug for FrameHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameHeader")
            .field("magic", &format!("{:#010x}", self.magic()))
            .field("version", &self.version())
            .field("opcode", &format!("{:#06x}", self.opcode()))
            .field("request_id", &self.request_id())
            .field("payload_size", &self.payload_size())
            .finish_non_exhaustive()
    }
}
