//! Operation codes.

/// Operation carried by a frame.
///
/// Requests have even low nibbles, their responses the next odd value, so a
/// response opcode is always `request + 1`. [`Opcode::Error`] answers any
/// request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Opcode {
    /// Liveness probe
    Ping,
    /// Liveness reply
    Pong,
    /// Ask a backend to generate a keyset for a template
    KeysetGenerate,
    /// Generated keyset
    KeysetGenerated,
    /// Deterministic encryption request
    DaeadEncrypt,
    /// Deterministic encryption result
    DaeadEncrypted,
    /// Deterministic decryption request
    DaeadDecrypt,
    /// Deterministic decryption result
    DaeadDecrypted,
    /// Request failed on the backend
    Error,
}

impl Opcode {
    /// Wire value.
    #[must_use]
    pub const fn to_u16(self) -> u16 {
        match self {
            Self::Ping => 0x0001,
            Self::Pong => 0x0002,
            Self::KeysetGenerate => 0x0010,
            Self::KeysetGenerated => 0x0011,
            Self::DaeadEncrypt => 0x0020,
            Self::DaeadEncrypted => 0x0021,
            Self::DaeadDecrypt => 0x0022,
            Self::DaeadDecrypted => 0x0023,
            Self::Error => 0x00FF,
        }
    }

    /// Parse a wire value. `None` if unrecognized.
    #[must_use]
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0001 => Some(Self::Ping),
            0x0002 => Some(Self::Pong),
            0x0010 => Some(Self::KeysetGenerate),
            0x0011 => Some(Self::KeysetGenerated),
            0x0020 => Some(Self::DaeadEncrypt),
            0x0021 => Some(Self::DaeadEncrypted),
            0x0022 => Some(Self::DaeadDecrypt),
            0x0023 => Some(Self::DaeadDecrypted),
            0x00FF => Some(Self::Error),
            _ => None,
        }
    }

    /// Whether a client may send this opcode.
    #[must_use]
    pub const fn is_request(self) -> bool {
        matches!(self, Self::Ping | Self::KeysetGenerate | Self::DaeadEncrypt | Self::DaeadDecrypt)
    }

    /// Successful response opcode for a request. `None` for non-requests.
    #[must_use]
    pub const fn response(self) -> Option<Self> {
        match self {
            Self::Ping => Some(Self::Pong),
            Self::KeysetGenerate => Some(Self::KeysetGenerated),
            Self::DaeadEncrypt => Some(Self::DaeadEncrypted),
            Self::DaeadDecrypt => Some(Self::DaeadDecrypted),
            _ => None,
        }
    }
}
