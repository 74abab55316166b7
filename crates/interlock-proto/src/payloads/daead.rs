//! Deterministic AEAD payloads.
//!
//! Backends hold no session state: every request carries the keyset it must
//! use.

use serde::{Deserialize, Serialize};

/// Encrypt `plaintext` deterministically under `keyset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptRequest {
    /// Serialized keyset.
    pub keyset: Vec<u8>,
    /// Message to encrypt.
    pub plaintext: Vec<u8>,
    /// Authenticated but unencrypted context.
    pub associated_data: Vec<u8>,
}

/// Result of a successful encryption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptResponse {
    /// Ciphertext bytes.
    pub ciphertext: Vec<u8>,
}

/// Decrypt and authenticate `ciphertext` under `keyset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptRequest {
    /// Serialized keyset.
    pub keyset: Vec<u8>,
    /// Ciphertext to open.
    pub ciphertext: Vec<u8>,
    /// Associated data the ciphertext was bound to.
    pub associated_data: Vec<u8>,
}

/// Result of a successful decryption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptResponse {
    /// Recovered plaintext.
    pub plaintext: Vec<u8>,
}
