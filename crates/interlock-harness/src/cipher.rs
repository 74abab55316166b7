//! Deterministic AEAD for simulated backends.
//!
//! SIV construction over HMAC-SHA256: the synthetic IV is a truncated MAC
//! over the associated data and plaintext, and the keystream is HMAC in
//! counter mode keyed by the same key under a different label. Gives
//! simulated backends real ciphertexts to agree or disagree on. Not meant
//! for protecting anything.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Label for the synthetic IV
const SIV_LABEL: &[u8] = b"siv";

/// Label for keystream blocks
const STREAM_LABEL: &[u8] = b"stream";

/// Deterministic authenticated cipher bound to one key.
#[derive(Clone)]
pub struct SimCipher {
    key: Vec<u8>,
}

impl SimCipher {
    /// Synthetic IV length, also the ciphertext expansion.
    pub const TAG_SIZE: usize = 16;

    /// Bind a key. Any length is accepted.
    pub fn new(key: &[u8]) -> Self {
        Self { key: key.to_vec() }
    }

    /// Encrypt. Same inputs always produce the same output.
    pub fn seal(&self, plaintext: &[u8], associated_data: &[u8]) -> Vec<u8> {
        let siv = self.siv_mac(plaintext, associated_data).finalize().into_bytes();
        let siv = &siv[..Self::TAG_SIZE];

        let mut out = Vec::with_capacity(Self::TAG_SIZE + plaintext.len());
        out.extend_from_slice(siv);
        out.extend(self.apply_keystream(siv, plaintext));
        out
    }

    /// Decrypt and authenticate. `None` on any mismatch.
    pub fn open(&self, ciphertext: &[u8], associated_data: &[u8]) -> Option<Vec<u8>> {
        if ciphertext.len() < Self::TAG_SIZE {
            return None;
        }
        let (siv, body) = ciphertext.split_at(Self::TAG_SIZE);

        let plaintext = self.apply_keystream(siv, body);
        self.siv_mac(&plaintext, associated_data).verify_truncated_left(siv).ok()?;
        Some(plaintext)
    }

    fn mac(&self) -> HmacSha256 {
        let Ok(mac) = HmacSha256::new_from_slice(&self.key) else {
            unreachable!("HMAC-SHA256 accepts any key size");
        };
        mac
    }

    fn siv_mac(&self, plaintext: &[u8], associated_data: &[u8]) -> HmacSha256 {
        let mut mac = self.mac();
        mac.update(SIV_LABEL);
        mac.update(&(associated_data.len() as u64).to_be_bytes());
        mac.update(associated_data);
        mac.update(plaintext);
        mac
    }

    fn apply_keystream(&self, siv: &[u8], data: &[u8]) -> Vec<u8> {
        data.chunks(32)
            .enumerate()
            .flat_map(|(counter, chunk)| {
                let mut mac = self.mac();
                mac.update(STREAM_LABEL);
                mac.update(siv);
                mac.update(&(counter as u32).to_be_bytes());
                let block = mac.finalize().into_bytes();
                chunk.iter().zip(block).map(|(byte, key)| byte ^ key).collect::<Vec<_>>()
            })
            .collect()
    }
}
