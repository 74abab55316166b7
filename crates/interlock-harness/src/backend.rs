//! Simulated backend implementations with fault injection.

use std::{
    collections::BTreeSet,
    sync::{
        Mutex,
        atomic::{AtomicU8, AtomicU64, Ordering},
    },
};

use interlock_proto::payloads::keyset::TemplateDescriptor;
use interlock_server::{BackendService, ServiceError};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use crate::{SimCipher, SimKeyset};

/// How a simulated backend misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    /// Conforming implementation.
    None,
    /// Flips a ciphertext bit: consistent with itself, disagrees with peers.
    Divergent,
    /// Every encryption differs from the previous one.
    NonDeterministic,
    /// Accepts key types it does not claim to support.
    Leaky,
    /// Decryption always reports an authentication failure.
    BrokenDecrypt,
    /// Never answers. Only meaningful behind a pool or a stopped server.
    Unreachable,
}

/// One simulated backend.
///
/// Supports the key types it was built with. All randomness comes from a
/// seeded [`ChaCha20Rng`], so keysets are reproducible per seed.
pub struct SimBackend {
    key_types: BTreeSet<String>,
    fault: Fault,
    rng: Mutex<ChaCha20Rng>,
    encrypt_count: AtomicU8,
    calls: AtomicU64,
}

impl SimBackend {
    /// Backend supporting `key_types`.
    pub fn new<I, S>(key_types: I, fault: Fault, seed: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key_types: key_types.into_iter().map(Into::into).collect(),
            fault,
            rng: Mutex::new(ChaCha20Rng::seed_from_u64(seed)),
            encrypt_count: AtomicU8::new(0),
            calls: AtomicU64::new(0),
        }
    }

    /// Conforming backend supporting `key_types`.
    pub fn conforming<I, S>(key_types: I, seed: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(key_types, Fault::None, seed)
    }

    /// Injected fault.
    pub fn fault(&self) -> Fault {
        self.fault
    }

    /// Whether the backend implements `key_type`.
    pub fn supports(&self, key_type: &str) -> bool {
        self.key_types.contains(key_type)
    }

    /// Service calls handled so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    fn accepts(&self, key_type: &str) -> bool {
        self.supports(key_type) || self.fault == Fault::Leaky
    }

    fn cipher_for(&self, keyset: &[u8]) -> Result<SimCipher, ServiceError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let keyset = SimKeyset::from_bytes(keyset).map_err(ServiceError::InvalidKeyset)?;
        if !self.accepts(&keyset.key_type) {
            return Err(ServiceError::Unsupported(format!("key type {}", keyset.key_type)));
        }
        Ok(SimCipher::new(&keyset.key))
    }
}

impl BackendService for SimBackend {
    fn new_keyset(&self, template: &TemplateDescriptor) -> Result<Vec<u8>, ServiceError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        if !self.accepts(&template.key_type) {
            return Err(ServiceError::Unsupported(format!("key type {}", template.key_type)));
        }

        let mut rng = self
            .rng
            .lock()
            .map_err(|_| ServiceError::Internal("rng lock poisoned".to_string()))?;
        SimKeyset::generate(template, &mut *rng).to_bytes().map_err(ServiceError::Internal)
    }

    fn encrypt_deterministically(
        &self,
        keyset: &[u8],
        plaintext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, ServiceError> {
        let mut ciphertext = self.cipher_for(keyset)?.seal(plaintext, associated_data);

        match self.fault {
            Fault::Divergent => {
                if let Some(last) = ciphertext.last_mut() {
                    *last ^= 0x01;
                } else {
                    ciphertext.push(0x01);
                }
            },
            Fault::NonDeterministic => {
                ciphertext.push(self.encrypt_count.fetch_add(1, Ordering::Relaxed));
            },
            _ => {},
        }

        Ok(ciphertext)
    }

    fn decrypt_deterministically(
        &self,
        keyset: &[u8],
        ciphertext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, ServiceError> {
        let cipher = self.cipher_for(keyset)?;
        if self.fault == Fault::BrokenDecrypt {
            return Err(ServiceError::AuthenticationFailed("tag mismatch".to_string()));
        }

        cipher
            .open(ciphertext, associated_data)
            .ok_or_else(|| ServiceError::AuthenticationFailed("tag mismatch".to_string()))
    }
}
