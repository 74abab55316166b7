//! Portable keyset format shared by every simulated backend.

use interlock_proto::payloads::keyset::TemplateDescriptor;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Serialized form: CBOR map of template name, key type and raw key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimKeyset {
    /// Template the key was generated for.
    pub template: String,
    /// Key type, e.g. `AesSivKey`.
    pub key_type: String,
    /// Raw key bytes.
    pub key: Vec<u8>,
}

impl SimKeyset {
    /// Fresh random key of `template.key_size` bytes.
    pub fn generate(template: &TemplateDescriptor, rng: &mut impl RngCore) -> Self {
        let mut key = vec![0u8; template.key_size as usize];
        rng.fill_bytes(&mut key);
        Self { template: template.name.clone(), key_type: template.key_type.clone(), key }
    }

    /// Serialize.
    pub fn to_bytes(&self) -> Result<Vec<u8>, String> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(self, &mut buf).map_err(|e| e.to_string())?;
        Ok(buf)
    }

    /// Parse.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        ciborium::de::from_reader(bytes).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    fn aes256_siv() -> TemplateDescriptor {
        TemplateDescriptor { name: "AES256_SIV".into(), key_type: "AesSivKey".into(), key_size: 64 }
    }

    #[test]
    fn generation_is_seeded() {
        let a = SimKeyset::generate(&aes256_siv(), &mut ChaCha20Rng::seed_from_u64(7));
        let b = SimKeyset::generate(&aes256_siv(), &mut ChaCha20Rng::seed_from_u64(7));
        assert_eq!(a, b);
        assert_eq!(a.key.len(), 64);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(SimKeyset::from_bytes(b"\xff\x00not cbor").is_err());

        let keyset = SimKeyset::generate(&aes256_siv(), &mut ChaCha20Rng::seed_from_u64(1));
        let bytes = keyset.to_bytes().unwrap();
        assert_eq!(SimKeyset::from_bytes(&bytes).unwrap(), keyset);
    }
}
