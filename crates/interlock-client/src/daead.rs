//! Remote deterministic AEAD handle.

use std::sync::Arc;

use async_trait::async_trait;
use interlock_core::{BackendId, DeterministicAead, Keyset, PrimitiveError};
use interlock_proto::{
    ErrorPayload, Payload,
    payloads::daead::{DecryptRequest, EncryptRequest},
};

use crate::pool::PoolInner;

/// One backend bound to one keyset, reached through a [`crate::RemotePool`].
///
/// Backends keep no session state, so the keyset travels with every request.
pub struct RemoteDaead {
    backend: BackendId,
    keyset: Keyset,
    pool: Arc<PoolInner>,
}

impl RemoteDaead {
    pub(crate) fn new(backend: BackendId, keyset: Keyset, pool: Arc<PoolInner>) -> Self {
        Self { backend, keyset, pool }
    }
}

#[async_trait]
impl DeterministicAead for RemoteDaead {
    fn backend(&self) -> &BackendId {
        &self.backend
    }

    async fn encrypt_deterministically(
        &self,
        plaintext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, PrimitiveError> {
        let request = Payload::DaeadEncrypt(EncryptRequest {
            keyset: self.keyset.bytes().to_vec(),
            plaintext: plaintext.to_vec(),
            associated_data: associated_data.to_vec(),
        });

        match self.pool.request(&self.backend, request).await? {
            Payload::DaeadEncrypted(response) => Ok(response.ciphertext),
            other => Err(unexpected(other)),
        }
    }

    async fn decrypt_deterministically(
        &self,
        ciphertext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, PrimitiveError> {
        let request = Payload::DaeadDecrypt(DecryptRequest {
            keyset: self.keyset.bytes().to_vec(),
            ciphertext: ciphertext.to_vec(),
            associated_data: associated_data.to_vec(),
        });

        match self.pool.request(&self.backend, request).await? {
            Payload::DaeadDecrypted(response) => Ok(response.plaintext),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(payload: Payload) -> PrimitiveError {
    match payload {
        Payload::Error(error) => primitive_error(error),
        other => PrimitiveError::Unavailable(format!("unexpected response {:?}", other.opcode())),
    }
}

/// Map a backend's error frame onto the primitive error it reports.
pub fn primitive_error(error: ErrorPayload) -> PrimitiveError {
    match error.code {
        ErrorPayload::UNSUPPORTED => PrimitiveError::Unsupported(error.message),
        ErrorPayload::AUTHENTICATION_FAILED => PrimitiveError::Authentication(error.message),
        _ => PrimitiveError::Rejected(format!("code {}: {}", error.code, error.message)),
    }
}
