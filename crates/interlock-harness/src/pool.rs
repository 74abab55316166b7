//! In-memory backend pool.
//!
//! Every request is framed, encoded and decoded exactly as it would be on
//! the wire before reaching [`dispatch`], so the simulation exercises the
//! protocol codec without a network.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU32, AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use interlock_client::primitive_error;
use interlock_core::{
    BackendId, BackendPool, DeterministicAead, KeyTemplate, Keyset, PrimitiveError,
};
use interlock_proto::{
    Frame, Payload,
    payloads::{
        daead::{DecryptRequest, EncryptRequest},
        keyset::{KeysetGenerate, TemplateDescriptor},
    },
};
use interlock_server::dispatch;

use crate::{Fault, SimBackend};

struct Entry {
    backend: Arc<SimBackend>,
    requests: AtomicU64,
}

/// Simulated backends addressed by id.
#[derive(Clone, Default)]
pub struct SimPool {
    entries: Arc<HashMap<BackendId, Entry>>,
    next_request_id: Arc<AtomicU32>,
}

impl SimPool {
    /// Pool over `backends`.
    pub fn new(backends: impl IntoIterator<Item = (BackendId, SimBackend)>) -> Self {
        let entries = backends
            .into_iter()
            .map(|(id, backend)| {
                (id, Entry { backend: Arc::new(backend), requests: AtomicU64::new(0) })
            })
            .collect();
        Self { entries: Arc::new(entries), next_request_id: Arc::default() }
    }

    /// Requests addressed to `backend`, including ones that never arrived.
    pub fn requests(&self, backend: &BackendId) -> u64 {
        self.entries.get(backend).map_or(0, |e| e.requests.load(Ordering::Relaxed))
    }

    /// The simulated backend behind `backend`.
    pub fn backend(&self, backend: &BackendId) -> Option<&SimBackend> {
        self.entries.get(backend).map(|e| e.backend.as_ref())
    }

    fn entry(&self, backend: &BackendId) -> Result<&Entry, PrimitiveError> {
        let entry = self
            .entries
            .get(backend)
            .ok_or_else(|| PrimitiveError::Unavailable(format!("unknown backend {backend}")))?;

        if entry.backend.fault() == Fault::Unreachable {
            entry.requests.fetch_add(1, Ordering::Relaxed);
            return Err(PrimitiveError::Unavailable(format!("{backend} is unreachable")));
        }
        Ok(entry)
    }

    async fn request(&self, backend: &BackendId, payload: Payload) -> Result<Payload, PrimitiveError> {
        let entry = self.entry(backend)?;
        entry.requests.fetch_add(1, Ordering::Relaxed);

        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let request = over_the_wire(payload, request_id)?;
        let response = dispatch(entry.backend.as_ref(), request);
        let response = over_the_wire(response, request_id)?;

        tokio::task::yield_now().await;

        match response {
            Payload::Error(error) => Err(primitive_error(error)),
            other => Ok(other),
        }
    }
}

/// Encode and decode a payload as a frame.
fn over_the_wire(payload: Payload, request_id: u32) -> Result<Payload, PrimitiveError> {
    let codec = |e: interlock_proto::ProtocolError| PrimitiveError::Unavailable(e.to_string());

    let frame = payload.into_frame(request_id).map_err(codec)?;
    let mut wire = Vec::with_capacity(frame.encoded_len());
    frame.encode(&mut wire).map_err(codec)?;
    let decoded = Frame::decode(&wire).map_err(codec)?;
    Payload::from_frame(&decoded).map_err(codec)
}

fn unexpected(payload: &Payload) -> PrimitiveError {
    PrimitiveError::Unavailable(format!("unexpected response {:?}", payload.opcode()))
}

#[async_trait]
impl BackendPool for SimPool {
    async fn new_keyset(
        &self,
        backend: &BackendId,
        template: &KeyTemplate,
    ) -> Result<Keyset, PrimitiveError> {
        let request = Payload::KeysetGenerate(KeysetGenerate {
            template: TemplateDescriptor {
                name: template.name.to_string(),
                key_type: template.key_type.clone(),
                key_size: template.key_size,
            },
        });

        match self.request(backend, request).await? {
            Payload::KeysetGenerated(generated) => {
                Ok(Keyset::new(template.name.clone(), backend.clone(), generated.keyset))
            },
            other => Err(unexpected(&other)),
        }
    }

    async fn deterministic_aead(
        &self,
        backend: &BackendId,
        keyset: &Keyset,
    ) -> Result<Box<dyn DeterministicAead>, PrimitiveError> {
        self.entry(backend)?;
        Ok(Box::new(SimDaead { backend: backend.clone(), keyset: keyset.clone(), pool: self.clone() }))
    }
}

/// Simulated backend bound to a keyset.
struct SimDaead {
    backend: BackendId,
    keyset: Keyset,
    pool: SimPool,
}

#[async_trait]
impl DeterministicAead for SimDaead {
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
            other => Err(unexpected(&other)),
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
            other => Err(unexpected(&other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_backend_counts_requests() {
        let pool = SimPool::new([
            (BackendId::from("java"), SimBackend::conforming(["AesSivKey"], 1)),
            (BackendId::from("go"), SimBackend::new(["AesSivKey"], Fault::Unreachable, 2)),
        ]);

        let keyset = pool.new_keyset(&"java".into(), &KeyTemplate::aes256_siv()).await.unwrap();
        assert_eq!(keyset.source().as_str(), "java");

        let err = pool.deterministic_aead(&"go".into(), &keyset).await.err().unwrap();
        assert!(err.is_unavailable());
        assert_eq!(pool.requests(&"go".into()), 1);
        assert_eq!(pool.backend(&"go".into()).map(SimBackend::calls), Some(0));
    }

    #[tokio::test]
    async fn error_frames_map_to_primitive_errors() {
        let pool = SimPool::new([
            (BackendId::from("java"), SimBackend::conforming(["AesSivKey"], 1)),
            (BackendId::from("python"), SimBackend::conforming(["AesGcmKey"], 2)),
        ]);
        let keyset = pool.new_keyset(&"java".into(), &KeyTemplate::aes256_siv()).await.unwrap();

        let handle = pool.deterministic_aead(&"python".into(), &keyset).await.unwrap();
        let err = handle.encrypt_deterministically(b"pt", b"ad").await.unwrap_err();
        assert!(matches!(err, PrimitiveError::Unsupported(_)));
    }
}
