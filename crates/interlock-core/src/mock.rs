//! Scripted in-memory pool for unit tests.
//!
//! "Ciphertext" is `keyset || len(ad) || ad || plaintext`. Enough structure to
//! tell keys and associated data apart without any cryptography.

#![allow(clippy::unwrap_used)]

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicU8, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    BackendId, BackendPool, DeterministicAead, KeyTemplate, Keyset, PrimitiveError,
    SupportMatrix,
};

/// Behaviour of one mock backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MockBackend {
    Conforming,
    Unsupported,
    Divergent,
    NonDeterministic,
    WrongPlaintext,
    EncryptsAnything,
    Unreachable,
    DropsAfterBind,
    /// Conforming, but keyset generation for `template` takes a while.
    Slow { template: &'static str },
}

pub(crate) struct MockPool {
    backends: Vec<(BackendId, MockBackend)>,
    calls: Arc<Mutex<Vec<BackendId>>>,
    issued: Mutex<Vec<String>>,
}

impl MockPool {
    pub(crate) fn new<'a>(backends: impl IntoIterator<Item = (&'a str, MockBackend)>) -> Self {
        Self {
            backends: backends.into_iter().map(|(id, b)| (BackendId::from(id), b)).collect(),
            calls: Arc::default(),
            issued: Mutex::default(),
        }
    }

    /// Matrix over every mock backend with `supported` claiming `template`.
    pub(crate) fn matrix(&self, template: &str, supported: &[&str]) -> SupportMatrix {
        SupportMatrix::new(self.backends.iter().map(|(id, _)| id.clone()))
            .unwrap()
            .with(template, supported.iter().map(|s| BackendId::from(*s)))
            .unwrap()
    }

    /// Encrypt and decrypt calls that reached `backend`.
    pub(crate) fn calls(&self, backend: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|b| b.as_str() == backend).count()
    }

    /// Template names in the order their keysets were handed out.
    pub(crate) fn issued(&self) -> Vec<String> {
        self.issued.lock().unwrap().clone()
    }

    fn behaviour(&self, backend: &BackendId) -> Result<MockBackend, PrimitiveError> {
        self.backends
            .iter()
            .find(|(id, _)| id == backend)
            .map(|(_, b)| *b)
            .ok_or_else(|| PrimitiveError::Unavailable(format!("no backend {backend}")))
    }
}

#[async_trait]
impl BackendPool for MockPool {
    async fn new_keyset(
        &self,
        backend: &BackendId,
        template: &KeyTemplate,
    ) -> Result<Keyset, PrimitiveError> {
        match self.behaviour(backend)? {
            MockBackend::Unreachable | MockBackend::DropsAfterBind => {
                return Err(PrimitiveError::Unavailable("connection refused".into()));
            },
            MockBackend::Unsupported => {
                return Err(PrimitiveError::Unsupported(template.key_type.clone()));
            },
            MockBackend::Slow { template: slow } if template.name.as_str() == slow => {
                tokio::time::sleep(Duration::from_millis(100)).await;
            },
            _ => {},
        }

        self.issued.lock().unwrap().push(template.name.to_string());
        Ok(Keyset::new(
            template.name.clone(),
            backend.clone(),
            format!("{}@{backend}", template.name).into_bytes(),
        ))
    }

    async fn deterministic_aead(
        &self,
        backend: &BackendId,
        keyset: &Keyset,
    ) -> Result<Box<dyn DeterministicAead>, PrimitiveError> {
        let behaviour = self.behaviour(backend)?;
        if behaviour == MockBackend::Unreachable {
            return Err(PrimitiveError::Unavailable("connection refused".into()));
        }

        Ok(Box::new(MockHandle {
            backend: backend.clone(),
            key: keyset.bytes().to_vec(),
            behaviour,
            counter: AtomicU8::new(0),
            calls: Arc::clone(&self.calls),
        }))
    }
}

struct MockHandle {
    backend: BackendId,
    key: Vec<u8>,
    behaviour: MockBackend,
    counter: AtomicU8,
    calls: Arc<Mutex<Vec<BackendId>>>,
}

impl MockHandle {
    fn record(&self) -> Result<(), PrimitiveError> {
        self.calls.lock().unwrap().push(self.backend.clone());
        match self.behaviour {
            MockBackend::DropsAfterBind => Err(PrimitiveError::Unavailable("reset".into())),
            _ => Ok(()),
        }
    }

    fn seal(&self, plaintext: &[u8], associated_data: &[u8]) -> Vec<u8> {
        let mut out = self.key.clone();
        out.push(associated_data.len() as u8);
        out.extend_from_slice(associated_data);
        out.extend_from_slice(plaintext);
        out
    }

    fn open(&self, ciphertext: &[u8], associated_data: &[u8]) -> Result<Vec<u8>, PrimitiveError> {
        let prefix = self.seal(&[], associated_data);
        ciphertext
            .strip_prefix(prefix.as_slice())
            .map(<[u8]>::to_vec)
            .ok_or_else(|| PrimitiveError::Authentication("tag mismatch".into()))
    }
}

#[async_trait]
impl DeterministicAead for MockHandle {
    fn backend(&self) -> &BackendId {
        &self.backend
    }

    async fn encrypt_deterministically(
        &self,
        plaintext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, PrimitiveError> {
        self.record()?;
        let mut ciphertext = self.seal(plaintext, associated_data);
        match self.behaviour {
            MockBackend::Unsupported => return Err(PrimitiveError::Unsupported("AesSivKey".into())),
            MockBackend::Divergent => ciphertext.push(0xFF),
            MockBackend::NonDeterministic => {
                ciphertext.push(self.counter.fetch_add(1, Ordering::Relaxed));
            },
            _ => {},
        }
        Ok(ciphertext)
    }

    async fn decrypt_deterministically(
        &self,
        ciphertext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, PrimitiveError> {
        self.record()?;
        match self.behaviour {
            MockBackend::Unsupported => Err(PrimitiveError::Unsupported("AesSivKey".into())),
            MockBackend::EncryptsAnything => {
                Err(PrimitiveError::Authentication("tag mismatch".into()))
            },
            MockBackend::WrongPlaintext => {
                let mut plaintext = self.open(ciphertext, associated_data)?;
                plaintext.push(b'!');
                Ok(plaintext)
            },
            _ => self.open(ciphertext, associated_data),
        }
    }
}
