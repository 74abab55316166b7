//! Capability traits consumed by the conformance checks.
//!
//! # Invariants
//!
//! Implementations MUST guarantee:
//!
//! - Every handle call reaches the backend. No caching: determinism is
//!   verified by comparing live round trips.
//! - Failures reported by the backend itself map to
//!   [`PrimitiveError::Unsupported`], [`PrimitiveError::Authentication`] or
//!   [`PrimitiveError::Rejected`]. Failures to reach the backend map to
//!   [`PrimitiveError::Unavailable`] and nothing else.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{BackendId, KeyTemplate, Keyset};

/// Errors surfaced by a primitive handle or pool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrimitiveError {
    /// Backend does not implement the key type or operation.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Ciphertext or associated data failed to authenticate.
    #[error("authentication failure: {0}")]
    Authentication(String),

    /// Backend rejected the request for another reason (bad keyset, ...).
    #[error("primitive error: {0}")]
    Rejected(String),

    /// Backend could not be reached or did not answer.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl PrimitiveError {
    /// Returns true if the failure is about connectivity, not the primitive.
    ///
    /// Connectivity failures never count as an expected rejection.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Remote operation named in failure reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Keyset generation on the reference backend
    GenerateKeyset,
    /// `encrypt_deterministically`
    Encrypt,
    /// `decrypt_deterministically`
    Decrypt,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::GenerateKeyset => "generate_keyset",
            Self::Encrypt => "encrypt",
            Self::Decrypt => "decrypt",
        })
    }
}

/// One backend bound to one keyset.
///
/// Stateless from the caller's view beyond the bound keyset. Lives for one
/// conformance case.
#[async_trait]
pub trait DeterministicAead: Send + Sync {
    /// Backend this handle talks to.
    fn backend(&self) -> &BackendId;

    /// Encrypt deterministically. Identical arguments yield identical bytes.
    async fn encrypt_deterministically(
        &self,
        plaintext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, PrimitiveError>;

    /// Decrypt and authenticate.
    async fn decrypt_deterministically(
        &self,
        ciphertext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, PrimitiveError>;
}

/// Access to every backend: keyset generation and handle binding.
///
/// Shared by all concurrently running cases, so implementations must
/// tolerate concurrent callers.
#[async_trait]
pub trait BackendPool: Send + Sync {
    /// Generate a portable keyset for `template` on `backend`.
    async fn new_keyset(
        &self,
        backend: &BackendId,
        template: &KeyTemplate,
    ) -> Result<Keyset, PrimitiveError>;

    /// Bind `backend` to `keyset`.
    ///
    /// Fails with [`PrimitiveError::Unavailable`] if the backend cannot be
    /// reached. Binding never asks the backend whether it supports the key
    /// type.
    async fn deterministic_aead(
        &self,
        backend: &BackendId,
        keyset: &Keyset,
    ) -> Result<Box<dyn DeterministicAead>, PrimitiveError>;
}
