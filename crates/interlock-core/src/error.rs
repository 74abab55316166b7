//! Conformance error taxonomy.
//!
//! Two categories: infrastructure errors (a backend could not be reached)
//! abort only the affected case; conformance errors are bugs in a backend
//! and are never retried. Every variant names the template and the
//! offending backend, and carries the bytes or outcome that was observed.

use thiserror::Error;

use crate::{BackendId, Operation, PrimitiveError, TemplateName};

/// Why a supported backend failed to open the agreed ciphertext.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecryptionMismatch {
    /// Backend refused the ciphertext.
    #[error("rejected: {0}")]
    Rejected(PrimitiveError),

    /// Backend returned the wrong plaintext.
    #[error("expected plaintext {}, got {}", hex::encode(expected), hex::encode(actual))]
    WrongPlaintext {
        /// Original plaintext
        expected: Vec<u8>,
        /// Plaintext the backend returned
        actual: Vec<u8>,
    },
}

/// A failed conformance assertion or an infrastructure failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConformanceError {
    /// Template has no entry in the support matrix or catalog.
    #[error("unknown key template {template}")]
    UnknownTemplate {
        /// Template that was looked up
        template: TemplateName,
    },

    /// No backend claims the template, so nothing can be checked.
    #[error("no backend supports key template {template}")]
    NoSupportedBackend {
        /// Template without supporters
        template: TemplateName,
    },

    /// Backend could not be reached. Infrastructure, not conformance.
    #[error("{template}: backend {backend} unavailable: {reason}")]
    BackendUnavailable {
        /// Template being checked
        template: TemplateName,
        /// Unreachable backend
        backend: BackendId,
        /// Transport-level reason
        reason: String,
    },

    /// Supported backends produced different ciphertexts for the same input.
    #[error(
        "{template}: ciphertext from {backend} differs from {reference}: expected {}, got {}",
        hex::encode(expected),
        hex::encode(actual)
    )]
    DeterminismViolation {
        /// Template being checked
        template: TemplateName,
        /// Backend whose ciphertext was taken as the reference
        reference: BackendId,
        /// Backend that disagreed
        backend: BackendId,
        /// Reference ciphertext
        expected: Vec<u8>,
        /// Disagreeing ciphertext
        actual: Vec<u8>,
    },

    /// One backend produced different ciphertexts for repeated identical calls.
    #[error(
        "{template}: {backend} is not deterministic: first {}, then {}",
        hex::encode(first),
        hex::encode(second)
    )]
    NonDeterministicBackend {
        /// Template being checked
        template: TemplateName,
        /// Offending backend
        backend: BackendId,
        /// Agreed ciphertext
        first: Vec<u8>,
        /// Ciphertext from the repeated call
        second: Vec<u8>,
    },

    /// A backend that claims the template refused an operation on it.
    #[error("{template}: {backend} claims support but {operation} failed: {error}")]
    SupportedBackendRejected {
        /// Template being checked
        template: TemplateName,
        /// Offending backend
        backend: BackendId,
        /// Operation that failed
        operation: Operation,
        /// Error the backend returned
        error: PrimitiveError,
    },

    /// A supported backend could not open a peer-produced ciphertext.
    #[error("{template}: {backend} cannot decrypt ciphertext produced by {producer}: {mismatch}")]
    CrossDecryptionFailure {
        /// Template being checked
        template: TemplateName,
        /// Backend whose ciphertext was agreed on first
        producer: BackendId,
        /// Backend that failed to decrypt
        backend: BackendId,
        /// What went wrong
        mismatch: DecryptionMismatch,
    },

    /// An unsupported backend accepted input it must reject.
    #[error(
        "{template}: {backend} does not support the template but {operation} succeeded with output {}",
        hex::encode(output)
    )]
    UnsupportedCapabilityLeak {
        /// Template being checked
        template: TemplateName,
        /// Offending backend
        backend: BackendId,
        /// Operation that wrongly succeeded
        operation: Operation,
        /// Output the backend returned
        output: Vec<u8>,
    },
}

impl ConformanceError {
    /// Returns true for infrastructure failures (unreachable backend).
    ///
    /// Everything else indicates a bug in a backend or in the declared
    /// support matrix.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::BackendUnavailable { .. })
    }

    /// Backend the error is attributed to, if any.
    #[must_use]
    pub fn backend(&self) -> Option<&BackendId> {
        match self {
            Self::UnknownTemplate { .. } | Self::NoSupportedBackend { .. } => None,
            Self::BackendUnavailable { backend, .. }
            | Self::DeterminismViolation { backend, .. }
            | Self::NonDeterministicBackend { backend, .. }
            | Self::SupportedBackendRejected { backend, .. }
            | Self::CrossDecryptionFailure { backend, .. }
            | Self::UnsupportedCapabilityLeak { backend, .. } => Some(backend),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unavailability_is_infrastructure() {
        let unavailable = ConformanceError::BackendUnavailable {
            template: "AES256_SIV".into(),
            backend: "go".into(),
            reason: "connection refused".into(),
        };
        assert!(unavailable.is_infrastructure());

        let leak = ConformanceError::UnsupportedCapabilityLeak {
            template: "AES256_SIV".into(),
            backend: "go".into(),
            operation: Operation::Decrypt,
            output: vec![],
        };
        assert!(!leak.is_infrastructure());
        assert_eq!(leak.backend(), Some(&BackendId::from("go")));
    }

    #[test]
    fn determinism_violation_renders_hex() {
        let err = ConformanceError::DeterminismViolation {
            template: "AES256_SIV".into(),
            reference: "cc".into(),
            backend: "go".into(),
            expected: vec![0xde, 0xad],
            actual: vec![0xbe, 0xef],
        };
        assert_eq!(
            err.to_string(),
            "AES256_SIV: ciphertext from go differs from cc: expected dead, got beef"
        );
    }
}
