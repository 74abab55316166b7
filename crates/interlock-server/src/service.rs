//! The backend an embedding test server wraps, and request dispatch.
//!
//! Dispatch is pure: a request payload in, a response payload out. Every
//! failure the service reports becomes an error payload, so the verifier
//! always gets an answer it can classify.

use interlock_proto::{
    ErrorPayload, Payload,
    payloads::{
        daead::{DecryptRequest, DecryptResponse, EncryptRequest, EncryptResponse},
        keyset::{KeysetGenerated, TemplateDescriptor},
    },
};
use thiserror::Error;

/// Failure reported by a backend implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Key type or operation not implemented.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Ciphertext or associated data did not authenticate.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Keyset bytes could not be parsed.
    #[error("invalid keyset: {0}")]
    InvalidKeyset(String),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Wire form of the error.
    #[must_use]
    pub fn to_payload(&self) -> ErrorPayload {
        match self {
            Self::Unsupported(msg) => ErrorPayload::unsupported(msg.clone()),
            Self::AuthenticationFailed(msg) => ErrorPayload::authentication_failed(msg.clone()),
            Self::InvalidKeyset(msg) => ErrorPayload::invalid_keyset(msg.clone()),
            Self::Internal(msg) => ErrorPayload::internal(msg.clone()),
        }
    }
}

/// A deterministic AEAD implementation exposed to the verifier.
///
/// Stateless per request: every call receives the serialized keyset it must
/// use.
pub trait BackendService: Send + Sync + 'static {
    /// Generate a serialized keyset for `template`.
    fn new_keyset(&self, template: &TemplateDescriptor) -> Result<Vec<u8>, ServiceError>;

    /// Encrypt deterministically under `keyset`.
    fn encrypt_deterministically(
        &self,
        keyset: &[u8],
        plaintext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, ServiceError>;

    /// Decrypt and authenticate under `keyset`.
    fn decrypt_deterministically(
        &self,
        keyset: &[u8],
        ciphertext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, ServiceError>;
}

/// Answer one request.
pub fn dispatch<S: BackendService + ?Sized>(service: &S, request: Payload) -> Payload {
    let result = match request {
        Payload::Ping => return Payload::Pong,
        Payload::KeysetGenerate(generate) => service
            .new_keyset(&generate.template)
            .map(|keyset| Payload::KeysetGenerated(KeysetGenerated { keyset })),
        Payload::DaeadEncrypt(EncryptRequest { keyset, plaintext, associated_data }) => service
            .encrypt_deterministically(&keyset, &plaintext, &associated_data)
            .map(|ciphertext| Payload::DaeadEncrypted(EncryptResponse { ciphertext })),
        Payload::DaeadDecrypt(DecryptRequest { keyset, ciphertext, associated_data }) => service
            .decrypt_deterministically(&keyset, &ciphertext, &associated_data)
            .map(|plaintext| Payload::DaeadDecrypted(DecryptResponse { plaintext })),
        other => {
            return Payload::Error(ErrorPayload::invalid_request(format!(
                "{:?} is not a request",
                other.opcode()
            )));
        },
    };

    result.unwrap_or_else(|err| Payload::Error(err.to_payload()))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reverses plaintexts; only accepts the keyset `b"k"`.
    struct Reverser;

    impl BackendService for Reverser {
        fn new_keyset(&self, template: &TemplateDescriptor) -> Result<Vec<u8>, ServiceError> {
            if template.key_type == "AesSivKey" {
                Ok(b"k".to_vec())
            } else {
                Err(ServiceError::Unsupported(template.key_type.clone()))
            }
        }

        fn encrypt_deterministically(
            &self,
            keyset: &[u8],
            plaintext: &[u8],
            _associated_data: &[u8],
        ) -> Result<Vec<u8>, ServiceError> {
            if keyset != b"k" {
                return Err(ServiceError::InvalidKeyset("unknown".into()));
            }
            Ok(plaintext.iter().rev().copied().collect())
        }

        fn decrypt_deterministically(
            &self,
            keyset: &[u8],
            ciphertext: &[u8],
            associated_data: &[u8],
        ) -> Result<Vec<u8>, ServiceError> {
            if associated_data.is_empty() {
                return Err(ServiceError::AuthenticationFailed("empty ad".into()));
            }
            self.encrypt_deterministically(keyset, ciphertext, associated_data)
        }
    }

    fn encrypt(keyset: &[u8]) -> Payload {
        Payload::DaeadEncrypt(EncryptRequest {
            keyset: keyset.to_vec(),
            plaintext: b"abc".to_vec(),
            associated_data: b"ad".to_vec(),
        })
    }

    #[test]
    fn ping_gets_pong() {
        assert_eq!(dispatch(&Reverser, Payload::Ping), Payload::Pong);
    }

    #[test]
    fn encrypt_round_trip() {
        let response = dispatch(&Reverser, encrypt(b"k"));
        assert_eq!(response, Payload::DaeadEncrypted(EncryptResponse { ciphertext: b"cba".to_vec() }));
        assert!(response.answers(interlock_proto::Opcode::DaeadEncrypt));
    }

    #[test]
    fn service_errors_become_error_payloads() {
        let response = dispatch(&Reverser, encrypt(b"other"));
        assert_eq!(response, Payload::Error(ErrorPayload::invalid_keyset("unknown")));

        let response = dispatch(
            &Reverser,
            Payload::DaeadDecrypt(DecryptRequest {
                keyset: b"k".to_vec(),
                ciphertext: b"cba".to_vec(),
                associated_data: Vec::new(),
            }),
        );
        match response {
            Payload::Error(error) => assert_eq!(error.code, ErrorPayload::AUTHENTICATION_FAILED),
            other => panic!("expected error payload, got {other:?}"),
        }
    }

    #[test]
    fn responses_are_not_requests() {
        let response = dispatch(&Reverser, Payload::Pong);
        match response {
            Payload::Error(error) => assert_eq!(error.code, ErrorPayload::INVALID_REQUEST),
            other => panic!("expected error payload, got {other:?}"),
        }
    }
}
