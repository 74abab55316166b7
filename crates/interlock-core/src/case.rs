//! One template's conformance check.
//!
//! Steps run strictly in order and calls within a step follow the matrix's
//! backend declaration order, so the first reported violation is stable
//! across runs:
//!
//! 1. `BindHandles`: bind every backend to the shared keyset
//! 2. `CrossDeterminism`: every supported backend encrypts the fixed pair;
//!    all ciphertexts must be identical
//! 3. `Idempotence`: every supported backend encrypts the pair again and
//!    must reproduce the agreed ciphertext
//! 4. `CrossDecryption`: every supported backend decrypts the agreed
//!    ciphertext back to the original plaintext
//! 5. `RejectDecryption`: every unsupported backend must fail to decrypt it
//! 6. `RejectEncryption`: every unsupported backend must fail to encrypt
//!
//! Only primitive failures count as a rejection. An unreachable backend is
//! an infrastructure failure wherever it happens.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{
    BackendId, BackendPool, ConformanceError, DecryptionMismatch, DeterministicAead, KeyTemplate,
    Keyset, Operation, PrimitiveError, SupportMatrix, SupportSet, TemplateName,
};

/// Plaintext unsupported backends are asked to encrypt.
pub const NEGATIVE_PLAINTEXT: &[u8] = b"plaintext";

/// Associated data unsupported backends are asked to encrypt with.
pub const NEGATIVE_ASSOCIATED_DATA: &[u8] = b"associated_data";

/// Step of a conformance case, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Look up the template and split backends
    Partition,
    /// Generate the shared keyset
    KeysetGeneration,
    /// Bind every backend to the keyset
    BindHandles,
    /// Supported backends agree on the ciphertext
    CrossDeterminism,
    /// Supported backends repeat themselves
    Idempotence,
    /// Supported backends decrypt the agreed ciphertext
    CrossDecryption,
    /// Unsupported backends refuse to decrypt
    RejectDecryption,
    /// Unsupported backends refuse to encrypt
    RejectEncryption,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Partition => "partition",
            Self::KeysetGeneration => "keyset_generation",
            Self::BindHandles => "bind_handles",
            Self::CrossDeterminism => "cross_determinism",
            Self::Idempotence => "idempotence",
            Self::CrossDecryption => "cross_decryption",
            Self::RejectDecryption => "reject_decryption",
            Self::RejectEncryption => "reject_encryption",
        })
    }
}

/// The fixed plaintext and associated data for one template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseInputs {
    /// Message every supported backend encrypts.
    pub plaintext: Vec<u8>,
    /// Associated data bound to it.
    pub associated_data: Vec<u8>,
}

impl CaseInputs {
    /// Inputs derived from the template name.
    #[must_use]
    pub fn for_template(name: &TemplateName) -> Self {
        Self {
            plaintext: format!(
                "This is some plaintext message to be encrypted using key_template {name}."
            )
            .into_bytes(),
            associated_data: format!("Some associated data for {name}.").into_bytes(),
        }
    }
}

/// First violated assertion of a case.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{step}: {error}")]
pub struct CaseFailure {
    /// Step that failed.
    pub step: Step,
    /// What went wrong.
    pub error: ConformanceError,
}

impl CaseFailure {
    /// Pair an error with the step that raised it.
    pub fn new(step: Step, error: ConformanceError) -> Self {
        Self { step, error }
    }
}

/// A prepared check for one template: keyset in hand, backends partitioned.
#[derive(Debug, Clone)]
pub struct ConformanceCase {
    template: KeyTemplate,
    keyset: Keyset,
    support: SupportSet,
    inputs: CaseInputs,
}

impl ConformanceCase {
    /// Partition the matrix for `template` and derive the case inputs.
    ///
    /// # Errors
    ///
    /// - `UnknownTemplate` if the matrix has no entry for the template
    /// - `NoSupportedBackend` if no backend claims it
    pub fn new(
        template: KeyTemplate,
        keyset: Keyset,
        matrix: &SupportMatrix,
    ) -> Result<Self, CaseFailure> {
        let support = matrix
            .partition(&template.name)
            .map_err(|error| CaseFailure::new(Step::Partition, error))?;

        if support.supported.is_empty() {
            return Err(CaseFailure::new(
                Step::Partition,
                ConformanceError::NoSupportedBackend { template: template.name },
            ));
        }

        let inputs = CaseInputs::for_template(&template.name);
        Ok(Self { template, keyset, support, inputs })
    }

    /// Template under test.
    #[must_use]
    pub fn template(&self) -> &KeyTemplate {
        &self.template
    }

    /// Shared keyset.
    #[must_use]
    pub fn keyset(&self) -> &Keyset {
        &self.keyset
    }

    /// Backend partition.
    #[must_use]
    pub fn support(&self) -> &SupportSet {
        &self.support
    }

    /// Fixed plaintext and associated data.
    #[must_use]
    pub fn inputs(&self) -> &CaseInputs {
        &self.inputs
    }

    /// Run every step against `pool`. Returns the agreed ciphertext.
    ///
    /// Stops at the first violated assertion.
    pub async fn run<P: BackendPool + ?Sized>(&self, pool: &P) -> Result<Vec<u8>, CaseFailure> {
        let supported = self.bind(pool, &self.support.supported).await?;
        let unsupported = self.bind(pool, &self.support.unsupported).await?;

        let agreed = self.cross_determinism(&supported).await?;
        self.idempotence(&supported, &agreed).await?;
        self.cross_decryption(&supported, &agreed).await?;
        self.reject_decryption(&unsupported, &agreed).await?;
        self.reject_encryption(&unsupported).await?;

        Ok(agreed)
    }

    async fn bind<P: BackendPool + ?Sized>(
        &self,
        pool: &P,
        backends: &[BackendId],
    ) -> Result<Vec<Box<dyn DeterministicAead>>, CaseFailure> {
        let mut handles = Vec::with_capacity(backends.len());
        for backend in backends {
            debug!(template = %self.template.name, %backend, step = %Step::BindHandles, "binding handle");
            let handle = pool
                .deterministic_aead(backend, &self.keyset)
                .await
                .map_err(|err| self.unavailable(Step::BindHandles, backend, &err))?;
            handles.push(handle);
        }
        Ok(handles)
    }

    async fn cross_determinism(
        &self,
        handles: &[Box<dyn DeterministicAead>],
    ) -> Result<Vec<u8>, CaseFailure> {
        let step = Step::CrossDeterminism;
        let Some((first, rest)) = handles.split_first() else {
            return Err(CaseFailure::new(step, ConformanceError::NoSupportedBackend {
                template: self.template.name.clone(),
            }));
        };

        debug!(template = %self.template.name, backend = %first.backend(), %step, "encrypting");
        let expected = self.encrypt_supported(step, first.as_ref()).await?;

        for handle in rest {
            let backend = handle.backend();
            debug!(template = %self.template.name, %backend, %step, "encrypting");
            let actual = self.encrypt_supported(step, handle.as_ref()).await?;

            if actual != expected {
                return Err(CaseFailure::new(step, ConformanceError::DeterminismViolation {
                    template: self.template.name.clone(),
                    reference: first.backend().clone(),
                    backend: backend.clone(),
                    expected,
                    actual,
                }));
            }
        }

        Ok(expected)
    }

    async fn idempotence(
        &self,
        handles: &[Box<dyn DeterministicAead>],
        agreed: &[u8],
    ) -> Result<(), CaseFailure> {
        let step = Step::Idempotence;
        for handle in handles {
            let backend = handle.backend();
            debug!(template = %self.template.name, %backend, %step, "re-encrypting");
            let second = self.encrypt_supported(step, handle.as_ref()).await?;

            if second != agreed {
                return Err(CaseFailure::new(step, ConformanceError::NonDeterministicBackend {
                    template: self.template.name.clone(),
                    backend: backend.clone(),
                    first: agreed.to_vec(),
                    second,
                }));
            }
        }
        Ok(())
    }

    async fn cross_decryption(
        &self,
        handles: &[Box<dyn DeterministicAead>],
        agreed: &[u8],
    ) -> Result<(), CaseFailure> {
        let step = Step::CrossDecryption;
        let Some(producer) = handles.first().map(|h| h.backend().clone()) else {
            return Ok(());
        };

        for handle in handles {
            let backend = handle.backend();
            debug!(template = %self.template.name, %backend, %step, "decrypting agreed ciphertext");

            let mismatch = match handle
                .decrypt_deterministically(agreed, &self.inputs.associated_data)
                .await
            {
                Ok(plaintext) if plaintext == self.inputs.plaintext => continue,
                Ok(plaintext) => DecryptionMismatch::WrongPlaintext {
                    expected: self.inputs.plaintext.clone(),
                    actual: plaintext,
                },
                Err(err) if err.is_unavailable() => return Err(self.unavailable(step, backend, &err)),
                Err(err) => DecryptionMismatch::Rejected(err),
            };

            return Err(CaseFailure::new(step, ConformanceError::CrossDecryptionFailure {
                template: self.template.name.clone(),
                producer,
                backend: backend.clone(),
                mismatch,
            }));
        }
        Ok(())
    }

    async fn reject_decryption(
        &self,
        handles: &[Box<dyn DeterministicAead>],
        agreed: &[u8],
    ) -> Result<(), CaseFailure> {
        let step = Step::RejectDecryption;
        for handle in handles {
            let backend = handle.backend();
            debug!(template = %self.template.name, %backend, %step, "expecting decrypt rejection");
            let result =
                handle.decrypt_deterministically(agreed, &self.inputs.associated_data).await;
            self.expect_rejection(step, backend, Operation::Decrypt, result)?;
        }
        Ok(())
    }

    async fn reject_encryption(
        &self,
        handles: &[Box<dyn DeterministicAead>],
    ) -> Result<(), CaseFailure> {
        let step = Step::RejectEncryption;
        for handle in handles {
            let backend = handle.backend();
            debug!(template = %self.template.name, %backend, %step, "expecting encrypt rejection");
            let result = handle
                .encrypt_deterministically(NEGATIVE_PLAINTEXT, NEGATIVE_ASSOCIATED_DATA)
                .await;
            self.expect_rejection(step, backend, Operation::Encrypt, result)?;
        }
        Ok(())
    }

    async fn encrypt_supported(
        &self,
        step: Step,
        handle: &dyn DeterministicAead,
    ) -> Result<Vec<u8>, CaseFailure> {
        handle
            .encrypt_deterministically(&self.inputs.plaintext, &self.inputs.associated_data)
            .await
            .map_err(|err| {
                if err.is_unavailable() {
                    self.unavailable(step, handle.backend(), &err)
                } else {
                    CaseFailure::new(step, ConformanceError::SupportedBackendRejected {
                        template: self.template.name.clone(),
                        backend: handle.backend().clone(),
                        operation: Operation::Encrypt,
                        error: err,
                    })
                }
            })
    }

    fn expect_rejection(
        &self,
        step: Step,
        backend: &BackendId,
        operation: Operation,
        result: Result<Vec<u8>, PrimitiveError>,
    ) -> Result<(), CaseFailure> {
        match result {
            Ok(output) => Err(CaseFailure::new(step, ConformanceError::UnsupportedCapabilityLeak {
                template: self.template.name.clone(),
                backend: backend.clone(),
                operation,
                output,
            })),
            Err(err) if err.is_unavailable() => Err(self.unavailable(step, backend, &err)),
            Err(err) => {
                debug!(template = %self.template.name, %backend, %step, error = %err, "rejected as expected");
                Ok(())
            },
        }
    }

    fn unavailable(&self, step: Step, backend: &BackendId, err: &PrimitiveError) -> CaseFailure {
        CaseFailure::new(step, ConformanceError::BackendUnavailable {
            template: self.template.name.clone(),
            backend: backend.clone(),
            reason: err.to_string(),
        })
    }
}
