//! Immutable verifier configuration.
//!
//! Passed explicitly to the runner. Nothing here is global state.

use thiserror::Error;

use crate::{BackendId, KeyTemplate, SupportMatrix, TemplateCatalog, TemplateName};

/// Cases allowed to run at once unless configured otherwise.
pub const DEFAULT_MAX_CONCURRENT_CASES: usize = 4;

/// Invalid catalog, matrix or configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Backend declared twice.
    #[error("backend {0} declared twice")]
    DuplicateBackend(BackendId),

    /// Template declared twice in the catalog or the matrix.
    #[error("key template {0} declared twice")]
    DuplicateTemplate(TemplateName),

    /// Matrix names a backend that was never declared.
    #[error("key template {template} names undeclared backend {backend}")]
    UnknownBackend {
        /// Template whose entry is invalid
        template: TemplateName,
        /// Undeclared backend
        backend: BackendId,
    },

    /// Matrix has no backends at all.
    #[error("no backends declared")]
    NoBackends,

    /// Reference backend is not one of the declared backends.
    #[error("reference backend {0} is not declared")]
    UnknownReferenceBackend(BackendId),

    /// Matrix declares a template the catalog does not describe.
    #[error("key template {0} has a support entry but no catalog entry")]
    UndeclaredTemplate(TemplateName),

    /// Concurrency limit of zero.
    #[error("max concurrent cases must be at least 1")]
    ZeroConcurrency,
}

/// Everything the runner needs, validated once up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConformanceConfig {
    reference_backend: BackendId,
    catalog: TemplateCatalog,
    matrix: SupportMatrix,
    max_concurrent_cases: usize,
}

impl ConformanceConfig {
    /// Validate and assemble a configuration.
    ///
    /// # Errors
    ///
    /// - `UnknownReferenceBackend` if the matrix does not declare `reference_backend`
    /// - `UndeclaredTemplate` if the matrix names a template missing from `catalog`
    pub fn new(
        reference_backend: BackendId,
        catalog: TemplateCatalog,
        matrix: SupportMatrix,
    ) -> Result<Self, ConfigError> {
        if !matrix.backends().contains(&reference_backend) {
            return Err(ConfigError::UnknownReferenceBackend(reference_backend));
        }

        if let Some((template, _)) = matrix.templates().find(|(t, _)| catalog.get(t).is_none()) {
            return Err(ConfigError::UndeclaredTemplate(template.clone()));
        }

        Ok(Self {
            reference_backend,
            catalog,
            matrix,
            max_concurrent_cases: DEFAULT_MAX_CONCURRENT_CASES,
        })
    }

    /// Override the concurrency limit.
    pub fn with_max_concurrent_cases(mut self, limit: usize) -> Result<Self, ConfigError> {
        if limit == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        self.max_concurrent_cases = limit;
        Ok(self)
    }

    /// The deployment the verifier was built for: four language backends,
    /// `java` as the keyset reference, `AES256_SIV` supported everywhere.
    pub fn standard() -> Result<Self, ConfigError> {
        let backends: Vec<BackendId> =
            ["cc", "go", "java", "python"].into_iter().map(BackendId::from).collect();
        let matrix = SupportMatrix::new(backends.clone())?
            .with(KeyTemplate::aes256_siv().name, backends)?;

        Self::new("java".into(), TemplateCatalog::standard(), matrix)
    }

    /// Backend asked to generate keysets when it supports the template.
    #[must_use]
    pub fn reference_backend(&self) -> &BackendId {
        &self.reference_backend
    }

    /// Templates to check, in run order.
    #[must_use]
    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    /// Declared support.
    #[must_use]
    pub fn matrix(&self) -> &SupportMatrix {
        &self.matrix
    }

    /// All declared backends.
    #[must_use]
    pub fn backends(&self) -> &[BackendId] {
        self.matrix.backends()
    }

    /// Upper bound on cases in flight.
    #[must_use]
    pub fn max_concurrent_cases(&self) -> usize {
        self.max_concurrent_cases
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_deployment() {
        let config = ConformanceConfig::standard().unwrap();
        assert_eq!(config.reference_backend().as_str(), "java");
        assert_eq!(config.backends().len(), 4);

        let supported = config.matrix().supported_backends(&"AES256_SIV".into()).unwrap();
        assert_eq!(supported.len(), 4);
        assert_eq!(config.max_concurrent_cases(), DEFAULT_MAX_CONCURRENT_CASES);
    }

    #[test]
    fn reference_must_be_declared() {
        let matrix = SupportMatrix::new([BackendId::from("go")]).unwrap();
        let err =
            ConformanceConfig::new("java".into(), TemplateCatalog::standard(), matrix).unwrap_err();
        assert_eq!(err, ConfigError::UnknownReferenceBackend("java".into()));
    }

    #[test]
    fn matrix_templates_need_catalog_entries() {
        let matrix = SupportMatrix::new([BackendId::from("go")])
            .unwrap()
            .with("AES128_SIV", [BackendId::from("go")])
            .unwrap();
        let err =
            ConformanceConfig::new("go".into(), TemplateCatalog::standard(), matrix).unwrap_err();
        assert_eq!(err, ConfigError::UndeclaredTemplate("AES128_SIV".into()));
    }

    #[test]
    fn zero_concurrency_rejected() {
        let config = ConformanceConfig::standard().unwrap();
        assert_eq!(config.with_max_concurrent_cases(0), Err(ConfigError::ZeroConcurrency));
    }
}
