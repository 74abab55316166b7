//! Declared support matrix.
//!
//! Capability is declared, never probed: a backend is "unsupported" for a
//! template exactly when the matrix says so. The negative checks rely on
//! this, since probing would let a backend that silently accepts foreign
//! data classify itself as supported.

use std::collections::{BTreeMap, BTreeSet};

use crate::{BackendId, ConfigError, ConformanceError, TemplateName};

/// Partition of every known backend for one template.
///
/// # Invariants
///
/// - `supported ∪ unsupported` = all declared backends
/// - `supported ∩ unsupported` = ∅
/// - Both lists keep the matrix's backend declaration order
///
/// `supported` may be empty here; the case rejects that before running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportSet {
    /// Backends that claim the template.
    pub supported: Vec<BackendId>,
    /// Every other known backend.
    pub unsupported: Vec<BackendId>,
}

/// Template name → backends that claim to support it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportMatrix {
    backends: Vec<BackendId>,
    entries: BTreeMap<TemplateName, BTreeSet<BackendId>>,
}

impl SupportMatrix {
    /// Create an empty matrix over the given backends.
    pub fn new(backends: impl IntoIterator<Item = BackendId>) -> Result<Self, ConfigError> {
        let mut declared = Vec::new();
        for backend in backends {
            if declared.contains(&backend) {
                return Err(ConfigError::DuplicateBackend(backend));
            }
            declared.push(backend);
        }

        if declared.is_empty() {
            return Err(ConfigError::NoBackends);
        }

        Ok(Self { backends: declared, entries: BTreeMap::new() })
    }

    /// Declare which backends support `template`.
    ///
    /// Every named backend must be one of the matrix's backends. An empty
    /// list is accepted; the template's case will fail with
    /// `NoSupportedBackend`.
    pub fn declare(
        &mut self,
        template: TemplateName,
        supported: impl IntoIterator<Item = BackendId>,
    ) -> Result<(), ConfigError> {
        if self.entries.contains_key(&template) {
            return Err(ConfigError::DuplicateTemplate(template));
        }

        let mut set = BTreeSet::new();
        for backend in supported {
            if !self.backends.contains(&backend) {
                return Err(ConfigError::UnknownBackend { template, backend });
            }
            set.insert(backend);
        }

        self.entries.insert(template, set);
        Ok(())
    }

    /// Builder form of [`Self::declare`].
    pub fn with(
        mut self,
        template: impl Into<TemplateName>,
        supported: impl IntoIterator<Item = BackendId>,
    ) -> Result<Self, ConfigError> {
        self.declare(template.into(), supported)?;
        Ok(self)
    }

    /// All known backends in declaration order.
    #[must_use]
    pub fn backends(&self) -> &[BackendId] {
        &self.backends
    }

    /// Declared templates and their supporting backends.
    pub fn templates(&self) -> impl Iterator<Item = (&TemplateName, &BTreeSet<BackendId>)> {
        self.entries.iter()
    }

    /// Backends that claim to support `template`.
    ///
    /// # Errors
    ///
    /// - `UnknownTemplate` if the matrix has no entry for `template`
    pub fn supported_backends(
        &self,
        template: &TemplateName,
    ) -> Result<&BTreeSet<BackendId>, ConformanceError> {
        self.entries
            .get(template)
            .ok_or_else(|| ConformanceError::UnknownTemplate { template: template.clone() })
    }

    /// Split all backends into supported and unsupported for `template`.
    ///
    /// # Errors
    ///
    /// - `UnknownTemplate` if the matrix has no entry for `template`
    pub fn partition(&self, template: &TemplateName) -> Result<SupportSet, ConformanceError> {
        let supported_set = self.supported_backends(template)?;

        let (supported, unsupported): (Vec<_>, Vec<_>) =
            self.backends.iter().cloned().partition(|backend| supported_set.contains(backend));

        Ok(SupportSet { supported, unsupported })
    }
}
