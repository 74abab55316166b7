//! Declarative test scenarios.
//!
//! A scenario names one template and a list of backends, each declared
//! supported or unsupported and given a [`Fault`]. From it you get the
//! verifier configuration, the simulated backends, and an in-memory pool.
//!
//! ```ignore
//! let scenario = Scenario::standard().with_fault("langB", Fault::Divergent);
//! let report = ConformanceRunner::new(scenario.config()?).run(&scenario.sim_pool(7)).await;
//! ```

use interlock_core::{
    BackendId, ConfigError, ConformanceConfig, KeyTemplate, SupportMatrix, TemplateCatalog,
};

use crate::{Fault, SimBackend, SimPool};

/// Key type every unsupported simulated backend implements instead.
pub const FOREIGN_KEY_TYPE: &str = "AesGcmKey";

/// One backend in a scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioBackend {
    /// Backend id.
    pub id: BackendId,
    /// Declared support for the scenario template.
    pub supported: bool,
    /// Injected fault.
    pub fault: Fault,
}

/// A template, its backends, and the reference backend.
#[derive(Debug, Clone)]
pub struct Scenario {
    template: KeyTemplate,
    reference: Option<BackendId>,
    backends: Vec<ScenarioBackend>,
}

impl Scenario {
    /// Empty scenario for `template`.
    pub fn new(template: KeyTemplate) -> Self {
        Self { template, reference: None, backends: Vec::new() }
    }

    /// `AES256_SIV` with `langA` and `langB` supported, `langC` unsupported.
    pub fn standard() -> Self {
        Self::new(KeyTemplate::aes256_siv())
            .supported("langA", Fault::None)
            .supported("langB", Fault::None)
            .unsupported("langC", Fault::None)
    }

    /// Add a backend that claims the template.
    #[must_use]
    pub fn supported(mut self, id: impl Into<BackendId>, fault: Fault) -> Self {
        self.backends.push(ScenarioBackend { id: id.into(), supported: true, fault });
        self
    }

    /// Add a backend that does not claim the template.
    #[must_use]
    pub fn unsupported(mut self, id: impl Into<BackendId>, fault: Fault) -> Self {
        self.backends.push(ScenarioBackend { id: id.into(), supported: false, fault });
        self
    }

    /// Replace the fault of an existing backend.
    #[must_use]
    pub fn with_fault(mut self, id: impl Into<BackendId>, fault: Fault) -> Self {
        let id = id.into();
        for backend in &mut self.backends {
            if backend.id == id {
                backend.fault = fault;
            }
        }
        self
    }

    /// Use `id` as the keyset reference. Defaults to the first backend.
    #[must_use]
    pub fn reference(mut self, id: impl Into<BackendId>) -> Self {
        self.reference = Some(id.into());
        self
    }

    /// Template under test.
    pub fn template(&self) -> &KeyTemplate {
        &self.template
    }

    /// Backends in declaration order.
    pub fn backends(&self) -> &[ScenarioBackend] {
        &self.backends
    }

    /// Whether the scenario's faults must make the case fail.
    ///
    /// Faults on unsupported backends only matter when they make the backend
    /// accept the template or become unreachable. `Leaky` is harmless on a
    /// supported backend.
    pub fn expects_failure(&self) -> bool {
        let any_supported = self.backends.iter().any(|b| b.supported);
        !any_supported
            || self.backends.iter().any(|b| match (b.supported, b.fault) {
                (_, Fault::None) | (true, Fault::Leaky) => false,
                (true, _) => true,
                (false, fault) => matches!(fault, Fault::Leaky | Fault::Unreachable),
            })
    }

    /// Verifier configuration for the scenario.
    pub fn config(&self) -> Result<ConformanceConfig, ConfigError> {
        let ids = self.backends.iter().map(|b| b.id.clone());
        let supported = self.backends.iter().filter(|b| b.supported).map(|b| b.id.clone());
        let matrix = SupportMatrix::new(ids)?.with(self.template.name.clone(), supported)?;

        let reference = match &self.reference {
            Some(reference) => reference.clone(),
            None => self.backends.first().map(|b| b.id.clone()).ok_or(ConfigError::NoBackends)?,
        };

        ConformanceConfig::new(reference, TemplateCatalog::new([self.template.clone()])?, matrix)
    }

    /// Fresh simulated backends. Backend `i` is seeded with `seed + i`.
    pub fn sim_backends(&self, seed: u64) -> Vec<(BackendId, SimBackend)> {
        self.backends
            .iter()
            .enumerate()
            .map(|(i, b)| {
                let seed = seed.wrapping_add(i as u64);
                let key_type =
                    if b.supported { self.template.key_type.as_str() } else { FOREIGN_KEY_TYPE };
                (b.id.clone(), SimBackend::new([key_type], b.fault, seed))
            })
            .collect()
    }

    /// In-memory pool over fresh simulated backends.
    pub fn sim_pool(&self, seed: u64) -> SimPool {
        SimPool::new(self.sim_backends(seed))
    }
}
