//! Invariant checks over completed conformance runs.
//!
//! A [`RunSnapshot`] pairs a [`RunReport`] with what the scenario that
//! produced it declared. Registered [`Invariant`]s then check properties
//! every run must satisfy, whatever faults were injected.
//!
//! ```ignore
//! let report = runner.run(&scenario.sim_pool(seed)).await;
//! InvariantRegistry::standard().assert_all(&RunSnapshot::new(&scenario, report), "seed 7");
//! ```

use std::fmt;

use interlock_core::{BackendId, ConformanceError, RunReport, Step, TemplateName};

use crate::{Fault, Scenario};

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// Observable outcome of one run plus the scenario's declarations.
#[derive(Debug, Clone)]
pub struct RunSnapshot {
    /// Templates in the order they were configured.
    pub templates: Vec<TemplateName>,
    /// Backends that never answer.
    pub unreachable: Vec<BackendId>,
    /// Whether any backend claimed the template.
    pub any_supported: bool,
    /// Whether the injected faults must fail the run.
    pub expects_failure: bool,
    /// The run's report.
    pub report: RunReport,
}

impl RunSnapshot {
    /// Snapshot of `report` produced by running `scenario`.
    pub fn new(scenario: &Scenario, report: RunReport) -> Self {
        let backends = scenario.backends();
        Self {
            templates: vec![scenario.template().name.clone()],
            unreachable: backends
                .iter()
                .filter(|b| b.fault == Fault::Unreachable)
                .map(|b| b.id.clone())
                .collect(),
            any_supported: backends.iter().any(|b| b.supported),
            expects_failure: scenario.expects_failure(),
            report,
        }
    }
}

/// A property that must hold for every run.
pub trait Invariant: Send + Sync {
    /// Invariant name for error reporting.
    fn name(&self) -> &'static str;

    /// Check the invariant against a completed run.
    fn check(&self, state: &RunSnapshot) -> InvariantResult;
}

/// Registry of invariants to check.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Registry with every invariant in this module.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(EveryTemplateReported);
        registry.add(VerdictMatchesFaults);
        registry.add(UnreachableNeverPasses);
        registry.add(InfrastructureFailuresNeedUnreachable);
        registry.add(NoSupportFailsAtPartition);
        registry
    }

    /// Add an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants.
    ///
    /// Returns `Ok(())` if all hold, or every violation found.
    pub fn check_all(&self, state: &RunSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Check all invariants, panicking with every violation.
    ///
    /// # Panics
    ///
    /// If any invariant is violated.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, state: &RunSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("Invariant violation {context}:\n  {}\n{}", messages.join("\n  "), state.report);
        }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}

/// The report has exactly one case per configured template, in order.
pub struct EveryTemplateReported;

impl Invariant for EveryTemplateReported {
    fn name(&self) -> &'static str {
        "every_template_reported"
    }

    fn check(&self, state: &RunSnapshot) -> InvariantResult {
        let reported: Vec<&TemplateName> = state.report.cases().iter().map(|c| &c.template).collect();
        let expected: Vec<&TemplateName> = state.templates.iter().collect();

        if reported != expected {
            return Err(Violation {
                invariant: self.name(),
                message: format!("expected cases {expected:?}, report has {reported:?}"),
            });
        }
        if state.report.passed() + state.report.failed() != state.report.cases().len() {
            return Err(Violation {
                invariant: self.name(),
                message: "passed and failed counts do not add up".to_string(),
            });
        }
        Ok(())
    }
}

/// A run passes exactly when no injected fault should be observable.
pub struct VerdictMatchesFaults;

impl Invariant for VerdictMatchesFaults {
    fn name(&self) -> &'static str {
        "verdict_matches_faults"
    }

    fn check(&self, state: &RunSnapshot) -> InvariantResult {
        if state.report.all_passed() == state.expects_failure {
            return Err(Violation {
                invariant: self.name(),
                message: format!(
                    "expected {}, run {}",
                    if state.expects_failure { "failure" } else { "success" },
                    if state.report.all_passed() { "passed" } else { "failed" },
                ),
            });
        }
        Ok(())
    }
}

/// Every backend takes part in every case, so one that never answers fails
/// all of them.
pub struct UnreachableNeverPasses;

impl Invariant for UnreachableNeverPasses {
    fn name(&self) -> &'static str {
        "unreachable_never_passes"
    }

    fn check(&self, state: &RunSnapshot) -> InvariantResult {
        if state.unreachable.is_empty() {
            return Ok(());
        }
        match state.report.cases().iter().find(|c| c.is_pass()) {
            Some(case) => Err(Violation {
                invariant: self.name(),
                message: format!(
                    "{} passed although {:?} never answer",
                    case.template, state.unreachable
                ),
            }),
            None => Ok(()),
        }
    }
}

/// `BackendUnavailable` only ever names a backend that really is unreachable.
pub struct InfrastructureFailuresNeedUnreachable;

impl Invariant for InfrastructureFailuresNeedUnreachable {
    fn name(&self) -> &'static str {
        "infrastructure_failures_need_unreachable"
    }

    fn check(&self, state: &RunSnapshot) -> InvariantResult {
        for case in state.report.cases() {
            let Some(failure) = case.failure() else { continue };
            if let ConformanceError::BackendUnavailable { backend, .. } = &failure.error {
                if !state.unreachable.contains(backend) {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!("{}: reachable backend {backend} reported unavailable", case.template),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Without a supporting backend a case can only fail at partitioning.
pub struct NoSupportFailsAtPartition;

impl Invariant for NoSupportFailsAtPartition {
    fn name(&self) -> &'static str {
        "no_support_fails_at_partition"
    }

    fn check(&self, state: &RunSnapshot) -> InvariantResult {
        if state.any_supported {
            return Ok(());
        }
        for case in state.report.cases() {
            let step = case.failure().map(|f| f.step);
            if step != Some(Step::Partition) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("{} without support ended at {step:?}", case.template),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use interlock_core::{CaseFailure, CaseReport};

    use super::*;

    fn snapshot(scenario: &Scenario, outcome: Result<(), CaseFailure>) -> RunSnapshot {
        let template = scenario.template().name.clone();
        RunSnapshot::new(scenario, RunReport::new(vec![CaseReport { template, outcome }]))
    }

    #[test]
    fn standard_registry_has_invariants() {
        let registry = InvariantRegistry::standard();
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn clean_pass_satisfies_everything() {
        let state = snapshot(&Scenario::standard(), Ok(()));
        assert!(InvariantRegistry::standard().check_all(&state).is_ok());
    }

    #[test]
    fn pass_with_unreachable_backend_is_flagged() {
        let scenario = Scenario::standard().with_fault("langC", Fault::Unreachable);
        let violations = InvariantRegistry::standard().check_all(&snapshot(&scenario, Ok(()))).unwrap_err();

        let names: Vec<_> = violations.iter().map(|v| v.invariant).collect();
        assert!(names.contains(&"unreachable_never_passes"));
        assert!(names.contains(&"verdict_matches_faults"));
    }

    #[test]
    fn unavailable_reachable_backend_is_flagged() {
        let failure = CaseFailure::new(
            Step::BindHandles,
            ConformanceError::BackendUnavailable {
                template: "AES256_SIV".into(),
                backend: "langB".into(),
                reason: "timeout".into(),
            },
        );
        let state = snapshot(&Scenario::standard(), Err(failure));
        let violations = InvariantRegistry::standard().check_all(&state).unwrap_err();
        assert!(violations.iter().any(|v| v.invariant == "infrastructure_failures_need_unreachable"));
    }

    #[test]
    fn missing_case_is_flagged() {
        let state = RunSnapshot::new(&Scenario::standard(), RunReport::new(Vec::new()));
        let err = EveryTemplateReported.check(&state).unwrap_err();
        assert!(err.message.contains("AES256_SIV"));
    }
}
