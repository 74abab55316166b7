//! Per-case outcomes and the aggregate run report.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{CaseFailure, Step, TemplateName};

/// Outcome of one template's case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseReport {
    /// Template that was checked.
    pub template: TemplateName,
    /// `Ok` on pass, the first violated assertion otherwise.
    pub outcome: Result<(), CaseFailure>,
}

impl CaseReport {
    /// Passing report.
    pub fn passed(template: TemplateName) -> Self {
        Self { template, outcome: Ok(()) }
    }

    /// Failing report.
    pub fn failed(template: TemplateName, failure: CaseFailure) -> Self {
        Self { template, outcome: Err(failure) }
    }

    /// Whether the case passed.
    #[must_use]
    pub fn is_pass(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Failure, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&CaseFailure> {
        self.outcome.as_ref().err()
    }

    /// Flatten into the exported record.
    #[must_use]
    pub fn to_record(&self) -> CaseRecord {
        match &self.outcome {
            Ok(()) => CaseRecord {
                template: self.template.clone(),
                status: CaseStatus::Pass,
                failing_step: None,
                details: None,
            },
            Err(failure) => CaseRecord {
                template: self.template.clone(),
                status: CaseStatus::Fail,
                failing_step: Some(failure.step),
                details: Some(failure.error.to_string()),
            },
        }
    }
}

/// Pass or fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    /// Every assertion held.
    Pass,
    /// An assertion failed or a backend was unreachable.
    Fail,
}

/// Exported result record: `{template, status, failing_step?, details?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    /// Template that was checked.
    pub template: TemplateName,
    /// Pass or fail.
    pub status: CaseStatus,
    /// Step that failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failing_step: Option<Step>,
    /// Rendered error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// The run failed because at least one case failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    /// Some cases failed.
    #[error("{failed} of {total} conformance cases failed")]
    CasesFailed {
        /// Failing cases
        failed: usize,
        /// All cases
        total: usize,
    },
}

/// Every case's outcome, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunReport {
    cases: Vec<CaseReport>,
}

impl RunReport {
    /// Wrap case reports. Order is kept.
    pub fn new(cases: Vec<CaseReport>) -> Self {
        Self { cases }
    }

    /// All case reports.
    #[must_use]
    pub fn cases(&self) -> &[CaseReport] {
        &self.cases
    }

    /// Number of passing cases.
    #[must_use]
    pub fn passed(&self) -> usize {
        self.cases.iter().filter(|c| c.is_pass()).count()
    }

    /// Number of failing cases.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.cases.len() - self.passed()
    }

    /// Number of failures caused by unreachable backends.
    #[must_use]
    pub fn infrastructure_failures(&self) -> usize {
        self.cases
            .iter()
            .filter_map(CaseReport::failure)
            .filter(|f| f.error.is_infrastructure())
            .count()
    }

    /// True when every case passed. An empty run passes.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }

    /// Exported records in catalog order.
    #[must_use]
    pub fn records(&self) -> Vec<CaseRecord> {
        self.cases.iter().map(CaseReport::to_record).collect()
    }

    /// `Ok` with the report when every case passed.
    pub fn into_result(self) -> Result<Self, RunError> {
        if self.all_passed() {
            Ok(self)
        } else {
            Err(RunError::CasesFailed { failed: self.failed(), total: self.cases.len() })
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for case in &self.cases {
            match &case.outcome {
                Ok(()) => writeln!(f, "PASS {}", case.template)?,
                Err(failure) => writeln!(f, "FAIL {} [{}] {}", case.template, failure.step, failure.error)?,
            }
        }
        write!(f, "{} passed, {} failed", self.passed(), self.failed())
    }
}
