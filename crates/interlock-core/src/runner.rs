//! Runs a case for every catalog template and aggregates the outcomes.
//!
//! Cases are independent: a failing or unreachable backend in one case never
//! stops the others. Up to `max_concurrent_cases` run at once; the report is
//! in catalog order regardless of completion order.

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use crate::{
    BackendId, BackendPool, CaseFailure, CaseReport, ConformanceCase, ConformanceConfig,
    ConformanceError, KeyTemplate, Keyset, Operation, RunReport, Step,
};

/// Drives every conformance case against a [`BackendPool`].
#[derive(Debug, Clone)]
pub struct ConformanceRunner {
    config: ConformanceConfig,
}

impl ConformanceRunner {
    /// Create a runner over a validated configuration.
    pub fn new(config: ConformanceConfig) -> Self {
        Self { config }
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &ConformanceConfig {
        &self.config
    }

    /// Run every case. Never short-circuits.
    pub async fn run<P: BackendPool + ?Sized>(&self, pool: &P) -> RunReport {
        let templates: Vec<(usize, &KeyTemplate)> = self.config.catalog().iter().enumerate().collect();
        info!(
            templates = templates.len(),
            backends = self.config.backends().len(),
            concurrency = self.config.max_concurrent_cases(),
            "starting conformance run"
        );

        let mut reports: Vec<(usize, CaseReport)> = stream::iter(templates)
            .map(|(index, template)| async move { (index, self.run_case(pool, template).await) })
            .buffer_unordered(self.config.max_concurrent_cases().max(1))
            .collect()
            .await;
        reports.sort_by_key(|(index, _)| *index);

        let report = RunReport::new(reports.into_iter().map(|(_, r)| r).collect());
        info!(passed = report.passed(), failed = report.failed(), "conformance run finished");
        report
    }

    /// Generate a keyset and run one template's case.
    pub async fn run_case<P: BackendPool + ?Sized>(
        &self,
        pool: &P,
        template: &KeyTemplate,
    ) -> CaseReport {
        info!(template = %template.name, "case started");

        let outcome = self.execute(pool, template).await;
        match &outcome {
            Ok(ciphertext) => {
                info!(template = %template.name, ciphertext_len = ciphertext.len(), "case passed");
            },
            Err(failure) if failure.error.is_infrastructure() => {
                error!(template = %template.name, step = %failure.step, error = %failure.error, "case aborted");
            },
            Err(failure) => {
                warn!(template = %template.name, step = %failure.step, error = %failure.error, "case failed");
            },
        }

        CaseReport { template: template.name.clone(), outcome: outcome.map(|_| ()) }
    }

    async fn execute<P: BackendPool + ?Sized>(
        &self,
        pool: &P,
        template: &KeyTemplate,
    ) -> Result<Vec<u8>, CaseFailure> {
        let source = self.keyset_source(template)?;
        let keyset = generate_keyset(pool, &source, template).await?;
        let case = ConformanceCase::new(template.clone(), keyset, self.config.matrix())?;
        case.run(pool).await
    }

    /// The reference backend when it supports `template`, else the first
    /// supporting backend in declaration order.
    fn keyset_source(&self, template: &KeyTemplate) -> Result<BackendId, CaseFailure> {
        let matrix = self.config.matrix();
        let supported = matrix
            .supported_backends(&template.name)
            .map_err(|error| CaseFailure::new(Step::Partition, error))?;

        let reference = self.config.reference_backend();
        if supported.contains(reference) {
            return Ok(reference.clone());
        }

        matrix.backends().iter().find(|b| supported.contains(*b)).cloned().ok_or_else(|| {
            CaseFailure::new(Step::Partition, ConformanceError::NoSupportedBackend {
                template: template.name.clone(),
            })
        })
    }
}

async fn generate_keyset<P: BackendPool + ?Sized>(
    pool: &P,
    source: &BackendId,
    template: &KeyTemplate,
) -> Result<Keyset, CaseFailure> {
    debug!(template = %template.name, backend = %source, step = %Step::KeysetGeneration, "generating keyset");
    pool.new_keyset(source, template).await.map_err(|err| {
        let error = if err.is_unavailable() {
            ConformanceError::BackendUnavailable {
                template: template.name.clone(),
                backend: source.clone(),
                reason: err.to_string(),
            }
        } else {
            ConformanceError::SupportedBackendRejected {
                template: template.name.clone(),
                backend: source.clone(),
                operation: Operation::GenerateKeyset,
                error: err,
            }
        };
        CaseFailure::new(Step::KeysetGeneration, error)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        SupportMatrix, TemplateCatalog,
        mock::{MockBackend, MockPool},
    };

    fn catalog() -> TemplateCatalog {
        TemplateCatalog::new([
            KeyTemplate::aes256_siv(),
            KeyTemplate::new("AES128_SIV", "AesSivKey", 32),
            KeyTemplate::new("AES512_SIV", "AesSivKey", 128),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn collects_every_case_in_catalog_order() {
        let pool = MockPool::new([
            ("langA", MockBackend::Conforming),
            ("langB", MockBackend::Conforming),
            ("langC", MockBackend::Unsupported),
        ]);
        let matrix = SupportMatrix::new(["langA", "langB", "langC"].map(BackendId::from))
            .unwrap()
            .with("AES256_SIV", ["langA", "langB"].map(BackendId::from))
            .unwrap()
            .with("AES128_SIV", Vec::new())
            .unwrap();
        let config = ConformanceConfig::new("langA".into(), catalog(), matrix)
            .unwrap()
            .with_max_concurrent_cases(3)
            .unwrap();

        let report = ConformanceRunner::new(config).run(&pool).await;

        let names: Vec<_> = report.cases().iter().map(|c| c.template.as_str()).collect();
        assert_eq!(names, ["AES256_SIV", "AES128_SIV", "AES512_SIV"]);

        assert!(report.cases()[0].is_pass());
        let no_support = report.cases()[1].failure().unwrap();
        assert!(matches!(no_support.error, ConformanceError::NoSupportedBackend { .. }));
        let unknown = report.cases()[2].failure().unwrap();
        assert!(matches!(unknown.error, ConformanceError::UnknownTemplate { .. }));

        assert_eq!(report.passed(), 1);
        assert!(report.into_result().is_err());
    }

    #[tokio::test]
    async fn report_order_ignores_completion_order() {
        let pool = MockPool::new([
            ("langA", MockBackend::Slow { template: "AES256_SIV" }),
            ("langB", MockBackend::Conforming),
        ]);
        let names = ["AES256_SIV", "AES128_SIV", "AES512_SIV"];
        let matrix = names
            .iter()
            .try_fold(SupportMatrix::new(["langA", "langB"].map(BackendId::from)).unwrap(), |m, name| {
                m.with(*name, ["langA", "langB"].map(BackendId::from))
            })
            .unwrap();
        let config = ConformanceConfig::new("langA".into(), catalog(), matrix)
            .unwrap()
            .with_max_concurrent_cases(3)
            .unwrap();

        let report = ConformanceRunner::new(config).run(&pool).await;

        assert_eq!(pool.issued(), ["AES128_SIV", "AES512_SIV", "AES256_SIV"]);
        let reported: Vec<_> = report.cases().iter().map(|c| c.template.as_str()).collect();
        assert_eq!(reported, names);
        assert!(report.all_passed(), "{report}");
    }

    #[tokio::test]
    async fn keyset_falls_back_to_first_supporter() {
        let pool = MockPool::new([
            ("langA", MockBackend::Unsupported),
            ("langB", MockBackend::Conforming),
        ]);
        let matrix = SupportMatrix::new(["langA", "langB"].map(BackendId::from))
            .unwrap()
            .with("AES256_SIV", [BackendId::from("langB")])
            .unwrap();
        let config =
            ConformanceConfig::new("langA".into(), TemplateCatalog::standard(), matrix).unwrap();
        let runner = ConformanceRunner::new(config);

        assert_eq!(runner.keyset_source(&KeyTemplate::aes256_siv()).unwrap().as_str(), "langB");
        assert!(runner.run(&pool).await.all_passed());
    }

    #[tokio::test]
    async fn unreachable_reference_fails_only_keyset_generation() {
        let pool = MockPool::new([("java", MockBackend::Unreachable)]);
        let matrix = SupportMatrix::new([BackendId::from("java")])
            .unwrap()
            .with("AES256_SIV", [BackendId::from("java")])
            .unwrap();
        let config =
            ConformanceConfig::new("java".into(), TemplateCatalog::standard(), matrix).unwrap();

        let report = ConformanceRunner::new(config).run(&pool).await;
        let failure = report.cases()[0].failure().unwrap();
        assert_eq!(failure.step, Step::KeysetGeneration);
        assert!(failure.error.is_infrastructure());
        assert_eq!(report.infrastructure_failures(), 1);
    }
}
