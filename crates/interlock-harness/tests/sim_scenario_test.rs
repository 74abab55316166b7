//! Conformance runs against simulated backends.
//!
//! Each test injects one fault and checks the verifier reports it at the step
//! where it first becomes observable.

use interlock_core::{
    BackendId, ConformanceConfig, ConformanceError, ConformanceRunner, DecryptionMismatch,
    KeyTemplate, Operation, PrimitiveError, RunReport, Step, SupportMatrix, TemplateCatalog,
};
use interlock_harness::{Fault, InvariantRegistry, RunSnapshot, Scenario, SimBackend, SimPool};

async fn run(scenario: &Scenario, seed: u64) -> RunReport {
    let report = ConformanceRunner::new(scenario.config().unwrap()).run(&scenario.sim_pool(seed)).await;
    InvariantRegistry::standard().assert_all(&RunSnapshot::new(scenario, report.clone()), "after run");
    report
}

fn single_failure(report: &RunReport) -> (Step, ConformanceError) {
    assert_eq!(report.cases().len(), 1);
    let failure = report.cases()[0].failure().unwrap().clone();
    (failure.step, failure.error)
}

#[tokio::test]
async fn standard_scenario_passes() {
    let report = run(&Scenario::standard(), 1).await;
    assert!(report.all_passed(), "{report}");
    assert_eq!(report.passed(), 1);
}

#[tokio::test]
async fn single_supported_backend_passes() {
    let scenario = Scenario::new(KeyTemplate::aes256_siv()).supported("langA", Fault::None);
    assert!(run(&scenario, 2).await.all_passed());
}

#[tokio::test]
async fn divergent_backend_fails_cross_determinism() {
    let scenario = Scenario::standard().with_fault("langB", Fault::Divergent);
    let (step, error) = single_failure(&run(&scenario, 3).await);

    assert_eq!(step, Step::CrossDeterminism);
    let ConformanceError::DeterminismViolation { reference, backend, expected, actual, .. } = error
    else {
        panic!("unexpected error {error}");
    };
    assert_eq!(reference.as_str(), "langA");
    assert_eq!(backend.as_str(), "langB");
    assert_eq!(expected.len(), actual.len());
    assert_ne!(expected, actual);
}

#[tokio::test]
async fn lone_non_deterministic_backend_fails_idempotence() {
    let scenario = Scenario::new(KeyTemplate::aes256_siv())
        .supported("langA", Fault::NonDeterministic)
        .unsupported("langC", Fault::None);
    let (step, error) = single_failure(&run(&scenario, 4).await);

    assert_eq!(step, Step::Idempotence);
    assert!(matches!(error, ConformanceError::NonDeterministicBackend { ref backend, .. } if backend.as_str() == "langA"));
}

#[tokio::test]
async fn broken_decrypt_fails_cross_decryption() {
    let scenario = Scenario::standard().with_fault("langB", Fault::BrokenDecrypt);
    let (step, error) = single_failure(&run(&scenario, 5).await);

    assert_eq!(step, Step::CrossDecryption);
    let ConformanceError::CrossDecryptionFailure { producer, backend, mismatch, .. } = error else {
        panic!("unexpected error {error}");
    };
    assert_eq!(producer.as_str(), "langA");
    assert_eq!(backend.as_str(), "langB");
    assert!(matches!(mismatch, DecryptionMismatch::Rejected(PrimitiveError::Authentication(_))));
}

#[tokio::test]
async fn leaky_unsupported_backend_fails_reject_decryption() {
    let scenario = Scenario::standard().with_fault("langC", Fault::Leaky);
    let (step, error) = single_failure(&run(&scenario, 6).await);

    assert_eq!(step, Step::RejectDecryption);
    let ConformanceError::UnsupportedCapabilityLeak { backend, operation, output, .. } = error else {
        panic!("unexpected error {error}");
    };
    assert_eq!(backend.as_str(), "langC");
    assert_eq!(operation, Operation::Decrypt);
    assert!(output.starts_with(b"This is some plaintext message"));
}

#[tokio::test]
async fn unreachable_backend_is_infrastructure_failure() {
    let scenario = Scenario::standard().with_fault("langC", Fault::Unreachable);
    let report = run(&scenario, 7).await;

    let (step, error) = single_failure(&report);
    assert_eq!(step, Step::BindHandles);
    assert!(error.is_infrastructure());
    assert_eq!(error.backend().map(BackendId::as_str), Some("langC"));
    assert_eq!(report.infrastructure_failures(), 1);
}

#[tokio::test]
async fn unreachable_reference_fails_keyset_generation() {
    let scenario = Scenario::standard().with_fault("langA", Fault::Unreachable);
    let (step, error) = single_failure(&run(&scenario, 8).await);

    assert_eq!(step, Step::KeysetGeneration);
    assert!(matches!(error, ConformanceError::BackendUnavailable { ref backend, .. } if backend.as_str() == "langA"));
}

#[tokio::test]
async fn unsupported_reference_delegates_keyset_generation() {
    let scenario = Scenario::standard().reference("langC");
    let pool = scenario.sim_pool(9);

    let report = ConformanceRunner::new(scenario.config().unwrap()).run(&pool).await;
    assert!(report.all_passed(), "{report}");
    assert_eq!(pool.backend(&"langC".into()).map(SimBackend::calls), Some(2));
}

#[tokio::test]
async fn no_supported_backend_fails_at_partition() {
    let scenario = Scenario::new(KeyTemplate::aes256_siv())
        .unsupported("langA", Fault::None)
        .unsupported("langB", Fault::None);
    let pool = scenario.sim_pool(10);

    let report = ConformanceRunner::new(scenario.config().unwrap()).run(&pool).await;
    let (step, error) = single_failure(&report);
    assert_eq!(step, Step::Partition);
    assert!(matches!(error, ConformanceError::NoSupportedBackend { .. }));
    assert_eq!(pool.requests(&"langA".into()), 0);
}

#[tokio::test]
async fn failing_case_does_not_stop_others() {
    let siv = KeyTemplate::aes256_siv();
    let gcm = KeyTemplate::new("AES256_GCM", "AesGcmKey", 32);

    let matrix = SupportMatrix::new(["java", "go"].map(BackendId::from))
        .unwrap()
        .with("AES256_GCM", [BackendId::from("java"), BackendId::from("go")])
        .unwrap()
        .with("AES256_SIV", [BackendId::from("java"), BackendId::from("go")])
        .unwrap();
    let config =
        ConformanceConfig::new("java".into(), TemplateCatalog::new([gcm, siv]).unwrap(), matrix)
            .unwrap();

    // go only implements SIV, so the GCM case must fail and SIV still pass.
    let pool = SimPool::new([
        (BackendId::from("java"), SimBackend::conforming(["AesSivKey", "AesGcmKey"], 1)),
        (BackendId::from("go"), SimBackend::conforming(["AesSivKey"], 2)),
    ]);

    let report = ConformanceRunner::new(config).run(&pool).await;
    assert_eq!(report.cases()[0].template.as_str(), "AES256_GCM");
    assert_eq!(report.cases()[0].failure().map(|f| f.step), Some(Step::CrossDeterminism));
    assert!(report.cases()[1].is_pass());
    assert_eq!(report.to_string().lines().last(), Some("1 passed, 1 failed"));
}

#[tokio::test]
async fn seeds_change_keys_not_verdicts() {
    let scenario = Scenario::standard();
    for seed in [0, 1, u64::MAX] {
        assert!(run(&scenario, seed).await.all_passed());
    }
}
