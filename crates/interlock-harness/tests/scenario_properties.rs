//! Property-based tests over generated scenarios.
//!
//! The verifier must pass a scenario exactly when none of its injected
//! faults is observable, for any template name, key size, backend layout
//! and seed.

use interlock_core::{ConformanceRunner, KeyTemplate};
use interlock_harness::{Fault, InvariantRegistry, RunSnapshot, Scenario};
use proptest::prelude::*;

fn fault_strategy() -> impl Strategy<Value = Fault> {
    prop_oneof![
        6 => Just(Fault::None),
        1 => Just(Fault::Divergent),
        1 => Just(Fault::NonDeterministic),
        1 => Just(Fault::Leaky),
        1 => Just(Fault::BrokenDecrypt),
        1 => Just(Fault::Unreachable),
    ]
}

fn template_strategy() -> impl Strategy<Value = KeyTemplate> {
    ("[A-Z][A-Z0-9_]{0,15}", 16u32..=64).prop_map(|(name, size)| KeyTemplate::new(name.as_str(), "AesSivKey", size))
}

fn scenario_strategy() -> impl Strategy<Value = Scenario> {
    (template_strategy(), prop::collection::vec((any::<bool>(), fault_strategy()), 1..6)).prop_map(
        |(template, backends)| {
            backends.into_iter().enumerate().fold(Scenario::new(template), |scenario, (i, (supported, fault))| {
                let id = format!("lang{i}");
                if supported { scenario.supported(id.as_str(), fault) } else { scenario.unsupported(id.as_str(), fault) }
            })
        },
    )
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().build().unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Run invariants hold for every generated scenario.
    #[test]
    fn prop_verdict_matches_faults(scenario in scenario_strategy(), seed in any::<u64>()) {
        let config = scenario.config().unwrap();
        let report = runtime().block_on(ConformanceRunner::new(config).run(&scenario.sim_pool(seed)));

        let snapshot = RunSnapshot::new(&scenario, report);
        let result = InvariantRegistry::standard().check_all(&snapshot);
        prop_assert!(result.is_ok(), "{:?}\n{}", result, snapshot.report);
    }

    /// Fault-free scenarios with at least one supporter always pass.
    #[test]
    fn prop_clean_scenarios_pass(template in template_strategy(), layout in prop::collection::vec(any::<bool>(), 0..5), seed in any::<u64>()) {
        let scenario = layout.into_iter().enumerate().fold(
            Scenario::new(template).supported("reference", Fault::None),
            |scenario, (i, supported)| {
                let id = format!("lang{i}");
                if supported { scenario.supported(id.as_str(), Fault::None) } else { scenario.unsupported(id.as_str(), Fault::None) }
            },
        );

        let config = scenario.config().unwrap();
        let report = runtime().block_on(ConformanceRunner::new(config).run(&scenario.sim_pool(seed)));
        prop_assert!(report.all_passed(), "{}", report);
    }
}
