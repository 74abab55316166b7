//! Simulation harness for the Interlock conformance verifier.
//!
//! Simulated backends implement a keyed deterministic cipher behind the same
//! [`BackendService`](interlock_server::BackendService) interface a real
//! backend server uses, with injectable [`Fault`]s. They can be driven
//! in-memory through [`SimPool`] or over real QUIC through [`spawn_servers`].
//!
//! # Scenarios
//!
//! A [`Scenario`] declares a template, its backends and their faults, and
//! knows whether the verifier must reject it. Property tests generate
//! scenarios and compare the verdict against that expectation.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks properties every completed run must
//! satisfy. Use [`InvariantRegistry::standard()`] for all of them.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod cipher;
pub mod invariants;
pub mod keyset;
pub mod pool;
pub mod scenario;
pub mod servers;

pub use backend::{Fault, SimBackend};
pub use cipher::SimCipher;
pub use invariants::{
    EveryTemplateReported, InfrastructureFailuresNeedUnreachable, Invariant, InvariantRegistry,
    InvariantResult, NoSupportFailsAtPartition, RunSnapshot, UnreachableNeverPasses,
    VerdictMatchesFaults, Violation,
};
pub use keyset::SimKeyset;
pub use pool::SimPool;
pub use scenario::{FOREIGN_KEY_TYPE, Scenario, ScenarioBackend};
pub use servers::{ServerSet, spawn_servers};
