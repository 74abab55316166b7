//! Interlock conformance core.
//!
//! Verifies that independent implementations of a deterministic AEAD
//! primitive agree byte-for-byte on every key template they claim to support,
//! and that the ones which do not claim support reject data produced by the
//! ones that do.
//!
//! # Architecture
//!
//! The core never touches the network and never performs cryptography. It
//! drives two traits:
//!
//! - [`DeterministicAead`]: one backend bound to one keyset
//! - [`BackendPool`]: generates keysets and binds handles
//!
//! Transports (QUIC in `interlock-client`, in-memory in `interlock-harness`)
//! implement them.
//!
//! ```text
//! ConformanceConfig ──► ConformanceRunner ──► ConformanceCase (per template)
//!   catalog + matrix          │                    │
//!                             ▼                    ▼
//!                        BackendPool ──────► DeterministicAead handles
//! ```
//!
//! # Components
//!
//! - [`SupportMatrix`]: declared template → supporting backends
//! - [`ConformanceCase`]: the ordered per-template check
//! - [`ConformanceRunner`]: runs every case, bounded concurrency, no
//!   short-circuit
//! - [`RunReport`]: aggregate outcome and serializable per-case records

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod case;
mod config;
mod error;
mod ids;
mod keyset;
mod matrix;
mod primitive;
mod report;
mod runner;
mod template;

#[cfg(test)]
pub(crate) mod mock;

pub use case::{
    CaseFailure, CaseInputs, ConformanceCase, NEGATIVE_ASSOCIATED_DATA, NEGATIVE_PLAINTEXT, Step,
};
pub use config::{ConfigError, ConformanceConfig, DEFAULT_MAX_CONCURRENT_CASES};
pub use error::{ConformanceError, DecryptionMismatch};
pub use ids::{BackendId, TemplateName};
pub use keyset::Keyset;
pub use matrix::{SupportMatrix, SupportSet};
pub use primitive::{BackendPool, DeterministicAead, Operation, PrimitiveError};
pub use report::{CaseRecord, CaseReport, CaseStatus, RunError, RunReport};
pub use runner::ConformanceRunner;
pub use template::{KeyTemplate, TemplateCatalog};
