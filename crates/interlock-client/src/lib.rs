//! QUIC client side of the Interlock verifier.
//!
//! Talks to backend test servers over the `interlock/1` protocol: one request
//! frame per bidirectional stream, one response frame back.
//!
//! - [`BackendConnection`]: a connected server, safe for concurrent callers
//! - [`RemotePool`]: one cached connection per backend, implements
//!   [`interlock_core::BackendPool`]
//! - [`RemoteDaead`]: a backend bound to a keyset, implements
//!   [`interlock_core::DeterministicAead`]

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod config;
mod daead;
mod error;
mod pool;
mod transport;

pub use config::TransportConfig;
pub use daead::{RemoteDaead, primitive_error};
pub use error::TransportError;
pub use pool::RemotePool;
pub use transport::{BackendConnection, connect, connect_with_config};
