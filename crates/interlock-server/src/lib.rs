//! Interlock backend test-server runtime.
//!
//! A backend exposes its deterministic AEAD implementation to the verifier
//! by implementing [`BackendService`] and running a [`BackendServer`]. The
//! server owns the QUIC endpoint; request handling is the pure [`dispatch`]
//! function.
//!
//! # Components
//!
//! - [`BackendService`]: the implementation under test
//! - [`dispatch`]: request payload → response payload (no I/O)
//! - [`BackendServer`]: accepts connections, one task per stream
//! - [`ShutdownHandle`]: stops a running server from another task
//! - [`QuinnTransport`]: QUIC endpoint with PEM or self-signed certificates

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod service;
mod transport;

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

pub use error::ServerError;
use interlock_proto::{ErrorPayload, Payload};
pub use service::{BackendService, ServiceError, dispatch};
pub use transport::QuinnTransport;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct BackendServerConfig {
    /// Address to bind to (e.g., "127.0.0.1:0")
    pub bind_address: String,
    /// Path to TLS certificate (PEM format)
    pub cert_path: Option<PathBuf>,
    /// Path to TLS private key (PEM format)
    pub key_path: Option<PathBuf>,
}

impl Default for BackendServerConfig {
    fn default() -> Self {
        Self { bind_address: "127.0.0.1:0".to_string(), cert_path: None, key_path: None }
    }
}

/// A running backend test server.
pub struct BackendServer<S: BackendService> {
    service: Arc<S>,
    transport: QuinnTransport,
}

impl<S: BackendService> BackendServer<S> {
    /// Bind the endpoint. Does not accept connections until [`Self::run`].
    pub fn bind(config: BackendServerConfig, service: S) -> Result<Self, ServerError> {
        if config.cert_path.is_none() || config.key_path.is_none() {
            tracing::debug!("no TLS certificate configured, using self-signed certificate");
        }

        let transport = QuinnTransport::bind(
            &config.bind_address,
            config.cert_path.as_deref(),
            config.key_path.as_deref(),
        )?;

        Ok(Self { service: Arc::new(service), transport })
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.transport.local_addr()
    }

    /// Handle that stops this server once it is running.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle { transport: self.transport.clone() }
    }

    /// Accept connections until the endpoint closes.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!(addr = %self.transport.local_addr()?, "backend server starting");

        while let Some(accepted) = self.transport.accept().await {
            match accepted {
                Ok(connection) => {
                    let service = Arc::clone(&self.service);
                    tokio::spawn(handle_connection(connection, service));
                },
                Err(e) => tracing::warn!(error = %e, "accept failed"),
            }
        }

        tracing::info!("backend server stopped");
        Ok(())
    }
}

/// Stops a [`BackendServer`] from outside its run loop.
///
/// Shutting down closes every open connection, so clients see the close
/// instead of a silent peer. [`BackendServer::run`] returns afterwards.
#[derive(Clone)]
pub struct ShutdownHandle {
    transport: QuinnTransport,
}

impl ShutdownHandle {
    /// Close the endpoint and every connection on it.
    pub fn shutdown(&self) {
        tracing::debug!("backend server shutting down");
        self.transport.close();
    }

    /// Wait until every closed connection has drained.
    pub async fn stopped(&self) {
        self.transport.wait_idle().await;
    }
}

/// Serve every bidirectional stream of one connection.
async fn handle_connection<S: BackendService>(connection: quinn::Connection, service: Arc<S>) {
    let remote = connection.remote_address();
    tracing::debug!(%remote, "connection accepted");

    loop {
        match connection.accept_bi().await {
            Ok((send, recv)) => {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    if let Err(e) = handle_stream(send, recv, service.as_ref()).await {
                        tracing::warn!(%remote, error = %e, "stream failed");
                    }
                });
            },
            Err(e) => {
                tracing::debug!(%remote, reason = %e, "connection closed");
                break;
            },
        }
    }
}

/// One request, one response.
async fn handle_stream<S: BackendService>(
    mut send: quinn::SendStream,
    mut recv: quinn::RecvStream,
    service: &S,
) -> Result<(), ServerError> {
    let request = transport::read_frame(&mut recv).await?;
    let request_id = request.header.request_id();

    let response = match Payload::from_frame(&request) {
        Ok(payload) => dispatch(service, payload),
        Err(e) => {
            tracing::warn!(request_id, error = %e, "malformed request payload");
            Payload::Error(ErrorPayload::invalid_request(e.to_string()))
        },
    };

    let frame = response.into_frame(request_id)?;
    transport::write_frame(&mut send, &frame).await
}
