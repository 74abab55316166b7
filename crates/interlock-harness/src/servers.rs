//! Real QUIC test servers for end-to-end tests.

use std::{net::SocketAddr, time::Duration};

use interlock_core::BackendId;
use interlock_server::{BackendServer, BackendServerConfig, ServerError, ShutdownHandle};
use tokio::task::JoinHandle;

use crate::{Fault, SimBackend};

/// Attempts to rebind a restarted server while the old socket drains.
const REBIND_ATTEMPTS: u32 = 100;
const REBIND_INTERVAL: Duration = Duration::from_millis(20);

/// Running servers, one per backend.
///
/// Dropping the set shuts every server down, closing its open connections.
pub struct ServerSet {
    addresses: Vec<(BackendId, SocketAddr)>,
    running: Vec<RunningServer>,
}

struct RunningServer {
    backend: BackendId,
    handle: ShutdownHandle,
    task: JoinHandle<()>,
}

impl RunningServer {
    fn start(backend: BackendId, server: BackendServer<SimBackend>) -> Self {
        let handle = server.shutdown_handle();
        let backend_id = backend.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = server.run().await {
                tracing::warn!(backend = %backend_id, error = %e, "test server stopped");
            }
        });
        Self { backend, handle, task }
    }

    fn stop(&self) {
        self.handle.shutdown();
        self.task.abort();
    }
}

impl ServerSet {
    /// Backend id and address of every server, in spawn order.
    pub fn addresses(&self) -> &[(BackendId, SocketAddr)] {
        &self.addresses
    }

    /// Address of one backend.
    pub fn addr(&self, backend: &BackendId) -> Option<SocketAddr> {
        self.addresses.iter().find(|(id, _)| id == backend).map(|(_, addr)| *addr)
    }

    /// Shut down `backend`'s server and start a fresh one built by
    /// `replacement` on the same address.
    ///
    /// Clients holding a connection to the old server see it closed.
    pub async fn restart(
        &mut self,
        backend: &BackendId,
        replacement: impl Fn() -> SimBackend,
    ) -> Result<(), ServerError> {
        let addr = self
            .addr(backend)
            .ok_or_else(|| ServerError::Config(format!("no server for backend {backend}")))?;

        if let Some(pos) = self.running.iter().position(|r| &r.backend == backend) {
            let old = self.running.swap_remove(pos);
            old.stop();
            old.handle.stopped().await;
        }

        let config = BackendServerConfig { bind_address: addr.to_string(), ..Default::default() };
        let server = rebind(config, replacement).await?;
        tracing::debug!(%backend, %addr, "test server restarted");
        self.running.push(RunningServer::start(backend.clone(), server));
        Ok(())
    }
}

impl Drop for ServerSet {
    fn drop(&mut self) {
        for server in &self.running {
            server.stop();
        }
    }
}

/// Bind `config`, retrying while the previous endpoint still holds the port.
async fn rebind(
    config: BackendServerConfig,
    backend: impl Fn() -> SimBackend,
) -> Result<BackendServer<SimBackend>, ServerError> {
    let mut attempt = 0;
    loop {
        match BackendServer::bind(config.clone(), backend()) {
            Ok(server) => return Ok(server),
            Err(ServerError::Transport(reason)) if attempt < REBIND_ATTEMPTS => {
                tracing::trace!(attempt, %reason, "address still in use");
                attempt += 1;
                tokio::time::sleep(REBIND_INTERVAL).await;
            },
            Err(e) => return Err(e),
        }
    }
}

/// Start one [`BackendServer`] per backend on `127.0.0.1:0`.
///
/// A backend with [`Fault::Unreachable`] gets an address whose server was
/// bound and immediately shut down, so nothing answers there.
pub async fn spawn_servers(
    backends: impl IntoIterator<Item = (BackendId, SimBackend)>,
) -> Result<ServerSet, ServerError> {
    let mut addresses = Vec::new();
    let mut running = Vec::new();

    for (id, backend) in backends {
        let unreachable = backend.fault() == Fault::Unreachable;
        let server = BackendServer::bind(BackendServerConfig::default(), backend)?;
        let addr = server.local_addr()?;

        if unreachable {
            drop(server);
        } else {
            running.push(RunningServer::start(id.clone(), server));
        }

        tracing::debug!(backend = %id, %addr, unreachable, "test server spawned");
        addresses.push((id, addr));
    }

    Ok(ServerSet { addresses, running })
}
