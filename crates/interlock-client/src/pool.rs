//! Connection pool over every configured backend.
//!
//! # Invariants
//!
//! - At most one cached connection per backend id.
//! - A connection is cached only after it answered a ping.
//! - A connection whose link fails (connect, stream or timeout) is evicted.
//!   Protocol and response mismatches leave it cached.
//! - A request that fails on a cached connection is retried once on a fresh
//!   one, so a backend restarted between runs is picked up transparently.

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use interlock_core::{
    BackendId, BackendPool, DeterministicAead, KeyTemplate, Keyset, PrimitiveError,
};
use interlock_proto::{
    Payload,
    payloads::keyset::{KeysetGenerate, TemplateDescriptor},
};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    BackendConnection, RemoteDaead, TransportConfig, TransportError, connect_with_config,
    daead::primitive_error,
};

/// Remote backends reachable over QUIC.
///
/// Shared by every concurrently running case; clones share the cache.
#[derive(Clone)]
pub struct RemotePool {
    inner: Arc<PoolInner>,
}

pub(crate) struct PoolInner {
    addresses: HashMap<BackendId, SocketAddr>,
    connections: Mutex<HashMap<BackendId, BackendConnection>>,
    config: TransportConfig,
}

impl RemotePool {
    /// Pool over `addresses`. Nothing connects until first use.
    pub fn new(
        addresses: impl IntoIterator<Item = (BackendId, SocketAddr)>,
        config: TransportConfig,
    ) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                addresses: addresses.into_iter().collect(),
                connections: Mutex::new(HashMap::new()),
                config,
            }),
        }
    }

    /// Configured backends.
    pub fn backends(&self) -> impl Iterator<Item = &BackendId> {
        self.inner.addresses.keys()
    }

    /// Number of live cached connections.
    pub async fn cached_connections(&self) -> usize {
        self.inner.connections.lock().await.len()
    }

    /// Connect to `backend` now if not already connected.
    pub async fn warm_up(&self, backend: &BackendId) -> Result<(), TransportError> {
        self.inner.connection(backend).await.map(|_| ())
    }

    /// Close and forget every cached connection.
    pub async fn close(&self) {
        let mut connections = self.inner.connections.lock().await;
        for (_, connection) in connections.drain() {
            connection.close();
        }
    }
}

impl std::fmt::Debug for RemotePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemotePool")
            .field("addresses", &self.inner.addresses)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl PoolInner {
    async fn cached(&self, backend: &BackendId) -> Option<BackendConnection> {
        self.connections.lock().await.get(backend).filter(|c| !c.is_closed()).cloned()
    }

    /// Cached connection, or a fresh one that answered a ping.
    async fn connection(&self, backend: &BackendId) -> Result<BackendConnection, TransportError> {
        if let Some(connection) = self.cached(backend).await {
            return Ok(connection);
        }

        let addr = *self
            .addresses
            .get(backend)
            .ok_or_else(|| TransportError::UnknownBackend(backend.clone()))?;

        debug!(%backend, %addr, "connecting");
        let connection = connect_with_config(addr, self.config).await?;
        connection.ping().await?;

        let mut connections = self.connections.lock().await;
        match connections.get(backend) {
            // Another case connected first; keep theirs.
            Some(existing) if !existing.is_closed() => {
                connection.close();
                Ok(existing.clone())
            },
            _ => {
                connections.insert(backend.clone(), connection.clone());
                Ok(connection)
            },
        }
    }

    /// Send `payload` to `backend`.
    ///
    /// A link failure on a cached connection evicts it and retries once on a
    /// fresh connection. Failures on the fresh connection are returned.
    pub(crate) async fn request(
        &self,
        backend: &BackendId,
        payload: Payload,
    ) -> Result<Payload, TransportError> {
        if let Some(cached) = self.cached(backend).await {
            match cached.request(payload.clone()).await {
                Err(err) if err.is_connection_failure() => {
                    warn!(%backend, error = %err, "cached connection failed, reconnecting");
                    self.evict(backend, &cached).await;
                },
                result => return result,
            }
        }

        let connection = self.connection(backend).await?;
        match connection.request(payload).await {
            Err(err) if err.is_connection_failure() => {
                warn!(%backend, error = %err, "request failed, evicting connection");
                self.evict(backend, &connection).await;
                Err(err)
            },
            result => result,
        }
    }

    async fn evict(&self, backend: &BackendId, failed: &BackendConnection) {
        let mut connections = self.connections.lock().await;
        if connections.get(backend).is_some_and(|c| c.stable_id() == failed.stable_id()) {
            connections.remove(backend);
        }
        failed.close();
    }
}

#[async_trait]
impl BackendPool for RemotePool {
    async fn new_keyset(
        &self,
        backend: &BackendId,
        template: &KeyTemplate,
    ) -> Result<Keyset, PrimitiveError> {
        let request = Payload::KeysetGenerate(KeysetGenerate {
            template: TemplateDescriptor {
                name: template.name.to_string(),
                key_type: template.key_type.clone(),
                key_size: template.key_size,
            },
        });

        match self.inner.request(backend, request).await? {
            Payload::KeysetGenerated(generated) => {
                Ok(Keyset::new(template.name.clone(), backend.clone(), generated.keyset))
            },
            Payload::Error(error) => Err(primitive_error(error)),
            other => Err(PrimitiveError::Unavailable(format!(
                "unexpected response {:?}",
                other.opcode()
            ))),
        }
    }

    async fn deterministic_aead(
        &self,
        backend: &BackendId,
        keyset: &Keyset,
    ) -> Result<Box<dyn DeterministicAead>, PrimitiveError> {
        self.inner.connection(backend).await?;
        Ok(Box::new(RemoteDaead::new(backend.clone(), keyset.clone(), Arc::clone(&self.inner))))
    }
}
