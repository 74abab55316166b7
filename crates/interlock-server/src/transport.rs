//! Quinn-based QUIC transport for backend test servers.
//!
//! Supports PEM certificates or a generated self-signed certificate. The
//! verifier does not authenticate test servers, so self-signed is the
//! normal case. ALPN is `interlock/1`.

use std::{net::SocketAddr, path::Path, sync::Arc};

use bytes::BytesMut;
use interlock_proto::{ALPN_PROTOCOL, Frame, FrameHeader};
use quinn::{Endpoint, RecvStream, SendStream, ServerConfig};

use crate::ServerError;

/// QUIC transport using Quinn.
///
/// Clones share one endpoint.
#[derive(Clone)]
pub struct QuinnTransport {
    endpoint: Endpoint,
}

impl QuinnTransport {
    /// Create and bind a new QUIC transport.
    ///
    /// If `cert_path` and `key_path` are both provided they are used for TLS.
    /// Otherwise a self-signed certificate is generated.
    pub fn bind(
        address: &str,
        cert_path: Option<&Path>,
        key_path: Option<&Path>,
    ) -> Result<Self, ServerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid bind address '{address}': {e}")))?;

        let server_config = match (cert_path, key_path) {
            (Some(cert), Some(key)) => load_tls_config(cert, key)?,
            _ => generate_self_signed_config()?,
        };

        let endpoint = Endpoint::server(server_config, addr)
            .map_err(|e| ServerError::Transport(format!("failed to create endpoint: {e}")))?;

        tracing::debug!(%addr, "QUIC transport bound");

        Ok(Self { endpoint })
    }

    /// Wait for the next connection.
    ///
    /// Returns `None` once the endpoint is closed.
    pub async fn accept(&self) -> Option<Result<quinn::Connection, ServerError>> {
        let incoming = self.endpoint.accept().await?;
        Some(
            incoming
                .await
                .map_err(|e| ServerError::Transport(format!("connection failed: {e}"))),
        )
    }

    /// Local address the transport is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.endpoint
            .local_addr()
            .map_err(|e| ServerError::Transport(format!("failed to get local address: {e}")))
    }

    /// Stop accepting and close every connection.
    pub fn close(&self) {
        self.endpoint.close(0u32.into(), b"shutdown");
    }

    /// Wait until every connection has finished closing.
    pub async fn wait_idle(&self) {
        self.endpoint.wait_idle().await;
    }
}

/// Read exactly one request frame.
pub(crate) async fn read_frame(recv: &mut RecvStream) -> Result<Frame, ServerError> {
    let mut buf = BytesMut::zeroed(FrameHeader::SIZE);
    recv.read_exact(&mut buf[..])
        .await
        .map_err(|e| ServerError::Transport(format!("header read failed: {e}")))?;

    let payload_size = FrameHeader::from_bytes(&buf)?.payload_size() as usize;

    if payload_size > 0 {
        buf.resize(FrameHeader::SIZE + payload_size, 0);
        recv.read_exact(&mut buf[FrameHeader::SIZE..])
            .await
            .map_err(|e| ServerError::Transport(format!("payload read failed: {e}")))?;
    }

    Ok(Frame::decode(&buf)?)
}

/// Write one response frame and finish the stream.
pub(crate) async fn write_frame(send: &mut SendStream, frame: &Frame) -> Result<(), ServerError> {
    let mut buf = Vec::with_capacity(frame.encoded_len());
    frame.encode(&mut buf)?;

    send.write_all(&buf)
        .await
        .map_err(|e| ServerError::Transport(format!("write failed: {e}")))?;
    send.finish().map_err(|e| ServerError::Transport(format!("finish failed: {e}")))?;

    Ok(())
}

/// Load TLS configuration from certificate and key files.
fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<ServerConfig, ServerError> {
    let cert_pem = std::fs::read(cert_path).map_err(|e| {
        ServerError::Config(format!("failed to read cert '{}': {e}", cert_path.display()))
    })?;

    let key_pem = std::fs::read(key_path).map_err(|e| {
        ServerError::Config(format!("failed to read key '{}': {e}", key_path.display()))
    })?;

    let certs = rustls_pemfile::certs(&mut &cert_pem[..])
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ServerError::Config(format!("failed to parse certificates: {e}")))?;

    let key = rustls_pemfile::private_key(&mut &key_pem[..])
        .map_err(|e| ServerError::Config(format!("failed to parse private key: {e}")))?
        .ok_or_else(|| ServerError::Config("no private key found".to_string()))?;

    let tls_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| ServerError::Config(format!("invalid TLS config: {e}")))?;

    quic_server_config(tls_config)
}

/// Generate a self-signed certificate for `localhost`.
fn generate_self_signed_config() -> Result<ServerConfig, ServerError> {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .map_err(|e| ServerError::Config(format!("failed to generate self-signed cert: {e}")))?;

    let cert_der = cert.cert.der().clone();
    let key = rustls::pki_types::PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());

    let tls_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der], key.into())
        .map_err(|e| ServerError::Config(format!("invalid TLS config: {e}")))?;

    quic_server_config(tls_config)
}

fn quic_server_config(mut tls_config: rustls::ServerConfig) -> Result<ServerConfig, ServerError> {
    tls_config.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];

    let quic = quinn::crypto::rustls::QuicServerConfig::try_from(tls_config)
        .map_err(|e| ServerError::Config(format!("QUIC config error: {e}")))?;

    Ok(ServerConfig::with_crypto(Arc::new(quic)))
}
