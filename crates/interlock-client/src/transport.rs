//! QUIC transport to one backend test server.
//!
//! Each request opens its own bidirectional stream, writes a single frame,
//! finishes the send side and reads a single response frame. Streams are
//! independent, so one connection serves any number of concurrent callers.

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use bytes::BytesMut;
use interlock_proto::{ALPN_PROTOCOL, Frame, FrameHeader, Opcode, Payload};
use quinn::{ClientConfig, Connection, Endpoint, RecvStream, SendStream};
use tracing::debug;

use crate::{TransportConfig, TransportError};

/// A live connection to a backend test server.
///
/// Cheap to clone. Clones share the connection and the request id counter.
#[derive(Clone)]
pub struct BackendConnection {
    addr: SocketAddr,
    connection: Connection,
    // Keeps the client endpoint alive for as long as any clone exists.
    _endpoint: Endpoint,
    next_request_id: Arc<AtomicU32>,
    config: TransportConfig,
}

impl std::fmt::Debug for BackendConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConnection")
            .field("addr", &self.addr)
            .field("stable_id", &self.connection.stable_id())
            .finish_non_exhaustive()
    }
}

/// Connect with [`TransportConfig::development`] timeouts.
pub async fn connect(server_addr: &str) -> Result<BackendConnection, TransportError> {
    let addr: SocketAddr = server_addr
        .parse()
        .map_err(|e| TransportError::Connection(format!("invalid address: {e}")))?;
    connect_with_config(addr, TransportConfig::development()).await
}

/// Connect to a backend test server.
pub async fn connect_with_config(
    addr: SocketAddr,
    config: TransportConfig,
) -> Result<BackendConnection, TransportError> {
    let client_config = insecure_client_config(config.idle_timeout)?;
    let bind: SocketAddr = if addr.is_ipv6() {
        SocketAddr::from(([0u16; 8], 0))
    } else {
        SocketAddr::from(([0, 0, 0, 0], 0))
    };
    let mut endpoint = Endpoint::client(bind)
        .map_err(|e| TransportError::Connection(format!("endpoint creation failed: {e}")))?;
    endpoint.set_default_client_config(client_config);

    let connecting = endpoint
        .connect(addr, "localhost")
        .map_err(|e| TransportError::Connection(format!("connect failed: {e}")))?;

    let connection = tokio::time::timeout(config.connect_timeout, connecting)
        .await
        .map_err(|_| timeout("connect", config.connect_timeout))?
        .map_err(|e| TransportError::Connection(format!("connection failed: {e}")))?;

    debug!(%addr, stable_id = connection.stable_id(), "connected to backend");

    Ok(BackendConnection {
        addr,
        connection,
        _endpoint: endpoint,
        next_request_id: Arc::new(AtomicU32::new(1)),
        config,
    })
}

impl BackendConnection {
    /// Server address.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Identifier of the underlying QUIC connection.
    #[must_use]
    pub fn stable_id(&self) -> usize {
        self.connection.stable_id()
    }

    /// Whether the underlying QUIC connection has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.connection.close_reason().is_some()
    }

    /// Send one request and wait for its response.
    ///
    /// An error payload from the server is a successful exchange and is
    /// returned as [`Payload::Error`].
    pub async fn request(&self, payload: Payload) -> Result<Payload, TransportError> {
        let request = payload.opcode();
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let frame = payload.into_frame(request_id)?;

        let exchange = async {
            let (mut send, mut recv) = self
                .connection
                .open_bi()
                .await
                .map_err(|e| TransportError::Connection(format!("open stream failed: {e}")))?;
            write_frame(&mut send, &frame).await?;
            read_frame(&mut recv).await
        };

        let response = tokio::time::timeout(self.config.request_timeout, exchange)
            .await
            .map_err(|_| timeout("request", self.config.request_timeout))??;

        if response.header.request_id() != request_id {
            return Err(TransportError::UnexpectedResponse {
                request,
                detail: format!(
                    "request id {} does not match {request_id}",
                    response.header.request_id()
                ),
            });
        }

        let payload = Payload::from_frame(&response)?;
        if !payload.answers(request) {
            return Err(TransportError::UnexpectedResponse {
                request,
                detail: format!("got {:?}", payload.opcode()),
            });
        }

        Ok(payload)
    }

    /// Round-trip a ping.
    pub async fn ping(&self) -> Result<(), TransportError> {
        match self.request(Payload::Ping).await? {
            Payload::Pong => Ok(()),
            other => Err(TransportError::UnexpectedResponse {
                request: Opcode::Ping,
                detail: format!("got {:?}", other.opcode()),
            }),
        }
    }

    /// Close the connection.
    pub fn close(&self) {
        self.connection.close(0u32.into(), b"done");
    }
}

fn timeout(operation: &'static str, after: Duration) -> TransportError {
    TransportError::Timeout { operation, millis: after.as_millis() }
}

/// Write one frame and finish the send side.
async fn write_frame(send: &mut SendStream, frame: &Frame) -> Result<(), TransportError> {
    let mut buf = Vec::with_capacity(frame.encoded_len());
    frame.encode(&mut buf)?;

    send.write_all(&buf).await.map_err(|e| TransportError::Stream(format!("write failed: {e}")))?;
    send.finish().map_err(|e| TransportError::Stream(format!("finish failed: {e}")))?;

    Ok(())
}

/// Read exactly one frame.
async fn read_frame(recv: &mut RecvStream) -> Result<Frame, TransportError> {
    let mut buf = BytesMut::zeroed(FrameHeader::SIZE);
    recv.read_exact(&mut buf[..])
        .await
        .map_err(|e| TransportError::Stream(format!("header read failed: {e}")))?;

    let payload_size = FrameHeader::from_bytes(&buf)?.payload_size() as usize;

    if payload_size > 0 {
        buf.resize(FrameHeader::SIZE + payload_size, 0);
        recv.read_exact(&mut buf[FrameHeader::SIZE..])
            .await
            .map_err(|e| TransportError::Stream(format!("payload read failed: {e}")))?;
    }

    Ok(Frame::decode(&buf)?)
}

/// Client config that accepts any server certificate.
///
/// Test servers are local and present self-signed certificates.
fn insecure_client_config(idle_timeout: Duration) -> Result<ClientConfig, TransportError> {
    let mut crypto = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(InsecureCertVerifier))
        .with_no_client_auth();

    crypto.alpn_protocols = vec![ALPN_PROTOCOL.to_vec()];

    let quic = quinn::crypto::rustls::QuicClientConfig::try_from(crypto)
        .map_err(|e| TransportError::Connection(format!("invalid TLS config: {e}")))?;
    let mut config = ClientConfig::new(Arc::new(quic));

    let idle = idle_timeout
        .try_into()
        .map_err(|e| TransportError::Connection(format!("invalid idle timeout: {e}")))?;
    let mut transport = quinn::TransportConfig::default();
    transport.max_idle_timeout(Some(idle));
    config.transport_config(Arc::new(transport));

    Ok(config)
}

/// Certificate verifier that accepts any certificate.
#[derive(Debug)]
struct InsecureCertVerifier;

impl rustls::client::danger::ServerCertVerifier for InsecureCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::ED25519,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_address_is_a_connection_error() {
        let err = connect("not an address").await.unwrap_err();
        assert!(matches!(err, TransportError::Connection(_)));
    }
}
