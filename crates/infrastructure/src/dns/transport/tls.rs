//! TLS Transport for DNS queries: DNS-over-TLS (RFC 7858)
//!
//! One shared `ClientConfig` with webpki roots, and a small pool of idle
//! connections per transport so repeated queries skip the handshake.

use super::{timed_out, unreachable, DnsTransport, TransportResponse};
use crate::dns::framing::{read_framed, write_framed};
use async_trait::async_trait;
use bytes::Bytes;
use dnsmux_domain::DomainError;
use rustls::pki_types::ServerName;
use std::net::SocketAddr;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_rustls::client::TlsStream;
use tracing::debug;

const MAX_IDLE_PER_HOST: usize = 2;

static SHARED_TLS_CONFIG: LazyLock<Arc<rustls::ClientConfig>> = LazyLock::new(|| {
    crate::tls::install_crypto_provider();

    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
});

/// DNS-over-TLS transport (RFC 7858)
pub struct TlsTransport {
    server_addr: SocketAddr,
    hostname: String,
    idle: Mutex<Vec<TlsStream<TcpStream>>>,
}

impl TlsTransport {
    pub fn new(server_addr: SocketAddr, hostname: String) -> Self {
        Self {
            server_addr,
            hostname,
            idle: Mutex::new(Vec::new()),
        }
    }

    fn take_pooled(&self) -> Option<TlsStream<TcpStream>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).pop()
    }

    fn return_to_pool(&self, stream: TlsStream<TcpStream>) {
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < MAX_IDLE_PER_HOST {
            idle.push(stream);
        }
    }

    async fn connect_new(&self, deadline: Instant) -> Result<TlsStream<TcpStream>, DomainError> {
        let connector = tokio_rustls::TlsConnector::from(SHARED_TLS_CONFIG.clone());

        let server_name = ServerName::try_from(self.hostname.clone()).map_err(|e| {
            DomainError::InvalidUpstream(format!("Invalid TLS hostname '{}': {}", self.hostname, e))
        })?;

        let tcp_stream = tokio::time::timeout_at(deadline, TcpStream::connect(self.server_addr))
            .await
            .map_err(|_| timed_out(self.server_addr))?
            .map_err(|e| unreachable(self.server_addr, e))?;
        tcp_stream
            .set_nodelay(true)
            .map_err(|e| unreachable(self.server_addr, e))?;

        let tls_stream = tokio::time::timeout_at(deadline, connector.connect(server_name, tcp_stream))
            .await
            .map_err(|_| timed_out(self.server_addr))?
            .map_err(|e| unreachable(self.server_addr, format!("TLS handshake failed: {}", e)))?;

        debug!(server = %self.server_addr, hostname = %self.hostname, "TLS connection established");
        Ok(tls_stream)
    }

    async fn round_trip(
        &self,
        stream: &mut TlsStream<TcpStream>,
        message_bytes: &[u8],
        deadline: Instant,
    ) -> Result<Vec<u8>, DomainError> {
        tokio::time::timeout_at(deadline, async {
            write_framed(stream, message_bytes).await?;
            read_framed(stream).await
        })
        .await
        .map_err(|_| timed_out(self.server_addr))?
        .map_err(|e| unreachable(self.server_addr, e))
    }
}

#[async_trait]
impl DnsTransport for TlsTransport {
    async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, DomainError> {
        let deadline = Instant::now() + timeout;

        if let Some(mut stream) = self.take_pooled() {
            match self.round_trip(&mut stream, message_bytes, deadline).await {
                Ok(response) => {
                    debug!(server = %self.server_addr, "TLS query via pooled connection");
                    self.return_to_pool(stream);
                    return Ok(TransportResponse {
                        bytes: Bytes::from(response),
                        protocol_used: "TLS",
                    });
                }
                Err(DomainError::UpstreamTimeout { server }) => {
                    return Err(DomainError::UpstreamTimeout { server })
                }
                Err(_) => {
                    debug!(server = %self.server_addr, "Pooled TLS connection stale, reconnecting");
                }
            }
        }

        let mut stream = self.connect_new(deadline).await?;
        let response = self.round_trip(&mut stream, message_bytes, deadline).await?;

        debug!(
            server = %self.server_addr,
            response_len = response.len(),
            "TLS response received"
        );

        self.return_to_pool(stream);

        Ok(TransportResponse {
            bytes: Bytes::from(response),
            protocol_used: "TLS",
        })
    }

    fn protocol_name(&self) -> &'static str {
        "TLS"
    }
}
