//! QUIC Transport for DNS queries: DNS-over-QUIC (RFC 9250)
//!
//! One bidirectional stream per query, 2-byte length prefix on both directions.
//! The connection is kept and reused until the server closes it.

use super::{timed_out, unreachable, DnsTransport, TransportResponse};
use crate::dns::framing::{read_framed, write_framed};
use async_trait::async_trait;
use bytes::Bytes;
use dnsmux_domain::DomainError;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tracing::debug;

pub const ALPN_DOQ: &[u8] = b"doq";

fn client_config() -> Result<quinn::ClientConfig, DomainError> {
    crate::tls::install_crypto_provider();

    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let mut tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    tls_config.alpn_protocols = vec![ALPN_DOQ.to_vec()];

    let quic_config = quinn::crypto::rustls::QuicClientConfig::try_from(Arc::new(tls_config))
        .map_err(|e| DomainError::TlsConfig(format!("QUIC client config: {}", e)))?;
    Ok(quinn::ClientConfig::new(Arc::new(quic_config)))
}

pub struct QuicTransport {
    server_addr: SocketAddr,
    hostname: Arc<str>,
    endpoint: OnceCell<quinn::Endpoint>,
    connection: Mutex<Option<quinn::Connection>>,
}

impl QuicTransport {
    pub fn new(server_addr: SocketAddr, hostname: Arc<str>) -> Self {
        Self {
            server_addr,
            hostname,
            endpoint: OnceCell::new(),
            connection: Mutex::new(None),
        }
    }

    async fn endpoint(&self) -> Result<&quinn::Endpoint, DomainError> {
        self.endpoint
            .get_or_try_init(|| async {
                let bind: SocketAddr = if self.server_addr.is_ipv4() {
                    (Ipv4Addr::UNSPECIFIED, 0).into()
                } else {
                    (Ipv6Addr::UNSPECIFIED, 0).into()
                };
                let mut endpoint = quinn::Endpoint::client(bind)
                    .map_err(|e| unreachable(self.server_addr, format!("QUIC bind failed: {}", e)))?;
                endpoint.set_default_client_config(client_config()?);
                Ok::<_, DomainError>(endpoint)
            })
            .await
    }

    fn cached_connection(&self) -> Option<quinn::Connection> {
        let mut slot = self
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(conn) if conn.close_reason().is_none() => Some(conn.clone()),
            Some(_) => {
                *slot = None;
                None
            }
            None => None,
        }
    }

    fn store_connection(&self, conn: Option<quinn::Connection>) {
        *self
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = conn;
    }

    async fn connect_new(&self, deadline: Instant) -> Result<quinn::Connection, DomainError> {
        let endpoint = self.endpoint().await?;
        let connecting = endpoint
            .connect(self.server_addr, &self.hostname)
            .map_err(|e| unreachable(self.server_addr, e))?;

        let conn = tokio::time::timeout_at(deadline, connecting)
            .await
            .map_err(|_| timed_out(self.server_addr))?
            .map_err(|e| unreachable(format!("{}({})", self.hostname, self.server_addr), e))?;

        debug!(server = %self.server_addr, hostname = %self.hostname, "QUIC connection established");
        Ok(conn)
    }

    async fn round_trip(
        &self,
        conn: &quinn::Connection,
        message_bytes: &[u8],
        deadline: Instant,
    ) -> Result<Vec<u8>, DomainError> {
        tokio::time::timeout_at(deadline, async {
            let (mut send, mut recv) = conn
                .open_bi()
                .await
                .map_err(|e| unreachable(self.server_addr, e))?;
            write_framed(&mut send, message_bytes)
                .await
                .map_err(|e| unreachable(self.server_addr, e))?;
            send.finish().map_err(|e| unreachable(self.server_addr, e))?;
            read_framed(&mut recv)
                .await
                .map_err(|e| unreachable(self.server_addr, e))
        })
        .await
        .map_err(|_| timed_out(self.server_addr))?
    }
}

#[async_trait]
impl DnsTransport for QuicTransport {
    async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, DomainError> {
        let deadline = Instant::now() + timeout;

        if let Some(conn) = self.cached_connection() {
            match self.round_trip(&conn, message_bytes, deadline).await {
                Ok(response) => {
                    return Ok(TransportResponse {
                        bytes: Bytes::from(response),
                        protocol_used: "QUIC",
                    })
                }
                Err(DomainError::UpstreamTimeout { server }) => {
                    return Err(DomainError::UpstreamTimeout { server })
                }
                Err(_) => {
                    self.store_connection(None);
                    debug!(server = %self.server_addr, "QUIC connection stale, reconnecting");
                }
            }
        }

        let conn = self.connect_new(deadline).await?;
        self.store_connection(Some(conn.clone()));
        let response = self.round_trip(&conn, message_bytes, deadline).await?;

        debug!(
            server = %self.server_addr,
            response_len = response.len(),
            "QUIC response received"
        );

        Ok(TransportResponse {
            bytes: Bytes::from(response),
            protocol_used: "QUIC",
        })
    }

    fn protocol_name(&self) -> &'static str {
        "QUIC"
    }
}
