use super::{timed_out, unreachable, DnsTransport, TransportResponse};
use crate::dns::framing::{read_framed, write_framed};
use async_trait::async_trait;
use bytes::Bytes;
use dnsmux_domain::DomainError;
use std::net::SocketAddr;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::debug;

const MAX_IDLE_TCP: usize = 2;

/// DNS over TCP transport with a small pool of idle connections.
pub struct TcpTransport {
    server_addr: SocketAddr,
    idle: Mutex<Vec<TcpStream>>,
}

impl TcpTransport {
    pub fn new(server_addr: SocketAddr) -> Self {
        Self {
            server_addr,
            idle: Mutex::new(Vec::new()),
        }
    }

    fn take_pooled(&self) -> Option<TcpStream> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).pop()
    }

    fn return_to_pool(&self, stream: TcpStream) {
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < MAX_IDLE_TCP {
            idle.push(stream);
        }
    }

    async fn connect_new(&self, deadline: Instant) -> Result<TcpStream, DomainError> {
        let stream = tokio::time::timeout_at(deadline, TcpStream::connect(self.server_addr))
            .await
            .map_err(|_| timed_out(self.server_addr))?
            .map_err(|e| unreachable(self.server_addr, e))?;

        stream
            .set_nodelay(true)
            .map_err(|e| unreachable(self.server_addr, e))?;

        Ok(stream)
    }

    async fn round_trip(
        &self,
        stream: &mut TcpStream,
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
impl DnsTransport for TcpTransport {
    async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, DomainError> {
        let deadline = Instant::now() + timeout;

        if let Some(mut stream) = self.take_pooled() {
            match self.round_trip(&mut stream, message_bytes, deadline).await {
                Ok(response) => {
                    debug!(server = %self.server_addr, "TCP query via pooled connection");
                    self.return_to_pool(stream);
                    return Ok(TransportResponse {
                        bytes: Bytes::from(response),
                        protocol_used: "TCP",
                    });
                }
                Err(DomainError::UpstreamTimeout { server }) => {
                    return Err(DomainError::UpstreamTimeout { server })
                }
                Err(_) => {
                    debug!(server = %self.server_addr, "Pooled TCP connection stale, reconnecting");
                }
            }
        }

        let mut stream = self.connect_new(deadline).await?;
        let response = self.round_trip(&mut stream, message_bytes, deadline).await?;

        debug!(
            server = %self.server_addr,
            response_len = response.len(),
            "TCP response received"
        );

        self.return_to_pool(stream);

        Ok(TransportResponse {
            bytes: Bytes::from(response),
            protocol_used: "TCP",
        })
    }

    fn protocol_name(&self) -> &'static str {
        "TCP"
    }
}
