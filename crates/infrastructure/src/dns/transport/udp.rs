//! UDP Transport for DNS queries (RFC 1035 §4.2.1)
//!
//! Messages are sent as-is (no framing). Responses whose ID does not match the
//! query are ignored until the deadline.

use super::{timed_out, unreachable, DnsTransport, TransportResponse};
use crate::dns::buffer_pool::MAX_MESSAGE_SIZE;
use async_trait::async_trait;
use bytes::Bytes;
use dnsmux_domain::DomainError;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, warn};

/// DNS over UDP transport
pub struct UdpTransport {
    server_addr: SocketAddr,
}

impl UdpTransport {
    pub fn new(server_addr: SocketAddr) -> Self {
        Self { server_addr }
    }

    fn bind_addr(&self) -> SocketAddr {
        if self.server_addr.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        }
    }
}

#[async_trait]
impl DnsTransport for UdpTransport {
    async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, DomainError> {
        let deadline = Instant::now() + timeout;

        let socket = UdpSocket::bind(self.bind_addr())
            .await
            .map_err(|e| unreachable(self.server_addr, format!("bind failed: {}", e)))?;
        socket
            .connect(self.server_addr)
            .await
            .map_err(|e| unreachable(self.server_addr, e))?;

        tokio::time::timeout_at(deadline, socket.send(message_bytes))
            .await
            .map_err(|_| timed_out(self.server_addr))?
            .map_err(|e| unreachable(self.server_addr, e))?;

        debug!(server = %self.server_addr, bytes_sent = message_bytes.len(), "UDP query sent");

        let query_id = message_bytes.get(..2);
        let mut recv_buf = vec![0u8; MAX_MESSAGE_SIZE];

        loop {
            let bytes_received = tokio::time::timeout_at(deadline, socket.recv(&mut recv_buf))
                .await
                .map_err(|_| timed_out(self.server_addr))?
                .map_err(|e| unreachable(self.server_addr, e))?;

            if bytes_received < 2 || recv_buf.get(..2) != query_id {
                warn!(server = %self.server_addr, "Discarding UDP response with mismatched ID");
                continue;
            }

            recv_buf.truncate(bytes_received);
            debug!(server = %self.server_addr, bytes_received, "UDP response received");

            return Ok(TransportResponse {
                bytes: Bytes::from(recv_buf),
                protocol_used: "UDP",
            });
        }
    }

    fn protocol_name(&self) -> &'static str {
        "UDP"
    }
}
