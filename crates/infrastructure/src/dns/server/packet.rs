use super::{classify_io, exchange_in_buffer, log_failure, Stage};
use crate::dns::buffer_pool::BufferPool;
use dnsmux_application::ports::Upstream;
use dnsmux_domain::DomainError;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

const TRANSPORT: &str = "udp";

/// Datagram listener: one DNS message per packet, answered sequentially.
pub struct PacketServer {
    socket: UdpSocket,
    upstream: Arc<dyn Upstream>,
    pool: BufferPool,
    shutdown: CancellationToken,
}

impl PacketServer {
    pub fn new(socket: UdpSocket, upstream: Arc<dyn Upstream>, pool: BufferPool) -> Self {
        Self {
            socket,
            upstream,
            pool,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Serves until the token is cancelled or the socket fails for good.
    pub async fn run(self) -> Result<(), DomainError> {
        info!(transport = TRANSPORT, addr = ?self.socket.local_addr().ok(), "Listener started");

        let mut buffer = self.pool.acquire();

        loop {
            let received = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!(transport = TRANSPORT, "Listener shutting down");
                    return Ok(());
                }
                received = self.socket.recv_from(buffer.read_region()) => received,
            };

            let (len, peer) = match received {
                Ok(received) => received,
                Err(e) => match classify_io(e) {
                    err if err.is_transient() => {
                        debug!(transport = TRANSPORT, error = %err, "Transient receive error");
                        continue;
                    }
                    err if err.is_closed() => return Ok(()),
                    err => {
                        error!(transport = TRANSPORT, stage = %Stage::Read, error = %err, "Listener failed");
                        return Err(err);
                    }
                },
            };

            let response_len =
                match exchange_in_buffer(self.upstream.as_ref(), &mut buffer, len).await {
                    Ok(response_len) => response_len,
                    Err((stage, e)) => {
                        log_failure(TRANSPORT, stage, peer, &e);
                        continue;
                    }
                };

            if let Err(e) = self.socket.send_to(&buffer[..response_len], peer).await {
                log_failure(TRANSPORT, Stage::Write, peer, &classify_io(e));
            }
        }
    }
}
