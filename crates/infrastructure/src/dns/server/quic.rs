use super::{classify_io, exchange_in_buffer, log_failure, Stage};
use crate::dns::buffer_pool::{BufferPool, MAX_MESSAGE_SIZE};
use crate::dns::framing::{read_framed_into, write_framed};
use dnsmux_application::ports::Upstream;
use dnsmux_domain::DomainError;
use quinn::{Connection, Endpoint, RecvStream, SendStream, VarInt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

const TRANSPORT: &str = "quic";

/// How a stream's single message is delimited, chosen by the negotiated ALPN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    /// RFC 9250: 2-byte length prefix.
    LengthPrefixed,
    /// Draft identifiers: the raw message, terminated by the stream's FIN.
    Raw,
}

impl Framing {
    fn for_connection(connection: &Connection) -> Self {
        let protocol = connection
            .handshake_data()
            .and_then(|data| data.downcast::<quinn::crypto::rustls::HandshakeData>().ok())
            .and_then(|data| data.protocol);

        match protocol.as_deref() {
            Some(b"doq-i02") | Some(b"doq-i00") | Some(b"dq") => Framing::Raw,
            _ => Framing::LengthPrefixed,
        }
    }
}

/// DNS over QUIC: one query and one response per bidirectional stream.
pub struct QuicServer {
    endpoint: Endpoint,
    upstream: Arc<dyn Upstream>,
    pool: BufferPool,
    shutdown: CancellationToken,
}

impl QuicServer {
    pub fn bind(
        addr: SocketAddr,
        config: quinn::ServerConfig,
        upstream: Arc<dyn Upstream>,
        pool: BufferPool,
    ) -> Result<Self, DomainError> {
        let endpoint = Endpoint::server(config, addr)
            .map_err(|e| DomainError::IoError(format!("cannot bind QUIC endpoint {}: {}", addr, e)))?;

        Ok(Self {
            endpoint,
            upstream,
            pool,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, DomainError> {
        self.endpoint
            .local_addr()
            .map_err(|e| DomainError::IoError(e.to_string()))
    }

    pub async fn run(self) -> Result<(), DomainError> {
        info!(transport = TRANSPORT, addr = ?self.endpoint.local_addr().ok(), "Listener started");

        loop {
            let incoming = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!(transport = TRANSPORT, "Listener shutting down");
                    self.endpoint.close(VarInt::from_u32(0), b"server shutdown");
                    return Ok(());
                }
                incoming = self.endpoint.accept() => incoming,
            };

            let Some(incoming) = incoming else {
                return Ok(());
            };

            let upstream = self.upstream.clone();
            let pool = self.pool.clone();

            tokio::spawn(async move {
                match incoming.await {
                    Ok(connection) => serve_connection(connection, upstream, pool).await,
                    Err(e) => debug!(transport = TRANSPORT, error = %e, "QUIC handshake failed"),
                }
            });
        }
    }
}

async fn serve_connection(connection: Connection, upstream: Arc<dyn Upstream>, pool: BufferPool) {
    let peer = connection.remote_address();
    let framing = Framing::for_connection(&connection);
    trace!(transport = TRANSPORT, %peer, ?framing, "Connection established");

    loop {
        match connection.accept_bi().await {
            Ok((send, recv)) => {
                let upstream = upstream.clone();
                let pool = pool.clone();
                tokio::spawn(async move {
                    serve_stream(send, recv, framing, peer, upstream, pool).await;
                });
            }
            Err(
                quinn::ConnectionError::ApplicationClosed(_)
                | quinn::ConnectionError::LocallyClosed
                | quinn::ConnectionError::TimedOut,
            ) => {
                trace!(transport = TRANSPORT, %peer, "Connection closed");
                return;
            }
            Err(e) => {
                debug!(transport = TRANSPORT, %peer, error = %e, "Connection error");
                return;
            }
        }
    }
}

async fn serve_stream(
    mut send: SendStream,
    mut recv: RecvStream,
    framing: Framing,
    peer: SocketAddr,
    upstream: Arc<dyn Upstream>,
    pool: BufferPool,
) {
    let mut buffer = pool.acquire();

    let read = match framing {
        Framing::LengthPrefixed => read_framed_into(&mut recv, buffer.read_region())
            .await
            .map_err(classify_io),
        Framing::Raw => match recv.read_to_end(MAX_MESSAGE_SIZE).await {
            Ok(bytes) => buffer.fill_from(&bytes),
            Err(e) => Err(DomainError::IoError(e.to_string())),
        },
    };

    let len = match read {
        Ok(len) => len,
        Err(e) => {
            if !e.is_closed() {
                log_failure(TRANSPORT, Stage::Read, peer, &e);
            }
            return;
        }
    };

    let response_len = match exchange_in_buffer(upstream.as_ref(), &mut buffer, len).await {
        Ok(response_len) => response_len,
        Err((stage, e)) => {
            log_failure(TRANSPORT, stage, peer, &e);
            return;
        }
    };

    let written = match framing {
        Framing::LengthPrefixed => write_framed(&mut send, &buffer[..response_len])
            .await
            .map_err(classify_io),
        Framing::Raw => send
            .write_all(&buffer[..response_len])
            .await
            .map_err(|e| DomainError::IoError(e.to_string())),
    };

    if let Err(e) = written.and_then(|()| {
        send.finish()
            .map_err(|e| DomainError::IoError(e.to_string()))
    }) {
        log_failure(TRANSPORT, Stage::Write, peer, &e);
    }
}
