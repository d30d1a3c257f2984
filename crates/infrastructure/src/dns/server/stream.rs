use super::{classify_io, exchange_in_buffer, log_failure, Stage};
use crate::dns::buffer_pool::BufferPool;
use crate::dns::framing::{read_framed_into, write_framed};
use dnsmux_application::ports::Upstream;
use dnsmux_domain::DomainError;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Length-prefixed DNS over TCP, or over TLS when built with [`StreamServer::with_tls`].
pub struct StreamServer {
    listener: TcpListener,
    acceptor: Option<TlsAcceptor>,
    upstream: Arc<dyn Upstream>,
    pool: BufferPool,
    idle_timeout: Duration,
    shutdown: CancellationToken,
}

impl StreamServer {
    pub fn new(listener: TcpListener, upstream: Arc<dyn Upstream>, pool: BufferPool) -> Self {
        Self {
            listener,
            acceptor: None,
            upstream,
            pool,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_tls(mut self, acceptor: TlsAcceptor) -> Self {
        self.acceptor = Some(acceptor);
        self
    }

    /// Read deadline applied before every request on a connection.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    fn transport(&self) -> &'static str {
        if self.acceptor.is_some() {
            "tls"
        } else {
            "tcp"
        }
    }

    pub async fn run(self) -> Result<(), DomainError> {
        let transport = self.transport();
        info!(transport, addr = ?self.listener.local_addr().ok(), "Listener started");

        loop {
            let accepted = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!(transport, "Listener shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => accepted,
            };

            let (stream, peer) = match accepted {
                Ok(accepted) => accepted,
                Err(e) => match classify_io(e) {
                    err if err.is_transient() => {
                        debug!(transport, error = %err, "Transient accept error");
                        continue;
                    }
                    err if err.is_closed() => return Ok(()),
                    err => {
                        error!(transport, stage = %Stage::Read, error = %err, "Listener failed");
                        return Err(err);
                    }
                },
            };

            let connection = Connection {
                transport,
                peer,
                upstream: self.upstream.clone(),
                pool: self.pool.clone(),
                idle_timeout: self.idle_timeout,
            };
            let acceptor = self.acceptor.clone();

            tokio::spawn(async move {
                match acceptor {
                    Some(acceptor) => match acceptor.accept(stream).await {
                        Ok(tls_stream) => connection.serve(tls_stream).await,
                        Err(e) => debug!(transport, %peer, error = %e, "TLS handshake failed"),
                    },
                    None => connection.serve(stream).await,
                }
            });
        }
    }
}

struct Connection {
    transport: &'static str,
    peer: SocketAddr,
    upstream: Arc<dyn Upstream>,
    pool: BufferPool,
    idle_timeout: Duration,
}

impl Connection {
    async fn serve<S>(self, mut stream: S)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut buffer = self.pool.acquire();

        loop {
            let read =
                tokio::time::timeout(self.idle_timeout, read_framed_into(&mut stream, buffer.read_region()))
                    .await;

            let len = match read {
                Err(_) => {
                    debug!(transport = self.transport, peer = %self.peer, "Connection idle, closing");
                    return;
                }
                Ok(Ok(len)) => len,
                Ok(Err(e)) => {
                    let err = classify_io(e);
                    if !err.is_closed() {
                        log_failure(self.transport, Stage::Read, self.peer, &err);
                    }
                    return;
                }
            };

            let response_len =
                match exchange_in_buffer(self.upstream.as_ref(), &mut buffer, len).await {
                    Ok(response_len) => response_len,
                    Err((stage, e)) => {
                        log_failure(self.transport, stage, self.peer, &e);
                        return;
                    }
                };

            if let Err(e) = write_framed(&mut stream, &buffer[..response_len]).await {
                log_failure(self.transport, Stage::Write, self.peer, &classify_io(e));
                return;
            }
        }
    }
}

