use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Terminates TLS and serves the DoH router over HTTP/1.1 or HTTP/2.
pub async fn serve_doh(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    app: Router,
    shutdown: CancellationToken,
) {
    info!(transport = "https", addr = ?listener.local_addr().ok(), "Listener started");

    loop {
        let accepted = tokio::select! {
            _ = shutdown.cancelled() => {
                info!(transport = "https", "Listener shutting down");
                return;
            }
            accepted = listener.accept() => accepted,
        };

        let (stream, peer) = match accepted {
            Ok(accepted) => accepted,
            Err(e) => {
                debug!(transport = "https", error = %e, "Accept failed");
                continue;
            }
        };

        let acceptor = acceptor.clone();
        let service = TowerToHyperService::new(app.clone());

        tokio::spawn(async move {
            let tls_stream = match acceptor.accept(stream).await {
                Ok(tls_stream) => tls_stream,
                Err(e) => {
                    debug!(transport = "https", %peer, error = %e, "TLS handshake failed");
                    return;
                }
            };

            if let Err(e) = Builder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(tls_stream), service)
                .await
            {
                debug!(transport = "https", %peer, error = %e, "HTTP connection ended with error");
            }
        });
    }
}
