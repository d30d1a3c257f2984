use crate::di::DnsServices;
use anyhow::Context;
use dnsmux_domain::config::{ListenerKind, TlsConfig};
use dnsmux_domain::Config;
use dnsmux_infrastructure::dns::server::{
    doh_router, DohState, PacketServer, QuicServer, StreamServer,
};
use dnsmux_infrastructure::tls;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::{TcpListener, UdpSocket};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Binds every configured listener and spawns its accept loop into `tasks`.
pub async fn spawn_listeners(
    config: &Config,
    services: &DnsServices,
    shutdown: &CancellationToken,
    tasks: &mut JoinSet<()>,
) -> anyhow::Result<()> {
    let ip: IpAddr = config
        .server
        .bind_address
        .parse()
        .with_context(|| format!("invalid bind address '{}'", config.server.bind_address))?;

    for &kind in &config.server.listeners {
        let addr = SocketAddr::new(ip, config.server.port_for(kind));
        info!(listener = %kind, bind_address = %addr, "Starting listener");

        match kind {
            ListenerKind::Udp => {
                let server = PacketServer::new(
                    create_udp_socket(addr)?,
                    services.upstream(),
                    services.pool.clone(),
                )
                .with_cancellation(shutdown.clone());
                tasks.spawn(async move {
                    if let Err(e) = server.run().await {
                        error!(listener = "udp", error = %e, "Listener stopped");
                    }
                });
            }
            ListenerKind::Tcp | ListenerKind::Tls => {
                let mut server = StreamServer::new(
                    create_tcp_listener(addr)?,
                    services.upstream(),
                    services.pool.clone(),
                )
                .with_idle_timeout(Duration::from_secs(config.server.stream_idle_timeout_secs))
                .with_cancellation(shutdown.clone());

                if kind == ListenerKind::Tls {
                    server = server.with_tls(tls::tls_acceptor(require_tls(config)?)?);
                }

                tasks.spawn(async move {
                    if let Err(e) = server.run().await {
                        error!(listener = %kind, error = %e, "Listener stopped");
                    }
                });
            }
            ListenerKind::Quic => {
                let quic_config = tls::quic_server_config(
                    require_tls(config)?,
                    Duration::from_secs(config.server.quic_idle_timeout_secs),
                )?;
                let server = QuicServer::bind(
                    addr,
                    quic_config,
                    services.upstream(),
                    services.pool.clone(),
                )?
                .with_cancellation(shutdown.clone());
                tasks.spawn(async move {
                    if let Err(e) = server.run().await {
                        error!(listener = "quic", error = %e, "Listener stopped");
                    }
                });
            }
            ListenerKind::Https => {
                let acceptor = tokio_rustls::TlsAcceptor::from(tls::server_config(
                    require_tls(config)?,
                    tls::DOH_ALPN,
                )?);
                let app = doh_router(
                    &config.doh.path,
                    DohState {
                        upstream: services.upstream(),
                        pool: services.pool.clone(),
                    },
                );
                let listener = create_tcp_listener(addr)?;
                let shutdown = shutdown.clone();
                tasks.spawn(async move {
                    super::web::serve_doh(listener, acceptor, app, shutdown).await;
                });
            }
        }
    }

    Ok(())
}

fn require_tls(config: &Config) -> anyhow::Result<&TlsConfig> {
    config
        .tls
        .as_ref()
        .context("the [tls] section is required for encrypted listeners")
}

fn socket_domain(addr: SocketAddr) -> Domain {
    if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    }
}

fn create_udp_socket(addr: SocketAddr) -> anyhow::Result<UdpSocket> {
    let socket = Socket::new(socket_domain(addr), Type::DGRAM, Some(Protocol::UDP))?;
    if addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }
    socket.set_reuse_address(true)?;
    socket.set_recv_buffer_size(512 * 1024)?;
    socket.set_send_buffer_size(512 * 1024)?;
    socket
        .bind(&addr.into())
        .with_context(|| format!("cannot bind UDP {}", addr))?;
    socket.set_nonblocking(true)?;
    let std_socket: std::net::UdpSocket = socket.into();
    Ok(UdpSocket::from_std(std_socket)?)
}

fn create_tcp_listener(addr: SocketAddr) -> anyhow::Result<TcpListener> {
    let socket = Socket::new(socket_domain(addr), Type::STREAM, Some(Protocol::TCP))?;
    if addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }
    socket.set_reuse_address(true)?;
    socket
        .bind(&addr.into())
        .with_context(|| format!("cannot bind TCP {}", addr))?;
    socket.listen(1024)?;
    socket.set_nonblocking(true)?;
    let std_listener: std::net::TcpListener = socket.into();
    Ok(TcpListener::from_std(std_listener)?)
}
