pub mod https;
pub mod quic;
pub mod tcp;
pub mod tls;
pub mod udp;

use async_trait::async_trait;
use bytes::Bytes;
use dnsmux_domain::{DnsProtocol, DomainError, UpstreamAddr};
use std::fmt::Display;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug)]
pub struct TransportResponse {
    pub bytes: Bytes,

    pub protocol_used: &'static str,
}

#[async_trait]
pub trait DnsTransport: Send + Sync {
    async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, DomainError>;

    fn protocol_name(&self) -> &'static str;
}

pub enum Transport {
    Udp(udp::UdpTransport),
    Tcp(tcp::TcpTransport),
    #[cfg(feature = "dns-over-rustls")]
    Tls(tls::TlsTransport),
    #[cfg(feature = "dns-over-https")]
    Https(https::HttpsTransport),
    #[cfg(feature = "dns-over-quic")]
    Quic(quic::QuicTransport),
}

impl Transport {
    pub async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, DomainError> {
        match self {
            Self::Udp(t) => DnsTransport::send(t, message_bytes, timeout).await,
            Self::Tcp(t) => DnsTransport::send(t, message_bytes, timeout).await,
            #[cfg(feature = "dns-over-rustls")]
            Self::Tls(t) => DnsTransport::send(t, message_bytes, timeout).await,
            #[cfg(feature = "dns-over-https")]
            Self::Https(t) => DnsTransport::send(t, message_bytes, timeout).await,
            #[cfg(feature = "dns-over-quic")]
            Self::Quic(t) => DnsTransport::send(t, message_bytes, timeout).await,
        }
    }

    pub fn protocol_name(&self) -> &'static str {
        match self {
            Self::Udp(t) => t.protocol_name(),
            Self::Tcp(t) => t.protocol_name(),
            #[cfg(feature = "dns-over-rustls")]
            Self::Tls(t) => t.protocol_name(),
            #[cfg(feature = "dns-over-https")]
            Self::Https(t) => t.protocol_name(),
            #[cfg(feature = "dns-over-quic")]
            Self::Quic(t) => t.protocol_name(),
        }
    }
}

/// Builds the client for `protocol`. Hostnames must already be resolved.
pub fn create_transport(protocol: &DnsProtocol) -> Result<Transport, DomainError> {
    match protocol {
        DnsProtocol::Udp { addr } => Ok(Transport::Udp(udp::UdpTransport::new(resolved(addr)?))),
        DnsProtocol::Tcp { addr } => Ok(Transport::Tcp(tcp::TcpTransport::new(resolved(addr)?))),

        #[cfg(feature = "dns-over-rustls")]
        DnsProtocol::Tls { addr, hostname } => Ok(Transport::Tls(tls::TlsTransport::new(
            resolved(addr)?,
            hostname.to_string(),
        ))),

        #[cfg(feature = "dns-over-https")]
        DnsProtocol::Https { url, .. } => Ok(Transport::Https(https::HttpsTransport::new(
            url.to_string(),
        )?)),

        #[cfg(feature = "dns-over-quic")]
        DnsProtocol::Quic { addr, hostname } => Ok(Transport::Quic(quic::QuicTransport::new(
            resolved(addr)?,
            hostname.clone(),
        ))),

        #[allow(unreachable_patterns)]
        other => Err(DomainError::InvalidUpstream(format!(
            "{} support is not compiled in: {}",
            other.protocol_name(),
            other
        ))),
    }
}

fn resolved(addr: &UpstreamAddr) -> Result<SocketAddr, DomainError> {
    addr.socket_addr().ok_or_else(|| {
        DomainError::InvalidUpstream(format!("address {} has not been resolved", addr))
    })
}

pub(crate) fn timed_out(server: impl Display) -> DomainError {
    DomainError::UpstreamTimeout {
        server: server.to_string(),
    }
}

pub(crate) fn unreachable(server: impl Display, reason: impl Display) -> DomainError {
    DomainError::UpstreamUnreachable {
        server: server.to_string(),
        reason: reason.to_string(),
    }
}
