use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

pub const DEFAULT_DNS_PORT: u16 = 53;
pub const DEFAULT_DOT_PORT: u16 = 853;
pub const DEFAULT_DOQ_PORT: u16 = 853;

/// Represents an upstream server address that may or may not be resolved to an IP.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UpstreamAddr {
    Resolved(SocketAddr),
    Unresolved { hostname: Arc<str>, port: u16 },
}

impl UpstreamAddr {
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        match self {
            UpstreamAddr::Resolved(addr) => Some(*addr),
            UpstreamAddr::Unresolved { .. } => None,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            UpstreamAddr::Resolved(addr) => addr.port(),
            UpstreamAddr::Unresolved { port, .. } => *port,
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, UpstreamAddr::Unresolved { .. })
    }

    /// Returns (hostname, port) if this address is unresolved.
    pub fn unresolved_parts(&self) -> Option<(&str, u16)> {
        match self {
            UpstreamAddr::Unresolved { hostname, port } => Some((hostname, *port)),
            UpstreamAddr::Resolved(_) => None,
        }
    }
}

impl fmt::Display for UpstreamAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamAddr::Resolved(addr) => write!(f, "{}", addr),
            UpstreamAddr::Unresolved { hostname, port } => write!(f, "{}:{}", hostname, port),
        }
    }
}

/// Remote resolver endpoint used by the `forward` upstream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DnsProtocol {
    Udp {
        addr: UpstreamAddr,
    },
    Tcp {
        addr: UpstreamAddr,
    },
    Tls {
        addr: UpstreamAddr,
        hostname: Arc<str>,
    },
    Https {
        url: Arc<str>,
        hostname: Arc<str>,
    },
    Quic {
        addr: UpstreamAddr,
        hostname: Arc<str>,
    },
}

impl DnsProtocol {
    pub fn addr(&self) -> Option<&UpstreamAddr> {
        match self {
            DnsProtocol::Udp { addr }
            | DnsProtocol::Tcp { addr }
            | DnsProtocol::Tls { addr, .. }
            | DnsProtocol::Quic { addr, .. } => Some(addr),
            DnsProtocol::Https { .. } => None,
        }
    }

    pub fn socket_addr(&self) -> Option<SocketAddr> {
        self.addr().and_then(UpstreamAddr::socket_addr)
    }

    pub fn hostname(&self) -> Option<&str> {
        match self {
            DnsProtocol::Tls { hostname, .. }
            | DnsProtocol::Https { hostname, .. }
            | DnsProtocol::Quic { hostname, .. } => Some(hostname),
            _ => None,
        }
    }

    pub fn protocol_name(&self) -> &'static str {
        match self {
            DnsProtocol::Udp { .. } => "UDP",
            DnsProtocol::Tcp { .. } => "TCP",
            DnsProtocol::Tls { .. } => "TLS",
            DnsProtocol::Https { .. } => "HTTPS",
            DnsProtocol::Quic { .. } => "QUIC",
        }
    }

    /// Returns `true` if this protocol has an unresolved hostname that needs DNS resolution.
    pub fn needs_resolution(&self) -> bool {
        self.addr().is_some_and(UpstreamAddr::is_unresolved)
    }

    /// Creates a copy of this protocol with the given resolved `SocketAddr`.
    pub fn with_resolved_addr(&self, resolved: SocketAddr) -> Self {
        let addr = UpstreamAddr::Resolved(resolved);
        match self {
            DnsProtocol::Udp { .. } => DnsProtocol::Udp { addr },
            DnsProtocol::Tcp { .. } => DnsProtocol::Tcp { addr },
            DnsProtocol::Tls { hostname, .. } => DnsProtocol::Tls {
                addr,
                hostname: hostname.clone(),
            },
            DnsProtocol::Quic { hostname, .. } => DnsProtocol::Quic {
                addr,
                hostname: hostname.clone(),
            },
            DnsProtocol::Https { .. } => self.clone(),
        }
    }
}

fn parse_host_port(s: &str, default_port: u16) -> Option<(&str, u16)> {
    if let Some(rest) = s.strip_prefix('[') {
        let end = rest.find(']')?;
        let host = &rest[..end];
        return match rest[end + 1..].strip_prefix(':') {
            Some(port) => Some((host, port.parse().ok()?)),
            None if rest.len() == end + 1 => Some((host, default_port)),
            None => None,
        };
    }
    match s.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => Some((host, port.parse().ok()?)),
        Some(_) => None,
        None if !s.is_empty() => Some((s, default_port)),
        None => None,
    }
}

fn parse_upstream_addr(addr_str: &str, default_port: u16) -> Result<UpstreamAddr, String> {
    if let Ok(addr) = addr_str.parse::<SocketAddr>() {
        return Ok(UpstreamAddr::Resolved(addr));
    }
    if let Ok(ip) = addr_str.parse::<std::net::IpAddr>() {
        return Ok(UpstreamAddr::Resolved(SocketAddr::new(ip, default_port)));
    }
    let (host, port) =
        parse_host_port(addr_str, default_port).ok_or_else(|| format!("Invalid address '{}'", addr_str))?;
    if let Ok(ip) = host.parse::<std::net::IpAddr>() {
        return Ok(UpstreamAddr::Resolved(SocketAddr::new(ip, port)));
    }
    Ok(UpstreamAddr::Unresolved {
        hostname: host.into(),
        port,
    })
}

fn server_name_of(addr_str: &str, default_port: u16) -> Result<Arc<str>, String> {
    parse_host_port(addr_str, default_port)
        .map(|(host, _)| host.into())
        .ok_or_else(|| format!("Invalid address '{}'", addr_str))
}

impl FromStr for DnsProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(addr_str) = s.strip_prefix("udp://") {
            let addr = parse_upstream_addr(addr_str, DEFAULT_DNS_PORT)
                .map_err(|_| format!("Invalid UDP address '{}'", addr_str))?;
            return Ok(DnsProtocol::Udp { addr });
        }
        if let Some(addr_str) = s.strip_prefix("tcp://") {
            let addr = parse_upstream_addr(addr_str, DEFAULT_DNS_PORT)
                .map_err(|_| format!("Invalid TCP address '{}'", addr_str))?;
            return Ok(DnsProtocol::Tcp { addr });
        }
        if let Some(rest) = s.strip_prefix("tls://") {
            let addr = parse_upstream_addr(rest, DEFAULT_DOT_PORT).map_err(|_| {
                format!(
                    "Invalid TLS format '{}'. Expected 'tls://IP:PORT' or 'tls://HOSTNAME:PORT'",
                    s
                )
            })?;
            let hostname = server_name_of(rest, DEFAULT_DOT_PORT)?;
            return Ok(DnsProtocol::Tls { addr, hostname });
        }
        if let Some(rest) = s.strip_prefix("doq://").or_else(|| s.strip_prefix("quic://")) {
            let addr = parse_upstream_addr(rest, DEFAULT_DOQ_PORT).map_err(|_| {
                format!(
                    "Invalid QUIC format '{}'. Expected 'doq://IP:PORT' or 'doq://HOSTNAME:PORT'",
                    s
                )
            })?;
            let hostname = server_name_of(rest, DEFAULT_DOQ_PORT)?;
            return Ok(DnsProtocol::Quic { addr, hostname });
        }
        if let Some(rest) = s.strip_prefix("https://") {
            let authority = rest
                .split('/')
                .next()
                .filter(|host| !host.is_empty())
                .ok_or_else(|| format!("Invalid HTTPS URL: {}", s))?;
            let hostname = server_name_of(authority, 443)?;
            return Ok(DnsProtocol::Https {
                url: s.into(),
                hostname,
            });
        }
        if let Ok(addr) = s.parse::<SocketAddr>() {
            return Ok(DnsProtocol::Udp {
                addr: UpstreamAddr::Resolved(addr),
            });
        }
        if let Ok(ip) = s.parse::<std::net::IpAddr>() {
            return Ok(DnsProtocol::Udp {
                addr: UpstreamAddr::Resolved(SocketAddr::new(ip, DEFAULT_DNS_PORT)),
            });
        }
        Err(format!("Invalid DNS endpoint format: '{}'. Expected: udp://IP:PORT, tcp://IP:PORT, tls://HOST:PORT, https://URL, doq://HOST:PORT, or IP:PORT", s))
    }
}

impl fmt::Display for DnsProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DnsProtocol::Udp { addr } => write!(f, "udp://{}", addr),
            DnsProtocol::Tcp { addr } => write!(f, "tcp://{}", addr),
            DnsProtocol::Tls { addr, hostname } => {
                write!(f, "tls://{}:{}", hostname, addr.port())
            }
            DnsProtocol::Https { url, .. } => write!(f, "{}", url),
            DnsProtocol::Quic { addr, hostname } => {
                write!(f, "doq://{}:{}", hostname, addr.port())
            }
        }
    }
}
