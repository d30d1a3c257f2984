use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_UDP_PORT: u16 = 53;
pub const DEFAULT_TCP_PORT: u16 = 53;
pub const DEFAULT_TLS_PORT: u16 = 853;
pub const DEFAULT_QUIC_PORT: u16 = 853;
pub const DEFAULT_HTTPS_PORT: u16 = 443;
pub const DEFAULT_DOH_PATH: &str = "/dns-query";

/// Transport a listener serves.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ListenerKind {
    Udp,
    Tcp,
    Tls,
    Quic,
    Https,
}

impl ListenerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Udp => "udp",
            Self::Tcp => "tcp",
            Self::Tls => "tls",
            Self::Quic => "quic",
            Self::Https => "https",
        }
    }

    pub fn requires_tls(&self) -> bool {
        matches!(self, Self::Tls | Self::Quic | Self::Https)
    }
}

impl fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_listeners")]
    pub listeners: Vec<ListenerKind>,

    #[serde(default = "default_udp_port")]
    pub udp_port: u16,

    #[serde(default = "default_tcp_port")]
    pub tcp_port: u16,

    #[serde(default = "default_tls_port")]
    pub tls_port: u16,

    #[serde(default = "default_quic_port")]
    pub quic_port: u16,

    #[serde(default = "default_https_port")]
    pub https_port: u16,

    /// Read deadline for TCP/TLS connections, reset before every request.
    #[serde(default = "default_stream_idle_timeout_secs")]
    pub stream_idle_timeout_secs: u64,

    /// Idle timeout for DoQ connections.
    #[serde(default = "default_quic_idle_timeout_secs")]
    pub quic_idle_timeout_secs: u64,
}

impl ServerConfig {
    pub fn port_for(&self, kind: ListenerKind) -> u16 {
        match kind {
            ListenerKind::Udp => self.udp_port,
            ListenerKind::Tcp => self.tcp_port,
            ListenerKind::Tls => self.tls_port,
            ListenerKind::Quic => self.quic_port,
            ListenerKind::Https => self.https_port,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            listeners: default_listeners(),
            udp_port: DEFAULT_UDP_PORT,
            tcp_port: DEFAULT_TCP_PORT,
            tls_port: DEFAULT_TLS_PORT,
            quic_port: DEFAULT_QUIC_PORT,
            https_port: DEFAULT_HTTPS_PORT,
            stream_idle_timeout_secs: default_stream_idle_timeout_secs(),
            quic_idle_timeout_secs: default_quic_idle_timeout_secs(),
        }
    }
}

/// PEM material shared by the TLS, QUIC and HTTPS listeners.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DohConfig {
    #[serde(default = "default_doh_path")]
    pub path: String,
}

impl Default for DohConfig {
    fn default() -> Self {
        Self {
            path: default_doh_path(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_listeners() -> Vec<ListenerKind> {
    vec![ListenerKind::Udp, ListenerKind::Tcp]
}

fn default_udp_port() -> u16 {
    DEFAULT_UDP_PORT
}

fn default_tcp_port() -> u16 {
    DEFAULT_TCP_PORT
}

fn default_tls_port() -> u16 {
    DEFAULT_TLS_PORT
}

fn default_quic_port() -> u16 {
    DEFAULT_QUIC_PORT
}

fn default_https_port() -> u16 {
    DEFAULT_HTTPS_PORT
}

fn default_stream_idle_timeout_secs() -> u64 {
    60
}

fn default_quic_idle_timeout_secs() -> u64 {
    300
}

fn default_doh_path() -> String {
    DEFAULT_DOH_PATH.to_string()
}
