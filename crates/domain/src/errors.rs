use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Malformed DNS message: {0}")]
    DecodeError(String),

    #[error("DNS message cannot be encoded: {0}")]
    EncodeError(String),

    #[error("Upstream {server} unreachable: {reason}")]
    UpstreamUnreachable { server: String, reason: String },

    #[error("Upstream {server} timed out")]
    UpstreamTimeout { server: String },

    #[error("No handler matched the query")]
    NoMatchingHandler,

    #[error("Transport closed")]
    TransportClosed,

    #[error("Transient I/O error: {0}")]
    TransientIo(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Invalid domain name: {0}")]
    InvalidDomainName(String),

    #[error("Invalid IP address: {0}")]
    InvalidIpAddress(String),

    #[error("Invalid record type: {0}")]
    InvalidRecordType(String),

    #[error("Invalid upstream endpoint: {0}")]
    InvalidUpstream(String),

    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl DomainError {
    /// Errors that end a server loop without being reported.
    pub fn is_closed(&self) -> bool {
        matches!(self, DomainError::TransportClosed)
    }

    /// Errors after which a server loop keeps going.
    pub fn is_transient(&self) -> bool {
        matches!(self, DomainError::TransientIo(_))
    }
}
