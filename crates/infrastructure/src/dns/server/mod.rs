//! Listener loops: datagram, stream (TCP/TLS), DoQ and DoH.
//!
//! Every transport funnels requests through [`exchange_in_buffer`]: decode the
//! bytes in a pooled buffer, hand the message to the root upstream, encode the
//! reply back into the same buffer.

#[cfg(feature = "dns-over-https")]
pub mod doh;
pub mod packet;
#[cfg(feature = "dns-over-quic")]
pub mod quic;
pub mod stream;

#[cfg(feature = "dns-over-https")]
pub use doh::{doh_router, DohState};
pub use packet::PacketServer;
#[cfg(feature = "dns-over-quic")]
pub use quic::QuicServer;
pub use stream::StreamServer;

use crate::dns::buffer_pool::PooledBuffer;
use crate::dns::codec::decode_message;
use dnsmux_application::ports::Upstream;
use dnsmux_domain::DomainError;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use tracing::error;

/// Where in a request's life a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Read,
    Decode,
    Exchange,
    Encode,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Read => "read",
            Stage::Decode => "decode",
            Stage::Exchange => "exchange",
            Stage::Encode => "encode",
            Stage::Write => "write",
        })
    }
}

/// Answers the `len`-byte request at the front of `buffer`, leaving the
/// encoded response there. Returns the response length.
pub(crate) async fn exchange_in_buffer(
    upstream: &dyn Upstream,
    buffer: &mut PooledBuffer,
    len: usize,
) -> Result<usize, (Stage, DomainError)> {
    let request = decode_message(&buffer[..len]).map_err(|e| (Stage::Decode, e))?;
    let response = upstream
        .exchange(request)
        .await
        .map_err(|e| (Stage::Exchange, e))?;
    buffer.encode(&response).map_err(|e| (Stage::Encode, e))
}

/// Sorts socket errors into the three outcomes a server loop cares about.
pub(crate) fn classify_io(err: io::Error) -> DomainError {
    match err.kind() {
        io::ErrorKind::Interrupted
        | io::ErrorKind::WouldBlock
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::TimedOut => DomainError::TransientIo(err.to_string()),
        io::ErrorKind::UnexpectedEof
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::NotConnected => DomainError::TransportClosed,
        _ => DomainError::IoError(err.to_string()),
    }
}

pub(crate) fn log_failure(transport: &str, stage: Stage, peer: SocketAddr, err: &DomainError) {
    error!(transport, %stage, %peer, error = %err, "DNS request failed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_io() {
        let transient = classify_io(io::Error::from(io::ErrorKind::ConnectionReset));
        assert!(transient.is_transient());

        let closed = classify_io(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(closed.is_closed());

        let fatal = classify_io(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(!fatal.is_closed() && !fatal.is_transient());
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Exchange.to_string(), "exchange");
    }
}
