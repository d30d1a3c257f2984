//! dnsmux domain layer: configuration model, upstream endpoints and errors.
pub mod config;
pub mod dns_protocol;
pub mod errors;

pub use config::{CliOverrides, Config};
pub use dns_protocol::{DnsProtocol, UpstreamAddr};
pub use errors::DomainError;
