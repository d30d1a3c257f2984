//! dnsmux infrastructure: wire handling, matchers, upstreams, listeners and
//! the provisioning that wires them together.
pub mod dns;
pub mod tls;
