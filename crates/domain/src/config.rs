pub mod errors;
pub mod handler;
pub mod logging;
pub mod root;
pub mod server;

pub use errors::ConfigError;
pub use handler::{HandlerConfig, MatcherConfig, UpstreamConfig};
pub use logging::{LogFormat, LoggingConfig};
pub use root::{CliOverrides, Config};
pub use server::{DohConfig, ListenerKind, ServerConfig, TlsConfig};
