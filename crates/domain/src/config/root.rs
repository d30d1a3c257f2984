use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::errors::ConfigError;
use super::handler::{HandlerConfig, MatcherConfig, UpstreamConfig};
use super::logging::{LoggingConfig, LOG_LEVELS};
use super::server::{DohConfig, ServerConfig, TlsConfig};

/// Main configuration structure for dnsmux
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Listeners and their ports
    #[serde(default)]
    pub server: ServerConfig,

    /// Certificate and key for the encrypted listeners
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,

    #[serde(default)]
    pub doh: DohConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Ordered routing table; the first rule whose matchers accept a query answers it
    #[serde(default)]
    pub handlers: Vec<HandlerConfig>,
}

impl Config {
    /// Load configuration from file or use defaults
    ///
    /// Priority order:
    /// 1. Explicitly provided path
    /// 2. dnsmux.toml in current directory
    /// 3. /etc/dnsmux/config.toml
    /// 4. Default configuration
    pub fn load(path: Option<&str>, cli_overrides: CliOverrides) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = path {
            Self::from_file(path)?
        } else if std::path::Path::new("dnsmux.toml").exists() {
            Self::from_file("dnsmux.toml")?
        } else if std::path::Path::new("/etc/dnsmux/config.toml").exists() {
            Self::from_file("/etc/dnsmux/config.toml")?
        } else {
            Self::default()
        };

        config.apply_cli_overrides(cli_overrides);
        Ok(config)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn apply_cli_overrides(&mut self, overrides: CliOverrides) {
        if let Some(bind) = overrides.bind_address {
            self.server.bind_address = bind;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.listeners.is_empty() {
            return Err(ConfigError::Validation(
                "At least one listener must be enabled".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for kind in &self.server.listeners {
            if !seen.insert(*kind) {
                return Err(ConfigError::Validation(format!(
                    "Listener '{}' is listed more than once",
                    kind
                )));
            }
            if self.server.port_for(*kind) == 0 {
                return Err(ConfigError::Validation(format!(
                    "Port for listener '{}' cannot be 0",
                    kind
                )));
            }
            if kind.requires_tls() && self.tls.is_none() {
                return Err(ConfigError::Validation(format!(
                    "Listener '{}' requires a [tls] section with cert_path and key_path",
                    kind
                )));
            }
        }

        if self.server.stream_idle_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "stream_idle_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.server.quic_idle_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "quic_idle_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if !self.logging.is_known_level() {
            return Err(ConfigError::Validation(format!(
                "Unknown log level '{}', expected one of: {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }

        if !self.doh.path.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "DoH path '{}' must start with '/'",
                self.doh.path
            )));
        }

        if self.handlers.is_empty() {
            return Err(ConfigError::Validation(
                "No handlers configured".to_string(),
            ));
        }

        for (index, handler) in self.handlers.iter().enumerate() {
            for matcher in &handler.matchers {
                validate_matcher(matcher)
                    .map_err(|e| ConfigError::Validation(format!("Handler #{}: {}", index, e)))?;
            }
            validate_upstream(&handler.upstream)
                .map_err(|e| ConfigError::Validation(format!("Handler #{}: {}", index, e)))?;
        }

        Ok(())
    }
}

fn validate_matcher(matcher: &MatcherConfig) -> Result<(), String> {
    match matcher {
        MatcherConfig::All => Ok(()),
        MatcherConfig::Type { types } if types.is_empty() => {
            Err("type matcher needs at least one record type".to_string())
        }
        MatcherConfig::Type { .. } => Ok(()),
        MatcherConfig::Domain { domains } if domains.is_empty() => {
            Err("domain matcher needs at least one domain".to_string())
        }
        MatcherConfig::Domain { .. } => Ok(()),
        MatcherConfig::And { matchers } | MatcherConfig::Or { matchers } => {
            matchers.iter().try_for_each(validate_matcher)
        }
        MatcherConfig::Not { matcher } => validate_matcher(matcher),
    }
}

fn validate_upstream(upstream: &UpstreamConfig) -> Result<(), String> {
    match upstream {
        UpstreamConfig::Forward { server, timeout_ms } => {
            if server.trim().is_empty() {
                return Err("forward upstream needs a server".to_string());
            }
            if *timeout_ms == 0 {
                return Err(format!("forward upstream '{}' has a zero timeout", server));
            }
            Ok(())
        }
        UpstreamConfig::Cache { upstream } => validate_upstream(upstream),
        UpstreamConfig::Const { value, .. } if value.trim().is_empty() => {
            Err("const upstream needs a value".to_string())
        }
        UpstreamConfig::Const { .. } | UpstreamConfig::Terminate => Ok(()),
    }
}

/// Command-line overrides for configuration
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub bind_address: Option<String>,
    pub log_level: Option<String>,
}
