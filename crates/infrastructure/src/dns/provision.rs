//! Turns the `[[handlers]]` configuration into the runtime routing tree.
//!
//! Everything that can be checked is checked here, so a configuration that
//! provisions cleanly never fails for structural reasons at request time.

use crate::dns::matcher::Matcher;
use crate::dns::upstream::{CacheUpstream, ConstUpstream, ForwardUpstream, TerminateUpstream};
use dnsmux_application::ports::Upstream;
use dnsmux_application::use_cases::{RouteQueryUseCase, Rule};
use dnsmux_domain::config::{HandlerConfig, MatcherConfig, UpstreamConfig};
use dnsmux_domain::{DnsProtocol, DomainError, UpstreamAddr};
use futures::future::{BoxFuture, FutureExt};
use hickory_proto::rr::RecordType;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const MAX_NAME_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

pub async fn build_router(handlers: &[HandlerConfig]) -> Result<RouteQueryUseCase, DomainError> {
    let mut rules = Vec::with_capacity(handlers.len());

    for (index, handler) in handlers.iter().enumerate() {
        let matcher = build_rule_matcher(&handler.matchers)?;
        let upstream = build_upstream(&handler.upstream).await?;
        debug!(
            rule = index,
            matchers = handler.matchers.len(),
            upstream = upstream.name(),
            "Handler provisioned"
        );
        rules.push(Rule::new(Arc::new(matcher), upstream));
    }

    info!(handlers = rules.len(), "Routing table ready");
    Ok(RouteQueryUseCase::new(rules))
}

/// A rule applies when any of its matchers does; an empty list never applies.
pub fn build_rule_matcher(matchers: &[MatcherConfig]) -> Result<Matcher, DomainError> {
    let mut built = matchers
        .iter()
        .map(build_matcher)
        .collect::<Result<Vec<_>, _>>()?;

    if built.len() == 1 {
        return Ok(built.remove(0));
    }
    Ok(Matcher::Or(built))
}

pub fn build_matcher(config: &MatcherConfig) -> Result<Matcher, DomainError> {
    match config {
        MatcherConfig::All => Ok(Matcher::All),
        MatcherConfig::Type { types } => {
            let types = types
                .iter()
                .map(|name| parse_record_type(name))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Matcher::query_type(types))
        }
        MatcherConfig::Domain { domains } => {
            for domain in domains {
                validate_domain(domain)?;
            }
            Ok(Matcher::domain(domains))
        }
        MatcherConfig::And { matchers } => Ok(Matcher::And(
            matchers
                .iter()
                .map(build_matcher)
                .collect::<Result<_, _>>()?,
        )),
        MatcherConfig::Or { matchers } => Ok(Matcher::Or(
            matchers
                .iter()
                .map(build_matcher)
                .collect::<Result<_, _>>()?,
        )),
        MatcherConfig::Not { matcher } => Ok(Matcher::not(build_matcher(matcher)?)),
    }
}

pub fn build_upstream(config: &UpstreamConfig) -> BoxFuture<'_, Result<Arc<dyn Upstream>, DomainError>> {
    async move {
        let upstream: Arc<dyn Upstream> = match config {
            UpstreamConfig::Forward { server, timeout_ms } => {
                let protocol = DnsProtocol::from_str(server).map_err(DomainError::InvalidUpstream)?;
                let protocol = resolve(protocol).await?;
                Arc::new(ForwardUpstream::new(
                    &protocol,
                    Duration::from_millis(*timeout_ms),
                )?)
            }
            UpstreamConfig::Cache { upstream } => {
                Arc::new(CacheUpstream::new(build_upstream(upstream).await?))
            }
            UpstreamConfig::Const { record_type, value } => {
                Arc::new(ConstUpstream::parse(record_type, value)?)
            }
            UpstreamConfig::Terminate => Arc::new(TerminateUpstream),
        };
        Ok(upstream)
    }
    .boxed()
}

/// Looks up a hostname endpoint once; the first address returned is used for
/// the life of the process.
pub async fn resolve(protocol: DnsProtocol) -> Result<DnsProtocol, DomainError> {
    let (hostname, port) = match protocol.addr() {
        Some(UpstreamAddr::Unresolved { hostname, port }) => (hostname.clone(), *port),
        _ => return Ok(protocol),
    };

    let resolved = tokio::net::lookup_host((&*hostname, port))
        .await
        .map_err(|e| DomainError::InvalidUpstream(format!("cannot resolve {}: {}", hostname, e)))?
        .next()
        .ok_or_else(|| {
            DomainError::InvalidUpstream(format!("{} resolved to no addresses", hostname))
        })?;

    debug!(hostname = %hostname, addr = %resolved, "Upstream hostname resolved");
    Ok(protocol.with_resolved_addr(resolved))
}

fn parse_record_type(name: &str) -> Result<RecordType, DomainError> {
    match RecordType::from_str(&name.trim().to_ascii_uppercase()) {
        Ok(RecordType::Unknown(_)) | Err(_) => {
            Err(DomainError::InvalidRecordType(name.to_string()))
        }
        Ok(record_type) => Ok(record_type),
    }
}

fn validate_domain(domain: &str) -> Result<(), DomainError> {
    let name = domain.strip_suffix('.').unwrap_or(domain);
    let invalid = || DomainError::InvalidDomainName(domain.to_string());

    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(invalid());
    }
    for label in name.split('.') {
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return Err(invalid());
        }
        if !label
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(invalid());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_record_type_is_case_insensitive() {
        assert_eq!(parse_record_type("aaaa").unwrap(), RecordType::AAAA);
        assert_eq!(parse_record_type(" MX ").unwrap(), RecordType::MX);
        assert!(matches!(
            parse_record_type("NOPE"),
            Err(DomainError::InvalidRecordType(_))
        ));
    }

    #[test]
    fn test_validate_domain() {
        assert!(validate_domain("example.com").is_ok());
        assert!(validate_domain("example.com.").is_ok());
        assert!(validate_domain("_dmarc.example.com").is_ok());
        assert!(validate_domain("").is_err());
        assert!(validate_domain("a..b").is_err());
        assert!(validate_domain("exa mple.com").is_err());
        assert!(validate_domain(&"a".repeat(64)).is_err());
    }
}
