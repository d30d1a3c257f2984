mod helpers;

use dnsmux_application::ports::QueryMatcher;
use dnsmux_domain::config::{Config, HandlerConfig, MatcherConfig, UpstreamConfig};
use dnsmux_domain::DomainError;
use dnsmux_infrastructure::dns::provision::{build_matcher, build_router, build_rule_matcher};
use helpers::{answer_ips, query, MockResolver, ANSWER_IP};
use hickory_proto::rr::RecordType;
use std::net::{IpAddr, Ipv4Addr};

fn handler(matchers: Vec<MatcherConfig>, upstream: UpstreamConfig) -> HandlerConfig {
    HandlerConfig { matchers, upstream }
}

fn constant(ip: &str) -> UpstreamConfig {
    UpstreamConfig::Const {
        record_type: "A".to_string(),
        value: ip.to_string(),
    }
}

#[tokio::test]
async fn test_builds_ordered_table_from_toml() {
    let config = Config::from_toml(
        r#"
        [[handlers]]
        match = [{ kind = "domain", domains = ["lan"] }]
        upstream = { kind = "const", type = "A", value = "192.168.1.1" }

        [[handlers]]
        match = [{ kind = "all" }]
        upstream = { kind = "const", value = "10.0.0.1" }
        "#,
    )
    .unwrap();

    let router = build_router(&config.handlers).await.unwrap();
    assert_eq!(router.len(), 2);

    let lan = router.execute(query("nas.lan.", RecordType::A)).await.unwrap();
    assert_eq!(answer_ips(&lan), vec![IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))]);

    let other = router.execute(query("example.com.", RecordType::A)).await.unwrap();
    assert_eq!(answer_ips(&other), vec![IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))]);
}

#[tokio::test]
async fn test_rule_without_matchers_never_applies() {
    let router = build_router(&[handler(vec![], UpstreamConfig::Terminate)])
        .await
        .unwrap();

    let result = router.execute(query("example.com.", RecordType::A)).await;
    assert_eq!(result.unwrap_err(), DomainError::NoMatchingHandler);
}

#[tokio::test]
async fn test_match_list_is_any_of() {
    let matcher = build_rule_matcher(&[
        MatcherConfig::Type {
            types: vec!["MX".to_string()],
        },
        MatcherConfig::Domain {
            domains: vec!["example.com".to_string()],
        },
    ])
    .unwrap();

    assert!(matcher.matches(&query("example.com.", RecordType::A)));
    assert!(matcher.matches(&query("example.org.", RecordType::MX)));
    assert!(!matcher.matches(&query("example.org.", RecordType::A)));
}

#[tokio::test]
async fn test_cached_forward_chain() {
    let resolver = MockResolver::start().await;
    let router = build_router(&[handler(
        vec![MatcherConfig::All],
        UpstreamConfig::Cache {
            upstream: Box::new(UpstreamConfig::Forward {
                server: format!("udp://{}", resolver.addr()),
                timeout_ms: 2_000,
            }),
        },
    )])
    .await
    .unwrap();

    let first = router.execute(query("cached.example.", RecordType::A)).await.unwrap();
    drop(resolver);
    let second = router.execute(query("cached.example.", RecordType::A)).await.unwrap();

    assert_eq!(answer_ips(&first), vec![IpAddr::V4(ANSWER_IP)]);
    assert_eq!(answer_ips(&second), vec![IpAddr::V4(ANSWER_IP)]);
}

#[tokio::test]
async fn test_invalid_configuration_fails_provisioning() {
    let bad_type = build_router(&[handler(
        vec![MatcherConfig::Type {
            types: vec!["BOGUS".to_string()],
        }],
        UpstreamConfig::Terminate,
    )])
    .await;
    assert!(matches!(bad_type, Err(DomainError::InvalidRecordType(_))));

    let bad_domain = build_matcher(&MatcherConfig::Domain {
        domains: vec!["bad..domain".to_string()],
    });
    assert!(matches!(bad_domain, Err(DomainError::InvalidDomainName(_))));

    let bad_ip = build_router(&[handler(vec![MatcherConfig::All], constant("2001:db8::1"))]).await;
    assert!(matches!(bad_ip, Err(DomainError::InvalidIpAddress(_))));

    let bad_server = build_router(&[handler(
        vec![MatcherConfig::All],
        UpstreamConfig::Forward {
            server: "carrier-pigeon://home".to_string(),
            timeout_ms: 1_000,
        },
    )])
    .await;
    assert!(matches!(bad_server, Err(DomainError::InvalidUpstream(_))));
}

#[test]
fn test_nested_matchers_build() {
    let matcher = build_matcher(&MatcherConfig::Not {
        matcher: Box::new(MatcherConfig::And { matchers: vec![] }),
    })
    .unwrap();
    assert_eq!(matcher.kind(), "not");
}
