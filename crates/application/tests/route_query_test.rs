mod helpers;

use dnsmux_application::ports::Upstream;
use dnsmux_application::use_cases::{RouteQueryUseCase, Rule};
use dnsmux_domain::DomainError;
use helpers::{first_answer_ip, query, FixedMatcher, MockUpstream, NameMatcher};
use hickory_proto::rr::RecordType;
use std::net::Ipv4Addr;
use std::sync::Arc;

const FIRST: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
const SECOND: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);

#[tokio::test]
async fn test_first_matching_rule_answers() {
    let first = Arc::new(MockUpstream::answering(FIRST));
    let second = Arc::new(MockUpstream::answering(SECOND));
    let router = RouteQueryUseCase::new(vec![
        Rule::new(Arc::new(FixedMatcher(true)), first.clone()),
        Rule::new(Arc::new(FixedMatcher(true)), second.clone()),
    ]);

    let response = router.execute(query("example.com.", RecordType::A)).await.unwrap();

    assert_eq!(first_answer_ip(&response), Some(FIRST));
    assert_eq!(first.calls(), 1);
    assert_eq!(second.calls(), 0);
}

#[tokio::test]
async fn test_rule_order_decides_answering_upstream() {
    let first = Arc::new(MockUpstream::answering(FIRST));
    let second = Arc::new(MockUpstream::answering(SECOND));

    let forward = RouteQueryUseCase::new(vec![
        Rule::new(Arc::new(FixedMatcher(true)), first.clone()),
        Rule::new(Arc::new(FixedMatcher(true)), second.clone()),
    ]);
    let swapped = RouteQueryUseCase::new(vec![
        Rule::new(Arc::new(FixedMatcher(true)), second.clone()),
        Rule::new(Arc::new(FixedMatcher(true)), first.clone()),
    ]);

    let a = forward.execute(query("example.com.", RecordType::A)).await.unwrap();
    let b = swapped.execute(query("example.com.", RecordType::A)).await.unwrap();

    assert_eq!(first_answer_ip(&a), Some(FIRST));
    assert_eq!(first_answer_ip(&b), Some(SECOND));
}

#[tokio::test]
async fn test_skips_rules_that_do_not_match() {
    let lan = Arc::new(MockUpstream::answering(FIRST));
    let fallback = Arc::new(MockUpstream::answering(SECOND));
    let router = RouteQueryUseCase::new(vec![
        Rule::new(Arc::new(NameMatcher("printer.lan")), lan.clone()),
        Rule::new(Arc::new(FixedMatcher(true)), fallback.clone()),
    ]);

    let response = router.execute(query("example.com.", RecordType::A)).await.unwrap();
    assert_eq!(first_answer_ip(&response), Some(SECOND));
    assert_eq!(lan.calls(), 0);

    let response = router.execute(query("printer.lan.", RecordType::A)).await.unwrap();
    assert_eq!(first_answer_ip(&response), Some(FIRST));
    assert_eq!(lan.calls(), 1);
    assert_eq!(fallback.calls(), 1);
}

#[tokio::test]
async fn test_no_match_fails_without_contacting_upstreams() {
    let upstream = Arc::new(MockUpstream::answering(FIRST));
    let router = RouteQueryUseCase::new(vec![Rule::new(
        Arc::new(FixedMatcher(false)),
        upstream.clone(),
    )]);

    let result = router.execute(query("example.com.", RecordType::A)).await;

    assert_eq!(result.unwrap_err(), DomainError::NoMatchingHandler);
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn test_empty_table_fails() {
    let router = RouteQueryUseCase::new(vec![]);
    assert!(router.is_empty());
    let result = router.execute(query("example.com.", RecordType::A)).await;
    assert_eq!(result.unwrap_err(), DomainError::NoMatchingHandler);
}

#[tokio::test]
async fn test_upstream_error_is_returned_verbatim() {
    let failing = Arc::new(MockUpstream::failing());
    let fallback = Arc::new(MockUpstream::answering(SECOND));
    let router = RouteQueryUseCase::new(vec![
        Rule::new(Arc::new(FixedMatcher(true)), failing.clone()),
        Rule::new(Arc::new(FixedMatcher(true)), fallback.clone()),
    ]);

    let result = router.execute(query("example.com.", RecordType::A)).await;

    assert!(matches!(result, Err(DomainError::UpstreamTimeout { .. })));
    assert_eq!(fallback.calls(), 0);
}

#[tokio::test]
async fn test_router_is_an_upstream() {
    let upstream = Arc::new(MockUpstream::answering(FIRST));
    let router: Arc<dyn Upstream> = Arc::new(RouteQueryUseCase::new(vec![Rule::new(
        Arc::new(FixedMatcher(true)),
        upstream,
    )]));

    let response = router.exchange(query("example.com.", RecordType::A)).await.unwrap();
    assert_eq!(router.name(), "router");
    assert_eq!(response.id(), 4242);
    assert_eq!(response.answers().len(), 1);
}
