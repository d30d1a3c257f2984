mod helpers;

use dnsmux_application::ports::QueryMatcher;
use dnsmux_infrastructure::dns::Matcher;
use helpers::query;
use hickory_proto::op::{Message, Query};
use hickory_proto::rr::{Name, RecordType};

fn never() -> Matcher {
    Matcher::Or(vec![])
}

#[test]
fn test_all_matches_everything() {
    assert!(Matcher::All.matches(&query("example.com.", RecordType::TXT)));
}

#[test]
fn test_empty_and_is_true_empty_or_is_false() {
    let message = query("example.com.", RecordType::A);
    assert!(Matcher::And(vec![]).matches(&message));
    assert!(!Matcher::Or(vec![]).matches(&message));
}

#[test]
fn test_not_negates_its_child() {
    let message = query("example.com.", RecordType::A);
    assert!(!Matcher::not(Matcher::All).matches(&message));
    assert!(Matcher::not(never()).matches(&message));
}

#[test]
fn test_query_type_matches_configured_types() {
    let matcher = Matcher::query_type([RecordType::A, RecordType::AAAA]);
    assert!(matcher.matches(&query("example.com.", RecordType::AAAA)));
    assert!(!matcher.matches(&query("example.com.", RecordType::MX)));
}

#[test]
fn test_domain_matches_by_suffix() {
    let matcher = Matcher::domain(["lan"]);
    assert!(matcher.matches(&query("nas.lan.", RecordType::A)));
    assert!(!matcher.matches(&query("nas.plan.", RecordType::A)));
}

#[test]
fn test_domain_keeps_label_with_escaped_dot_whole() {
    let mut name = Name::from_labels(vec![&b"a.b"[..], &b"example"[..], &b"com"[..]]).unwrap();
    name.set_fqdn(true);
    let mut message = Message::new();
    message.add_query(Query::query(name, RecordType::A));

    assert!(!Matcher::domain(["b.example.com"]).matches(&message));
    assert!(Matcher::domain(["example.com"]).matches(&message));
}

#[test]
fn test_combinators_compose() {
    let matcher = Matcher::And(vec![
        Matcher::domain(["example.com"]),
        Matcher::not(Matcher::query_type([RecordType::AAAA])),
    ]);

    assert!(matcher.matches(&query("www.example.com.", RecordType::A)));
    assert!(!matcher.matches(&query("www.example.com.", RecordType::AAAA)));
    assert!(!matcher.matches(&query("www.example.org.", RecordType::A)));
    assert_eq!(matcher.kind(), "and");
}

#[test]
fn test_matcher_is_usable_as_port() {
    let matcher: Box<dyn QueryMatcher> = Box::new(Matcher::All);
    assert!(matcher.matches(&query("example.com.", RecordType::A)));
}
