#![allow(dead_code)]

use async_trait::async_trait;
use dnsmux_application::ports::{QueryMatcher, Upstream};
use dnsmux_domain::DomainError;
use hickory_proto::op::{Message, MessageType, Query};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{Name, RData, Record, RecordType};
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn query(name: &str, record_type: RecordType) -> Message {
    let mut message = Message::new();
    message.set_id(4242);
    message.add_query(Query::query(Name::from_str(name).unwrap(), record_type));
    message
}

pub fn first_answer_ip(message: &Message) -> Option<Ipv4Addr> {
    message.answers().first().and_then(|record| match record.data() {
        RData::A(a) => Some(a.0),
        _ => None,
    })
}

/// Answers every query with one A record carrying `ip` and counts calls.
pub struct MockUpstream {
    ip: Ipv4Addr,
    calls: AtomicUsize,
    fail: bool,
}

impl MockUpstream {
    pub fn answering(ip: Ipv4Addr) -> Self {
        Self {
            ip,
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            ip: Ipv4Addr::UNSPECIFIED,
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Upstream for MockUpstream {
    async fn exchange(&self, mut message: Message) -> Result<Message, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DomainError::UpstreamTimeout {
                server: "mock".to_string(),
            });
        }
        let name = message
            .queries()
            .first()
            .map(|q| q.name().clone())
            .unwrap_or_else(Name::root);
        message.set_message_type(MessageType::Response);
        message.add_answer(Record::from_rdata(name, 60, RData::A(A(self.ip))));
        Ok(message)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

pub struct FixedMatcher(pub bool);

impl QueryMatcher for FixedMatcher {
    fn matches(&self, _message: &Message) -> bool {
        self.0
    }
}

/// Matches when the first question's name equals the given name.
pub struct NameMatcher(pub &'static str);

impl QueryMatcher for NameMatcher {
    fn matches(&self, message: &Message) -> bool {
        message
            .queries()
            .iter()
            .any(|q| q.name().to_ascii().trim_end_matches('.') == self.0)
    }
}
