use async_trait::async_trait;
use dnsmux_application::ports::Upstream;
use dnsmux_domain::DomainError;
use hickory_proto::op::{Message, MessageType};
use hickory_proto::rr::rdata::{A, AAAA};
use hickory_proto::rr::{RData, Record, RecordType};
use std::net::IpAddr;
use std::str::FromStr;

/// TTL of synthesized records.
pub const CONST_TTL: u32 = 0;

/// Answers A or AAAA questions with one fixed address.
#[derive(Debug, Clone)]
pub struct ConstUpstream {
    record_type: RecordType,
    rdata: RData,
}

impl ConstUpstream {
    pub fn new(record_type: RecordType, value: IpAddr) -> Result<Self, DomainError> {
        let rdata = match (record_type, value) {
            (RecordType::A, IpAddr::V4(v4)) => RData::A(A(v4)),
            (RecordType::AAAA, IpAddr::V6(v6)) => RData::AAAA(AAAA(v6)),
            (RecordType::A | RecordType::AAAA, _) => {
                return Err(DomainError::InvalidIpAddress(format!(
                    "{} cannot answer {} queries",
                    value, record_type
                )))
            }
            _ => {
                return Err(DomainError::InvalidRecordType(format!(
                    "const upstream only answers A or AAAA, got {}",
                    record_type
                )))
            }
        };
        Ok(Self { record_type, rdata })
    }

    /// Builds from configuration strings such as `("AAAA", "2001:db8::1")`.
    pub fn parse(record_type: &str, value: &str) -> Result<Self, DomainError> {
        let record_type = RecordType::from_str(&record_type.to_ascii_uppercase())
            .map_err(|_| DomainError::InvalidRecordType(record_type.to_string()))?;
        let value = value
            .trim()
            .parse::<IpAddr>()
            .map_err(|_| DomainError::InvalidIpAddress(value.to_string()))?;
        Self::new(record_type, value)
    }

    pub fn record_type(&self) -> RecordType {
        self.record_type
    }
}

#[async_trait]
impl Upstream for ConstUpstream {
    async fn exchange(&self, mut message: Message) -> Result<Message, DomainError> {
        message.set_message_type(MessageType::Response);

        let name = message
            .queries()
            .iter()
            .find(|query| query.query_type() == self.record_type)
            .map(|query| query.name().clone());

        if let Some(name) = name {
            message.take_answers();
            message.add_answer(Record::from_rdata(name, CONST_TTL, self.rdata.clone()));
        }

        Ok(message)
    }

    fn name(&self) -> &'static str {
        "const"
    }
}
