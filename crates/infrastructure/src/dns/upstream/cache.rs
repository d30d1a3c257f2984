use async_trait::async_trait;
use dashmap::DashMap;
use dnsmux_application::ports::Upstream;
use dnsmux_domain::DomainError;
use hickory_proto::op::{Message, MessageType, Query};
use hickory_proto::rr::{LowerName, Record, RecordType};
use rustc_hash::FxBuildHasher;
use std::sync::Arc;
use tracing::debug;

type CacheKey = (LowerName, RecordType);

fn cache_key(query: &Query) -> CacheKey {
    (LowerName::new(query.name()), query.query_type())
}

/// Remembers the first answer record per question and replays it forever.
///
/// Entries are keyed by lowercased name and query type. There is no TTL,
/// expiry or eviction.
pub struct CacheUpstream {
    inner: Arc<dyn Upstream>,
    entries: DashMap<CacheKey, Record, FxBuildHasher>,
}

impl CacheUpstream {
    pub fn new(inner: Arc<dyn Upstream>) -> Self {
        Self {
            inner,
            entries: DashMap::with_hasher(FxBuildHasher),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&self, message: &Message) -> Option<Record> {
        message
            .queries()
            .iter()
            .find_map(|query| self.entries.get(&cache_key(query)).map(|hit| hit.value().clone()))
    }
}

#[async_trait]
impl Upstream for CacheUpstream {
    async fn exchange(&self, mut message: Message) -> Result<Message, DomainError> {
        if let Some(record) = self.lookup(&message) {
            debug!(name = %record.name(), "Cache hit");
            message.set_message_type(MessageType::Response);
            message.take_answers();
            message.add_answer(record);
            return Ok(message);
        }

        let key = message.queries().first().map(cache_key);
        let response = self.inner.exchange(message).await?;

        if let (Some(key), Some(answer)) = (key, response.answers().first()) {
            self.entries.insert(key, answer.clone());
        }

        Ok(response)
    }

    fn name(&self) -> &'static str {
        "cache"
    }
}
