use crate::ports::{QueryMatcher, Upstream};
use async_trait::async_trait;
use dnsmux_domain::DomainError;
use hickory_proto::op::Message;
use std::sync::Arc;
use tracing::debug;

/// A matcher paired with the upstream that answers what it accepts.
#[derive(Clone)]
pub struct Rule {
    pub matcher: Arc<dyn QueryMatcher>,
    pub upstream: Arc<dyn Upstream>,
}

impl Rule {
    pub fn new(matcher: Arc<dyn QueryMatcher>, upstream: Arc<dyn Upstream>) -> Self {
        Self { matcher, upstream }
    }
}

/// Ordered, first-match-wins handler table.
pub struct RouteQueryUseCase {
    rules: Vec<Rule>,
}

impl RouteQueryUseCase {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub async fn execute(&self, message: Message) -> Result<Message, DomainError> {
        for (index, rule) in self.rules.iter().enumerate() {
            if rule.matcher.matches(&message) {
                debug!(
                    rule = index,
                    upstream = rule.upstream.name(),
                    id = message.id(),
                    "Query routed"
                );
                return rule.upstream.exchange(message).await;
            }
        }

        debug!(id = message.id(), "No handler matched");
        Err(DomainError::NoMatchingHandler)
    }
}

#[async_trait]
impl Upstream for RouteQueryUseCase {
    async fn exchange(&self, message: Message) -> Result<Message, DomainError> {
        self.execute(message).await
    }

    fn name(&self) -> &'static str {
        "router"
    }
}
