use async_trait::async_trait;
use dnsmux_domain::DomainError;
use hickory_proto::op::Message;

/// Anything that turns a DNS request into a DNS response.
///
/// Implementations may mutate and return the request itself (synthesized answers)
/// or hand back an unrelated message received from a remote resolver.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn exchange(&self, message: Message) -> Result<Message, DomainError>;

    /// Short label used in logs.
    fn name(&self) -> &'static str;
}
