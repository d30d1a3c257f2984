use async_trait::async_trait;
use dnsmux_application::ports::Upstream;
use dnsmux_domain::DomainError;
use hickory_proto::op::Message;

/// Echoes the request back untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminateUpstream;

#[async_trait]
impl Upstream for TerminateUpstream {
    async fn exchange(&self, message: Message) -> Result<Message, DomainError> {
        Ok(message)
    }

    fn name(&self) -> &'static str {
        "terminate"
    }
}
