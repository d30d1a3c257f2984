use crate::dns::codec::{decode_message, encode_message};
use crate::dns::transport::{create_transport, Transport};
use async_trait::async_trait;
use dnsmux_application::ports::Upstream;
use dnsmux_domain::{DnsProtocol, DomainError};
use hickory_proto::op::Message;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_FORWARD_TIMEOUT: Duration = Duration::from_secs(5);

/// Relays queries to one remote resolver over the protocol named by its address.
pub struct ForwardUpstream {
    transport: Transport,
    server: String,
    timeout: Duration,
}

impl ForwardUpstream {
    /// `protocol` must carry a resolved socket address; see
    /// [`DnsProtocol::with_resolved_addr`].
    pub fn new(protocol: &DnsProtocol, timeout: Duration) -> Result<Self, DomainError> {
        Ok(Self {
            transport: create_transport(protocol)?,
            server: protocol.to_string(),
            timeout,
        })
    }

    pub fn server(&self) -> &str {
        &self.server
    }
}

#[async_trait]
impl Upstream for ForwardUpstream {
    async fn exchange(&self, message: Message) -> Result<Message, DomainError> {
        let request = encode_message(&message)?;
        let response = self.transport.send(&request, self.timeout).await?;
        let reply = decode_message(&response.bytes)?;

        if reply.id() != message.id() {
            return Err(DomainError::UpstreamUnreachable {
                server: self.server.clone(),
                reason: format!(
                    "response id {} does not match query id {}",
                    reply.id(),
                    message.id()
                ),
            });
        }

        debug!(
            server = %self.server,
            protocol = response.protocol_used,
            answers = reply.answers().len(),
            "Upstream answered"
        );
        Ok(reply)
    }

    fn name(&self) -> &'static str {
        "forward"
    }
}
