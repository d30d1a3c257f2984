//! HTTPS Transport for DNS queries: DNS-over-HTTPS (RFC 8484)
//!
//! Sends DNS queries as HTTP POST requests with `application/dns-message` content type.
//! The request body is the raw DNS wire format message, and the response body
//! contains the raw DNS wire format response.
//!
//! Wire format (HTTP):
//! ```text
//! POST /dns-query HTTP/2
//! Content-Type: application/dns-message
//! Accept: application/dns-message
//!
//! <raw DNS message bytes>
//! ```

use super::{timed_out, unreachable, DnsTransport, TransportResponse};
use async_trait::async_trait;
use dnsmux_domain::DomainError;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Expected content type for DNS-over-HTTPS responses (RFC 8484 §4.2.1)
pub const DNS_MESSAGE_CONTENT_TYPE: &str = "application/dns-message";

/// DNS-over-HTTPS transport (RFC 8484)
pub struct HttpsTransport {
    url: String,
    client: reqwest::Client,
}

impl HttpsTransport {
    pub fn new(url: String) -> Result<Self, DomainError> {
        crate::tls::install_crypto_provider();

        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| {
                DomainError::InvalidUpstream(format!("cannot build HTTPS client for {}: {}", url, e))
            })?;

        Ok(Self { url, client })
    }
}

#[async_trait]
impl DnsTransport for HttpsTransport {
    async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, DomainError> {
        let deadline = Instant::now() + timeout;

        debug!(
            url = %self.url,
            message_len = message_bytes.len(),
            "Sending DoH query"
        );

        let response = tokio::time::timeout_at(
            deadline,
            self.client
                .post(&self.url)
                .header(http::header::CONTENT_TYPE, DNS_MESSAGE_CONTENT_TYPE)
                .header(http::header::ACCEPT, DNS_MESSAGE_CONTENT_TYPE)
                .body(message_bytes.to_vec())
                .send(),
        )
        .await
        .map_err(|_| timed_out(&self.url))?
        .map_err(|e| unreachable(&self.url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unreachable(
                &self.url,
                format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown")
                ),
            ));
        }

        let response_bytes = tokio::time::timeout_at(deadline, response.bytes())
            .await
            .map_err(|_| timed_out(&self.url))?
            .map_err(|e| unreachable(&self.url, e))?;

        debug!(
            url = %self.url,
            response_len = response_bytes.len(),
            "DoH response received"
        );

        Ok(TransportResponse {
            bytes: response_bytes,
            protocol_used: "HTTPS",
        })
    }

    fn protocol_name(&self) -> &'static str {
        "HTTPS"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_transport_creation() {
        let transport = HttpsTransport::new("https://1.1.1.1/dns-query".to_string()).unwrap();
        assert_eq!(transport.url, "https://1.1.1.1/dns-query");
        assert_eq!(transport.protocol_name(), "HTTPS");
    }
}
