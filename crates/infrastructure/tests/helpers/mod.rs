#![allow(dead_code)]

use async_trait::async_trait;
use dnsmux_application::ports::Upstream;
use dnsmux_domain::DomainError;
use hickory_proto::op::{Message, MessageType, Query};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{Name, RData, Record, RecordType};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::UdpSocket;
use tokio::sync::oneshot;

pub const ANSWER_IP: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 10);

pub fn query(name: &str, record_type: RecordType) -> Message {
    query_with_id(7, name, record_type)
}

pub fn query_with_id(id: u16, name: &str, record_type: RecordType) -> Message {
    let mut message = Message::new();
    message.set_id(id);
    message.set_recursion_desired(true);
    message.add_query(Query::query(Name::from_str(name).unwrap(), record_type));
    message
}

pub fn query_bytes(id: u16, name: &str, record_type: RecordType) -> Vec<u8> {
    query_with_id(id, name, record_type).to_vec().unwrap()
}

pub fn answer_ips(message: &Message) -> Vec<IpAddr> {
    message
        .answers()
        .iter()
        .filter_map(|record| match record.data() {
            RData::A(a) => Some(IpAddr::V4(a.0)),
            RData::AAAA(aaaa) => Some(IpAddr::V6(aaaa.0)),
            _ => None,
        })
        .collect()
}

/// Adds one A record per call and counts how often it was asked.
pub struct CountingUpstream {
    ip: Ipv4Addr,
    calls: AtomicUsize,
}

impl CountingUpstream {
    pub fn new(ip: Ipv4Addr) -> Self {
        Self {
            ip,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Upstream for CountingUpstream {
    async fn exchange(&self, mut message: Message) -> Result<Message, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = message
            .queries()
            .first()
            .map(|q| q.name().clone())
            .unwrap_or_else(Name::root);
        message.set_message_type(MessageType::Response);
        message.add_answer(Record::from_rdata(name, 300, RData::A(A(self.ip))));
        Ok(message)
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

pub struct FailingUpstream;

#[async_trait]
impl Upstream for FailingUpstream {
    async fn exchange(&self, _message: Message) -> Result<Message, DomainError> {
        Err(DomainError::UpstreamUnreachable {
            server: "test".to_string(),
            reason: "always fails".to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// UDP resolver on loopback answering every A question with [`ANSWER_IP`].
pub struct MockResolver {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockResolver {
    pub async fn start() -> Self {
        Self::start_with(|request| {
            let mut response = request;
            let name = response.queries()[0].name().clone();
            response.set_message_type(MessageType::Response);
            response.add_answer(Record::from_rdata(name, 60, RData::A(A(ANSWER_IP))));
            response
        })
        .await
    }

    pub async fn start_with<F>(respond: F) -> Self
    where
        F: Fn(Message) -> Message + Send + 'static,
    {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    result = socket.recv_from(&mut buf) => {
                        let Ok((len, peer)) = result else { continue };
                        let Ok(request) = Message::from_vec(&buf[..len]) else { continue };
                        let response = respond(request).to_vec().unwrap();
                        let _ = socket.send_to(&response, peer).await;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Drop for MockResolver {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Self-signed certificate for `localhost` written to PEM files.
pub struct TestCert {
    pub dir: tempfile::TempDir,
    pub tls: dnsmux_domain::config::TlsConfig,
    pub der: rustls::pki_types::CertificateDer<'static>,
}

impl TestCert {
    pub fn generate() -> Self {
        let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let cert_path = dir.path().join("cert.pem");
        let key_path = dir.path().join("key.pem");
        std::fs::write(&cert_path, certified.cert.pem()).unwrap();
        std::fs::write(&key_path, certified.key_pair.serialize_pem()).unwrap();

        Self {
            tls: dnsmux_domain::config::TlsConfig {
                cert_path,
                key_path,
            },
            der: certified.cert.der().clone(),
            dir,
        }
    }

    pub fn client_config(&self, alpn: &[&[u8]]) -> rustls::ClientConfig {
        dnsmux_infrastructure::tls::install_crypto_provider();
        let mut roots = rustls::RootCertStore::empty();
        roots.add(self.der.clone()).unwrap();
        let mut config = rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        config.alpn_protocols = alpn.iter().map(|p| p.to_vec()).collect();
        config
    }
}
