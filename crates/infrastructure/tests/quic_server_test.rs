mod helpers;

use dnsmux_infrastructure::dns::server::QuicServer;
use dnsmux_infrastructure::dns::BufferPool;
use dnsmux_infrastructure::tls::quic_server_config;
use helpers::{answer_ips, query_bytes, CountingUpstream, TestCert};
use hickory_proto::op::Message;
use hickory_proto::rr::RecordType;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const IP: Ipv4Addr = Ipv4Addr::new(100, 64, 0, 9);

async fn start(cert: &TestCert, upstream: Arc<CountingUpstream>) -> (SocketAddr, CancellationToken) {
    let config = quic_server_config(&cert.tls, Duration::from_secs(300)).unwrap();
    let token = CancellationToken::new();
    let server = QuicServer::bind("127.0.0.1:0".parse().unwrap(), config, upstream, BufferPool::new())
        .unwrap()
        .with_cancellation(token.clone());
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    (addr, token)
}

async fn connect(cert: &TestCert, alpn: &[u8], server: SocketAddr) -> quinn::Connection {
    let tls = cert.client_config(&[alpn]);
    let crypto = quinn::crypto::rustls::QuicClientConfig::try_from(Arc::new(tls)).unwrap();
    let mut endpoint = quinn::Endpoint::client("127.0.0.1:0".parse().unwrap()).unwrap();
    endpoint.set_default_client_config(quinn::ClientConfig::new(Arc::new(crypto)));
    endpoint.connect(server, "localhost").unwrap().await.unwrap()
}

#[tokio::test]
async fn test_doq_streams_each_carry_one_exchange() {
    let cert = TestCert::generate();
    let upstream = Arc::new(CountingUpstream::new(IP));
    let (addr, token) = start(&cert, upstream.clone()).await;
    let connection = connect(&cert, b"doq", addr).await;

    for id in [1u16, 2] {
        let (mut send, mut recv) = connection.open_bi().await.unwrap();
        let request = query_bytes(id, "quic.example.", RecordType::A);
        send.write_all(&(request.len() as u16).to_be_bytes()).await.unwrap();
        send.write_all(&request).await.unwrap();
        send.finish().unwrap();

        let reply = recv.read_to_end(65537).await.unwrap();
        let len = u16::from_be_bytes([reply[0], reply[1]]) as usize;
        assert_eq!(len, reply.len() - 2);

        let response = Message::from_vec(&reply[2..]).unwrap();
        assert_eq!(answer_ips(&response), vec![IpAddr::V4(IP)]);
    }

    assert_eq!(upstream.calls(), 2);
    token.cancel();
}

#[tokio::test]
async fn test_draft_alpn_uses_unframed_messages() {
    let cert = TestCert::generate();
    let upstream = Arc::new(CountingUpstream::new(IP));
    let (addr, token) = start(&cert, upstream.clone()).await;
    let connection = connect(&cert, b"doq-i02", addr).await;

    let (mut send, mut recv) = connection.open_bi().await.unwrap();
    send.write_all(&query_bytes(0, "draft.example.", RecordType::A))
        .await
        .unwrap();
    send.finish().unwrap();

    let reply = recv.read_to_end(65535).await.unwrap();
    let response = Message::from_vec(&reply).unwrap();
    assert_eq!(response.queries()[0].name().to_ascii(), "draft.example.");
    assert_eq!(answer_ips(&response), vec![IpAddr::V4(IP)]);
    token.cancel();
}
