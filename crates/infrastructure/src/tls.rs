//! Certificate loading and rustls/quinn server configuration for the
//! TLS, QUIC and HTTPS listeners.

use dnsmux_domain::config::TlsConfig;
use dnsmux_domain::DomainError;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_rustls::TlsAcceptor;

/// ALPN identifiers accepted by the DoQ listener, RFC 9250 first.
pub const DOQ_ALPN: &[&[u8]] = &[b"doq", b"doq-i02", b"doq-i00", b"dq"];

/// ALPN identifiers offered by the DoH listener.
pub const DOH_ALPN: &[&[u8]] = &[b"h2", b"http/1.1"];

/// Selects aws-lc-rs as the process-wide rustls provider. Safe to call repeatedly.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, DomainError> {
    let file = File::open(path).map_err(|e| {
        DomainError::TlsConfig(format!("cannot open certificate {}: {}", path.display(), e))
    })?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            DomainError::TlsConfig(format!("invalid certificate {}: {}", path.display(), e))
        })?;

    if certs.is_empty() {
        return Err(DomainError::TlsConfig(format!(
            "no certificates found in {}",
            path.display()
        )));
    }
    Ok(certs)
}

pub fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, DomainError> {
    let file = File::open(path).map_err(|e| {
        DomainError::TlsConfig(format!("cannot open private key {}: {}", path.display(), e))
    })?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .map_err(|e| {
            DomainError::TlsConfig(format!("invalid private key {}: {}", path.display(), e))
        })?
        .ok_or_else(|| {
            DomainError::TlsConfig(format!("no private key found in {}", path.display()))
        })
}

pub fn server_config(
    tls: &TlsConfig,
    alpn: &[&[u8]],
) -> Result<Arc<rustls::ServerConfig>, DomainError> {
    install_crypto_provider();

    let certs = load_certs(&tls.cert_path)?;
    let key = load_private_key(&tls.key_path)?;

    let mut config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| DomainError::TlsConfig(e.to_string()))?;
    config.alpn_protocols = alpn.iter().map(|p| p.to_vec()).collect();

    Ok(Arc::new(config))
}

/// Acceptor for DNS-over-TLS; no ALPN is negotiated.
pub fn tls_acceptor(tls: &TlsConfig) -> Result<TlsAcceptor, DomainError> {
    Ok(TlsAcceptor::from(server_config(tls, &[])?))
}

pub fn quic_server_config(
    tls: &TlsConfig,
    idle_timeout: Duration,
) -> Result<quinn::ServerConfig, DomainError> {
    let crypto = server_config(tls, DOQ_ALPN)?;
    let quic_crypto = quinn::crypto::rustls::QuicServerConfig::try_from(crypto)
        .map_err(|e| DomainError::TlsConfig(format!("QUIC server config: {}", e)))?;

    let mut transport = quinn::TransportConfig::default();
    let idle = quinn::IdleTimeout::try_from(idle_timeout)
        .map_err(|e| DomainError::TlsConfig(format!("QUIC idle timeout: {}", e)))?;
    transport.max_idle_timeout(Some(idle));

    let mut config = quinn::ServerConfig::with_crypto(Arc::new(quic_crypto));
    config.transport_config(Arc::new(transport));
    Ok(config)
}
