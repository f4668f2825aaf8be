//! TLS termination for the listener.

use rustls::pki_types::CertificateDer;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

/// Create a TLS acceptor from PEM certificate and key files.
pub fn create_tls_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor, anyhow::Error> {
    let cert_file = std::fs::File::open(cert_path).map_err(|e| {
        anyhow::anyhow!(
            "Failed to open certificate file '{}': {e}",
            cert_path.display()
        )
    })?;
    let mut cert_reader = std::io::BufReader::new(cert_file);
    let certs: Vec<CertificateDer> = rustls_pemfile::certs(&mut cert_reader)
        .collect::<Result<_, _>>()
        .map_err(|e| anyhow::anyhow!("Failed to parse certificate file: {e}"))?;

    if certs.is_empty() {
        anyhow::bail!(
            "No certificates found in certificate file: {}",
            cert_path.display()
        );
    }

    let key_file = std::fs::File::open(key_path).map_err(|e| {
        anyhow::anyhow!(
            "Failed to open private key file '{}': {e}",
            key_path.display()
        )
    })?;
    let mut key_reader = std::io::BufReader::new(key_file);

    // PKCS8, RSA or SEC1
    let key = rustls_pemfile::private_key(&mut key_reader)
        .map_err(|e| anyhow::anyhow!("Failed to parse private key file: {e}"))?
        .ok_or_else(|| anyhow::anyhow!("No private key found in key file: {}", key_path.display()))?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| anyhow::anyhow!("Failed to select TLS protocol versions: {e}"))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| anyhow::anyhow!("Failed to build TLS configuration: {e}"))?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(TlsAcceptor::from(Arc::new(config)))
}
