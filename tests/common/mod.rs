//! Shared test helpers: self-signed certificate bundles and a blocking
//! TLS client.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rustls::pki_types::{CertificateDer, ServerName};
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};

use terminus::config::{ServerSpec, TlsConfig};

pub struct TestCert {
    pub bundle_path: PathBuf,
    pub cert: CertificateDer<'static>,
}

impl Drop for TestCert {
    fn drop(&mut self) {
        std::fs::remove_file(&self.bundle_path).ok();
    }
}

static BUNDLE_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Generates a self-signed certificate for localhost and writes a PEM
/// bundle (certificate + private key) to a temp file.
pub fn write_test_bundle() -> TestCert {
    let key = rcgen::KeyPair::generate().unwrap();
    let cert = rcgen::CertificateParams::new(vec![
        "localhost".to_string(),
        "127.0.0.1".to_string(),
    ])
    .unwrap()
    .self_signed(&key)
    .unwrap();

    let bundle = format!("{}{}", cert.pem(), key.serialize_pem());
    let n = BUNDLE_COUNTER.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!(
        "terminus-test-{}-{n}.pem",
        std::process::id()
    ));
    std::fs::write(&path, bundle).unwrap();

    TestCert {
        bundle_path: path,
        cert: cert.der().clone(),
    }
}

pub fn tls_spec(id: &str, bundle: &TestCert) -> ServerSpec {
    ServerSpec {
        id: id.to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        tls: Some(TlsConfig {
            bundle: bundle.bundle_path.clone(),
            passphrase: None,
            require_client_auth: false,
            client_ca: None,
            protocols: vec!["TLSv1.3".to_string(), "TLSv1.2".to_string()],
        }),
    }
}

pub fn plain_spec(id: &str) -> ServerSpec {
    ServerSpec {
        id: id.to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        tls: None,
    }
}

/// Client configuration trusting exactly the given certificate.
pub fn client_config(cert: &CertificateDer<'static>) -> Arc<ClientConfig> {
    let mut roots = RootCertStore::empty();
    roots.add(cert.clone()).unwrap();
    Arc::new(
        ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth(),
    )
}

/// Performs one full TLS request/response exchange over a blocking
/// socket. Call from `spawn_blocking` inside async tests.
pub fn tls_request(
    addr: SocketAddr,
    config: Arc<ClientConfig>,
    request: &[u8],
) -> std::io::Result<Vec<u8>> {
    let server_name = ServerName::try_from("localhost").unwrap();
    let conn = ClientConnection::new(config, server_name)
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    let sock = std::net::TcpStream::connect(addr)?;
    let mut tls = StreamOwned::new(conn, sock);

    tls.write_all(request)?;
    tls.flush()?;

    let mut response = Vec::new();
    tls.read_to_end(&mut response)?;
    Ok(response)
}
